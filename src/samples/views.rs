use super::models::{Sample, SampleList};
use crate::common::auth::Role;
use crate::common::state::AppState;
use crate::lifecycle::models::SampleStatus;
use crate::lifecycle::orchestrator::refresh_request_status;
use crate::lifecycle::transitions;
use crate::notifications::services::{StatusChangeEvent, emit};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum_keycloak_auth::{PassthroughMode, layer::KeycloakAuthLayer};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub fn router(state: &AppState) -> OpenApiRouter {
    let mut mutating_router = OpenApiRouter::new()
        .routes(routes!(get_all_samples))
        .routes(routes!(get_one_sample))
        .routes(routes!(complete_operation))
        .routes(routes!(update_sample_status))
        .with_state(state.clone());

    if let Some(instance) = state.keycloak_auth_instance.clone() {
        mutating_router = mutating_router.layer(
            KeycloakAuthLayer::<Role>::builder()
                .instance(instance)
                .passthrough_mode(PassthroughMode::Block)
                .persist_raw_claims(false)
                .expected_audiences(vec![String::from("account")])
                .required_roles(vec![Role::Administrator])
                .build(),
        );
    } else if !state.config.tests_running {
        println!("Warning: Mutating routes of samples router are not protected");
    }

    mutating_router
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SampleListQuery {
    /// Restrict to samples of one request.
    pub request_id: Option<Uuid>,
    /// Filter by status (canonical name or legacy synonym).
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/",
    params(SampleListQuery),
    responses(
        (status = 200, description = "List of testing samples", body = Vec<SampleList>),
        (status = 400, description = "Unknown status filter"),
        (status = 500, description = "Internal server error")
    ),
    tag = "samples",
    summary = "List testing samples"
)]
pub async fn get_all_samples(
    Query(query): Query<SampleListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SampleList>>, (StatusCode, String)> {
    let mut select = super::models::Entity::find();

    if let Some(request_id) = query.request_id {
        select = select.filter(super::models::Column::RequestId.eq(request_id));
    }
    if let Some(raw_status) = &query.status {
        let Some(status) = SampleStatus::canonicalize(raw_status) else {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown sample status: {raw_status}"),
            ));
        };
        select = select.filter(
            super::models::Column::Status.is_in(status.store_synonyms().iter().copied()),
        );
    }

    let models = select
        .order_by_asc(super::models::Column::CreatedAt)
        .offset(query.offset.unwrap_or(0))
        .limit(query.limit.unwrap_or(100))
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {e}")))?;

    Ok(Json(models.into_iter().map(SampleList::from).collect()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    params(("id" = Uuid, Path, description = "Sample ID")),
    responses(
        (status = 200, description = "The testing sample", body = Sample),
        (status = 404, description = "Sample not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "samples",
    summary = "Get one testing sample"
)]
pub async fn get_one_sample(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Sample>, (StatusCode, String)> {
    let model = super::models::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Sample not found".to_string()))?;

    Ok(Json(model.into()))
}

#[derive(Deserialize, ToSchema)]
pub struct CompleteOperationPayload {
    /// Explicit sample ids; completion requires per-sample confirmation, so
    /// there is no implicit "all" form.
    pub sample_ids: Vec<Uuid>,
    pub performed_by: String,
}

#[utoipa::path(
    post,
    path = "/complete-operation",
    request_body = CompleteOperationPayload,
    responses(
        (status = 200, description = "Per-sample completion outcome"),
        (status = 400, description = "Missing sample ids or performer"),
        (status = 500, description = "Internal server error")
    ),
    tag = "samples",
    summary = "Mark testing operations complete",
    description = "Transition the listed samples from In Progress to Pending Entry Results, stamping the completion date and performer. Samples not currently In Progress are skipped."
)]
pub async fn complete_operation(
    State(state): State<AppState>,
    Json(payload): Json<CompleteOperationPayload>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if payload.sample_ids.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "sample_ids must not be empty".to_string(),
        ));
    }
    if payload.performed_by.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "performed_by is required".to_string(),
        ));
    }

    let outcome = transitions::complete_operation(
        &state.db,
        &payload.sample_ids,
        &payload.performed_by,
        Utc::now(),
    )
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {e}")))?;

    // Aggregation joins in only after every sample write has settled.
    for request_id in &outcome.touched_requests {
        refresh_request_status(&state.db, *request_id)
            .await
            .map_err(|e| {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {e}"))
            })?;
        notify_samples_completed(&state, *request_id, &outcome.updated, &payload.performed_by)
            .await;
    }

    let results: Vec<Value> = payload
        .sample_ids
        .iter()
        .map(|id| {
            let outcome_str = if outcome.updated.contains(id) {
                "updated"
            } else if outcome.not_found.contains(id) {
                "not_found"
            } else {
                "skipped"
            };
            json!({"id": id, "outcome": outcome_str})
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "updated_count": outcome.updated.len(),
        "results": results,
    })))
}

async fn notify_samples_completed(
    state: &AppState,
    request_id: Uuid,
    updated: &[Uuid],
    performed_by: &str,
) {
    let Ok(Some(request)) = crate::requests::models::Entity::find_by_id(request_id)
        .one(&state.db)
        .await
    else {
        return;
    };

    let sample_scope = if updated.len() == 1 {
        updated[0].to_string()
    } else {
        "multiple".to_string()
    };

    emit(
        &state.db,
        StatusChangeEvent {
            request_number: request.request_number,
            sample_scope,
            entity_type: "testing_sample".to_string(),
            previous_status: Some(SampleStatus::InProgress.as_str().to_string()),
            new_status: SampleStatus::PendingEntryResults.as_str().to_string(),
            changed_by: Some(performed_by.to_string()),
            priority: "normal".to_string(),
        },
    )
    .await;
}

#[derive(Deserialize, ToSchema)]
pub struct SampleStatusPayload {
    pub status: String,
    pub changed_by: Option<String>,
}

#[utoipa::path(
    put,
    path = "/{id}/status",
    params(("id" = Uuid, Path, description = "Sample ID")),
    request_body = SampleStatusPayload,
    responses(
        (status = 200, description = "Transition outcome"),
        (status = 400, description = "Unknown status value"),
        (status = 404, description = "Sample not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "samples",
    summary = "Update a single sample status",
    description = "Apply one lifecycle transition to a sample. The write is conditioned on the sample sitting in the target's eligible from-set; ineligible samples are reported as skipped, not errored."
)]
pub async fn update_sample_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<SampleStatusPayload>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let Some(target) = SampleStatus::canonicalize(&payload.status) else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown sample status: {}", payload.status),
        ));
    };

    let outcome = transitions::update_sample_status(
        &state.db,
        id,
        target,
        payload.changed_by.as_deref(),
    )
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {e}")))?;

    if !outcome.found {
        return Err((StatusCode::NOT_FOUND, "Sample not found".to_string()));
    }

    if outcome.updated {
        if let Some(request_id) = outcome.request_id {
            refresh_request_status(&state.db, request_id)
                .await
                .map_err(|e| {
                    (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {e}"))
                })?;

            if let Ok(Some(request)) =
                crate::requests::models::Entity::find_by_id(request_id)
                    .one(&state.db)
                    .await
            {
                emit(
                    &state.db,
                    StatusChangeEvent {
                        request_number: request.request_number,
                        sample_scope: id.to_string(),
                        entity_type: "testing_sample".to_string(),
                        previous_status: outcome.previous_status.clone(),
                        new_status: target.as_str().to_string(),
                        changed_by: payload.changed_by.clone(),
                        priority: "normal".to_string(),
                    },
                )
                .await;
            }
        }
    }

    Ok(Json(json!({
        "success": true,
        "updated": outcome.updated,
        "status": if outcome.updated { target.as_str().to_string() } else { outcome.previous_status.unwrap_or_default() },
    })))
}
