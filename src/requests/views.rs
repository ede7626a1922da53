use super::models::{Request, RequestCreate, RequestList, RequestType, RequestUpdate};
use super::services;
use crate::common::auth::Role;
use crate::common::state::AppState;
use crate::lifecycle::models::{ActionKind, RequestStatus};
use crate::lifecycle::orchestrator::{apply_batch, refresh_request_status};
use crate::lifecycle::transitions;
use crate::notifications::services::{StatusChangeEvent, emit};
use crate::samples::models::SampleList;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum_keycloak_auth::{PassthroughMode, layer::KeycloakAuthLayer};
use chrono::Utc;
use crudcrate::CRUDResource;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub fn router(state: &AppState) -> OpenApiRouter {
    let mut mutating_router = OpenApiRouter::new()
        .routes(routes!(get_all_requests))
        .routes(routes!(create_request))
        .routes(routes!(get_one_request))
        .routes(routes!(update_request))
        .routes(routes!(delete_request))
        .routes(routes!(get_request_samples))
        .routes(routes!(receive_request_samples))
        .routes(routes!(reject_request))
        .routes(routes!(terminate_request))
        .routes(routes!(apply_batch_action))
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
        println!(
            "Warning: Mutating routes of {} router are not protected",
            Request::RESOURCE_NAME_PLURAL
        );
    }

    mutating_router
}

fn db_error(e: DbErr) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {e}"))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequestListQuery {
    /// Filter by request status (canonical name or legacy synonym).
    pub status: Option<String>,
    /// Filter by request type: ntr, asr or er.
    pub request_type: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/",
    params(RequestListQuery),
    responses(
        (status = 200, description = "List of requests", body = Vec<RequestList>),
        (status = 400, description = "Unknown filter value"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "List requests"
)]
pub async fn get_all_requests(
    Query(query): Query<RequestListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RequestList>>, (StatusCode, String)> {
    let mut select = super::models::Entity::find();

    if let Some(raw_status) = &query.status {
        let Some(status) = RequestStatus::canonicalize(raw_status) else {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown request status: {raw_status}"),
            ));
        };
        select = select.filter(
            super::models::Column::Status.is_in(status.store_synonyms().iter().copied()),
        );
    }
    if let Some(raw_type) = &query.request_type {
        let request_type = match raw_type.trim().to_lowercase().as_str() {
            "ntr" => RequestType::Ntr,
            "asr" => RequestType::Asr,
            "er" => RequestType::Er,
            _ => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    format!("Unknown request type: {raw_type}"),
                ));
            }
        };
        select = select.filter(super::models::Column::RequestType.eq(request_type));
    }

    let models = select
        .order_by_desc(super::models::Column::CreatedAt)
        .offset(query.offset.unwrap_or(0))
        .limit(query.limit.unwrap_or(100))
        .all(&state.db)
        .await
        .map_err(db_error)?;

    Ok(Json(models.into_iter().map(RequestList::from).collect()))
}

#[utoipa::path(
    post,
    path = "/",
    request_body = RequestCreate,
    responses(
        (status = 201, description = "Request created with its samples", body = Request),
        (status = 400, description = "Missing sample seeds"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "Create a request",
    description = "Create a request together with its testing samples, one per (sample x test method x repeat). Every sample starts in Pending Receive."
)]
pub async fn create_request(
    State(state): State<AppState>,
    Json(payload): Json<RequestCreate>,
) -> Result<(StatusCode, Json<Request>), (StatusCode, String)> {
    if payload.sample_seeds.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "sample_seeds must contain at least one sample".to_string(),
        ));
    }
    if payload
        .sample_seeds
        .iter()
        .any(|seed| seed.test_methods.is_empty() || seed.name.trim().is_empty())
    {
        return Err((
            StatusCode::BAD_REQUEST,
            "every sample seed needs a name and at least one test method".to_string(),
        ));
    }

    let request = Request::create(&state.db, payload).await.map_err(db_error)?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "The request with samples and rollup counts", body = Request),
        (status = 404, description = "Request not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "Get one request"
)]
pub async fn get_one_request(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Request>, (StatusCode, String)> {
    match Request::get_one(&state.db, id).await {
        Ok(request) => Ok(Json(request)),
        Err(DbErr::RecordNotFound(_)) => {
            Err((StatusCode::NOT_FOUND, "Request not found".to_string()))
        }
        Err(e) => Err(db_error(e)),
    }
}

#[utoipa::path(
    put,
    path = "/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RequestUpdate,
    responses(
        (status = 200, description = "Updated request", body = Request),
        (status = 404, description = "Request not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "Update request metadata",
    description = "Update title, type or requester. Status is never writable here; it moves only through the lifecycle engine."
)]
pub async fn update_request(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<RequestUpdate>,
) -> Result<Json<Request>, (StatusCode, String)> {
    match Request::update(&state.db, id, payload).await {
        Ok(request) => Ok(Json(request)),
        Err(DbErr::RecordNotFound(_)) => {
            Err((StatusCode::NOT_FOUND, "Request not found".to_string()))
        }
        Err(e) => Err(db_error(e)),
    }
}

#[utoipa::path(
    delete,
    path = "/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 204, description = "Request, samples and notification history deleted"),
        (status = 404, description = "Request not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "Delete a request (cascade)",
    description = "Irreversibly delete a request together with all of its testing samples and its notification history."
)]
pub async fn delete_request(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, (StatusCode, String)> {
    let found = services::delete_request_cascade(&state.db, id)
        .await
        .map_err(db_error)?;
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Request not found".to_string()))
    }
}

#[utoipa::path(
    get,
    path = "/{id}/samples",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Samples of the request", body = Vec<SampleList>),
        (status = 404, description = "Request not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "Get request samples"
)]
pub async fn get_request_samples(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SampleList>>, (StatusCode, String)> {
    if super::models::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(db_error)?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "Request not found".to_string()));
    }

    let samples = crate::samples::models::Entity::find()
        .filter(crate::samples::models::Column::RequestId.eq(id))
        .order_by_asc(crate::samples::models::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(db_error)?;

    Ok(Json(samples.into_iter().map(SampleList::from).collect()))
}

#[derive(Deserialize, ToSchema)]
pub struct ReceivePayload {
    /// Explicit sample ids to receive. Ids outside the request or in an
    /// ineligible state are silently skipped.
    pub testing_sample_ids: Option<Vec<Uuid>>,
    /// Receive every eligible sample of the request.
    pub receive_all: Option<bool>,
    pub changed_by: Option<String>,
}

#[utoipa::path(
    post,
    path = "/{id}/receive",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = ReceivePayload,
    responses(
        (status = 200, description = "Receive outcome with rollup counts"),
        (status = 400, description = "Neither sample ids nor receive_all given"),
        (status = 404, description = "Request not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "Receive samples",
    description = "Acknowledge physical custody of samples: eligible samples move to In Progress and are stamped with one shared receive date. Re-running the same call is an idempotent no-op."
)]
pub async fn receive_request_samples(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ReceivePayload>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let receive_all = payload.receive_all.unwrap_or(false);
    let has_ids = payload
        .testing_sample_ids
        .as_ref()
        .is_some_and(|ids| !ids.is_empty());
    if !receive_all && !has_ids {
        return Err((
            StatusCode::BAD_REQUEST,
            "either testing_sample_ids or receive_all is required".to_string(),
        ));
    }

    let Some(request) = super::models::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(db_error)?
    else {
        return Err((StatusCode::NOT_FOUND, "Request not found".to_string()));
    };

    let sample_ids = if receive_all {
        None
    } else {
        payload.testing_sample_ids.as_deref()
    };
    let outcome = transitions::receive_samples(&state.db, id, sample_ids, Utc::now())
        .await
        .map_err(db_error)?;

    if outcome.updated_count > 0 {
        refresh_request_status(&state.db, id).await.map_err(db_error)?;
        emit(
            &state.db,
            StatusChangeEvent {
                request_number: request.request_number,
                sample_scope: "multiple".to_string(),
                entity_type: "testing_sample".to_string(),
                previous_status: Some(
                    crate::lifecycle::models::SampleStatus::PendingReceive
                        .as_str()
                        .to_string(),
                ),
                new_status: crate::lifecycle::models::SampleStatus::InProgress
                    .as_str()
                    .to_string(),
                changed_by: payload.changed_by.clone(),
                priority: "normal".to_string(),
            },
        )
        .await;
    }

    Ok(Json(json!({
        "success": true,
        "updated_count": outcome.updated_count,
        "total_samples_count": outcome.total_samples_count,
        "received_samples_count": outcome.received_samples_count,
        "all_samples_received": outcome.all_samples_received,
    })))
}

#[derive(Deserialize, ToSchema)]
pub struct AdminActionPayload {
    pub changed_by: Option<String>,
}

#[utoipa::path(
    post,
    path = "/{id}/reject",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = AdminActionPayload,
    responses(
        (status = 200, description = "Reject outcome"),
        (status = 404, description = "Request not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "Reject a request",
    description = "Administrative override: the request becomes Rejected and aggregation never overwrites it. Terminal requests are skipped, not errored."
)]
pub async fn reject_request(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<AdminActionPayload>,
) -> Result<Json<Value>, (StatusCode, String)> {
    override_request(&state, id, RequestStatus::Rejected, payload.changed_by).await
}

#[utoipa::path(
    post,
    path = "/{id}/terminate",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = AdminActionPayload,
    responses(
        (status = 200, description = "Terminate outcome"),
        (status = 404, description = "Request not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "Terminate a request",
    description = "Administrative override: the request becomes Terminated. Terminal requests are skipped, not errored."
)]
pub async fn terminate_request(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<AdminActionPayload>,
) -> Result<Json<Value>, (StatusCode, String)> {
    override_request(&state, id, RequestStatus::Terminated, payload.changed_by).await
}

async fn override_request(
    state: &AppState,
    id: Uuid,
    target: RequestStatus,
    changed_by: Option<String>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let outcome = transitions::override_request_status(&state.db, id, target)
        .await
        .map_err(db_error)?;

    if !outcome.found {
        return Err((StatusCode::NOT_FOUND, "Request not found".to_string()));
    }

    if outcome.updated {
        if let Some(request_number) = outcome.request_number.clone() {
            emit(
                &state.db,
                StatusChangeEvent {
                    request_number,
                    sample_scope: "multiple".to_string(),
                    entity_type: "request".to_string(),
                    previous_status: outcome.previous_status.clone(),
                    new_status: target.as_str().to_string(),
                    changed_by,
                    priority: "normal".to_string(),
                },
            )
            .await;
        }
    }

    Ok(Json(json!({
        "success": true,
        "updated": outcome.updated,
        "status": if outcome.updated {
            target.as_str().to_string()
        } else {
            outcome.previous_status.unwrap_or_default()
        },
    })))
}

#[derive(Deserialize, ToSchema)]
pub struct BatchPayload {
    pub ids: Vec<Uuid>,
    /// One of: receive, complete, approve, reject.
    pub action: String,
    pub changed_by: Option<String>,
}

#[utoipa::path(
    post,
    path = "/batch",
    request_body = BatchPayload,
    responses(
        (status = 200, description = "Per-item batch outcome"),
        (status = 400, description = "Empty id list or unknown action"),
        (status = 500, description = "Internal server error")
    ),
    tag = "requests",
    summary = "Apply a bulk action",
    description = "Best-effort batch over request ids: a failing item never aborts the rest and nothing is rolled back. Missing or ineligible items are reported as skipped."
)]
pub async fn apply_batch_action(
    State(state): State<AppState>,
    Json(payload): Json<BatchPayload>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if payload.ids.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "ids must not be empty".to_string()));
    }
    let Some(action) = ActionKind::parse(&payload.action) else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown batch action: {}", payload.action),
        ));
    };

    let result = apply_batch(
        &state.db,
        &payload.ids,
        action,
        payload.changed_by.as_deref(),
    )
    .await
    .map_err(db_error)?;

    Ok(Json(json!({
        "success": true,
        "total_updated": result.total_updated,
        "items": result.items,
    })))
}
