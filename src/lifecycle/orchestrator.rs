//! Batch orchestration over requests.
//!
//! Applies one action to many request ids with best-effort semantics: a
//! failing item never aborts the rest and nothing is rolled back. Aggregation
//! is recomputed exactly once per distinct touched request, after all of that
//! request's items have settled.

use super::aggregation;
use super::models::{ActionKind, RequestStatus, SampleStatus};
use super::transitions;
use crate::notifications::services::{self as notifier, StatusChangeEvent};
use crate::requests::models as requests;
use crate::samples::models as samples;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Outcome of one item in a batch. Ineligible or unknown ids are skips, not
/// errors; only store failures that survive the retry surface as `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum ItemOutcome {
    Updated,
    Skipped,
    NotFound,
    Error(String),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchItemResult {
    pub id: Uuid,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchResult {
    pub total_updated: u64,
    pub items: Vec<BatchItemResult>,
}

/// One bounded retry for transient store errors.
async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, DbErr>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!("store operation failed, retrying once: {first}");
            op().await
        }
    }
}

/// Apply `action` to every request id in `ids`.
pub async fn apply_batch(
    db: &DatabaseConnection,
    ids: &[Uuid],
    action: ActionKind,
    changed_by: Option<&str>,
) -> Result<BatchResult, DbErr> {
    let batch_instant = Utc::now();
    let mut items = Vec::with_capacity(ids.len());
    let mut total_updated: u64 = 0;
    // Deduplicated join set: requests whose samples changed and need a single
    // aggregation pass once the whole batch has settled.
    let mut touched: Vec<Uuid> = Vec::new();

    for &id in ids {
        let outcome =
            match with_retry(|| apply_single(db, id, action, changed_by, batch_instant)).await {
                Ok(outcome) => outcome,
                Err(err) => ItemOutcome::Error(err.to_string()),
            };

        if outcome == ItemOutcome::Updated {
            total_updated += 1;
            if !touched.contains(&id) {
                touched.push(id);
            }
        }
        items.push(BatchItemResult { id, outcome });
    }

    for request_id in &touched {
        with_retry(|| refresh_request_status(db, *request_id)).await?;
        emit_batch_notification(db, *request_id, action, changed_by).await;
    }

    Ok(BatchResult {
        total_updated,
        items,
    })
}

async fn apply_single(
    db: &DatabaseConnection,
    request_id: Uuid,
    action: ActionKind,
    changed_by: Option<&str>,
    batch_instant: chrono::DateTime<Utc>,
) -> Result<ItemOutcome, DbErr> {
    match action {
        ActionKind::Receive => {
            if requests::Entity::find_by_id(request_id).one(db).await?.is_none() {
                return Ok(ItemOutcome::NotFound);
            }
            let outcome =
                transitions::receive_samples(db, request_id, None, batch_instant).await?;
            Ok(if outcome.updated_count > 0 {
                ItemOutcome::Updated
            } else {
                ItemOutcome::Skipped
            })
        }
        ActionKind::Complete => {
            if requests::Entity::find_by_id(request_id).one(db).await?.is_none() {
                return Ok(ItemOutcome::NotFound);
            }
            // Eligibility is enforced inside complete_operation; pass every
            // sample of the request and let ineligible ones skip.
            let sample_ids: Vec<Uuid> = samples::Entity::find()
                .select_only()
                .column(samples::Column::Id)
                .filter(samples::Column::RequestId.eq(request_id))
                .into_tuple()
                .all(db)
                .await?;
            let outcome = transitions::complete_operation(
                db,
                &sample_ids,
                changed_by.unwrap_or("unknown"),
                batch_instant,
            )
            .await?;
            Ok(if outcome.updated.is_empty() {
                ItemOutcome::Skipped
            } else {
                ItemOutcome::Updated
            })
        }
        ActionKind::Approve => {
            if requests::Entity::find_by_id(request_id).one(db).await?.is_none() {
                return Ok(ItemOutcome::NotFound);
            }
            let updated = transitions::approve_results(db, request_id).await?;
            Ok(if updated > 0 {
                ItemOutcome::Updated
            } else {
                ItemOutcome::Skipped
            })
        }
        ActionKind::Reject => {
            let outcome =
                transitions::override_request_status(db, request_id, RequestStatus::Rejected)
                    .await?;
            Ok(if !outcome.found {
                ItemOutcome::NotFound
            } else if outcome.updated {
                ItemOutcome::Updated
            } else {
                ItemOutcome::Skipped
            })
        }
    }
}

/// Recompute and persist the derived status of one request from its samples.
/// A no-op for requests carrying an administrative override, and when the
/// derived value matches what is already stored.
pub async fn refresh_request_status(
    db: &DatabaseConnection,
    request_id: Uuid,
) -> Result<Option<RequestStatus>, DbErr> {
    let Some(request) = requests::Entity::find_by_id(request_id).one(db).await? else {
        return Ok(None);
    };

    let current = RequestStatus::canonicalize(&request.status)
        .unwrap_or(RequestStatus::PendingReceiveSample);
    if current.is_override() {
        return Ok(Some(current));
    }

    let raw_statuses: Vec<String> = samples::Entity::find()
        .select_only()
        .column(samples::Column::Status)
        .filter(samples::Column::RequestId.eq(request_id))
        .into_tuple()
        .all(db)
        .await?;
    // Unknown legacy strings count as not-yet-received.
    let statuses: Vec<SampleStatus> = raw_statuses
        .iter()
        .map(|raw| SampleStatus::canonicalize(raw).unwrap_or(SampleStatus::PendingReceive))
        .collect();

    let derived = aggregation::derive_request_status(current, &statuses);
    if derived != current {
        requests::Entity::update_many()
            .col_expr(requests::Column::Status, Expr::value(derived.as_str()))
            .col_expr(requests::Column::LastUpdated, Expr::value(Utc::now()))
            .filter(requests::Column::Id.eq(request_id))
            .exec(db)
            .await?;
    }

    Ok(Some(derived))
}

async fn emit_batch_notification(
    db: &DatabaseConnection,
    request_id: Uuid,
    action: ActionKind,
    changed_by: Option<&str>,
) {
    let Ok(Some(request)) = requests::Entity::find_by_id(request_id).one(db).await else {
        return;
    };

    let new_status = match action {
        ActionKind::Receive => SampleStatus::InProgress.as_str(),
        ActionKind::Complete => SampleStatus::PendingEntryResults.as_str(),
        ActionKind::Approve => SampleStatus::Completed.as_str(),
        ActionKind::Reject => RequestStatus::Rejected.as_str(),
    };

    notifier::emit(
        db,
        StatusChangeEvent {
            request_number: request.request_number,
            sample_scope: "multiple".to_string(),
            entity_type: if action == ActionKind::Reject {
                "request"
            } else {
                "testing_sample"
            }
            .to_string(),
            previous_status: None,
            new_status: new_status.to_string(),
            changed_by: changed_by.map(ToString::to_string),
            priority: "normal".to_string(),
        },
    )
    .await;
}
