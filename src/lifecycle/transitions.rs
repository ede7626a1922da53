//! Store-conditioned status transitions.
//!
//! Every transition here is a single conditional `UPDATE`: the eligibility
//! check (status in the declared from-set) sits in the statement's filter, so
//! a concurrent writer cannot slip a row past the check between a read and a
//! write. Ineligible rows are skipped, never errored, which makes re-running
//! the same call an idempotent no-op.

use super::models::{RequestStatus, SampleStatus};
use crate::requests::models as requests;
use crate::samples::models as samples;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

/// Declared from-sets for each sample transition target (the edges of the
/// lifecycle graph).
pub fn eligible_from(target: SampleStatus) -> &'static [SampleStatus] {
    match target {
        SampleStatus::PendingReceive => &[],
        SampleStatus::InProgress => &[SampleStatus::PendingReceive],
        SampleStatus::PendingEntryResults => &[SampleStatus::InProgress],
        SampleStatus::Completed => &[SampleStatus::PendingEntryResults],
        // Side branches: reachable from any non-terminal state.
        SampleStatus::Rejected | SampleStatus::Terminated => &[
            SampleStatus::PendingReceive,
            SampleStatus::InProgress,
            SampleStatus::PendingEntryResults,
        ],
    }
}

/// All raw store spellings for a set of canonical statuses.
fn store_strings(statuses: &[SampleStatus]) -> Vec<&'static str> {
    statuses
        .iter()
        .flat_map(|s| s.store_synonyms().iter().copied())
        .collect()
}

fn received_store_strings() -> Vec<&'static str> {
    store_strings(&[
        SampleStatus::InProgress,
        SampleStatus::PendingEntryResults,
        SampleStatus::Completed,
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOutcome {
    pub updated_count: u64,
    pub total_samples_count: u64,
    pub received_samples_count: u64,
    pub all_samples_received: bool,
}

/// Receive samples for a request: eligible pre-state samples become
/// `In Progress` and get the same `receive_date` instant for the whole batch.
///
/// With `sample_ids = None` every eligible sample under the request is
/// received ("receive all"); with an explicit id list only listed samples in
/// an eligible pre-state are touched, the rest are silently skipped.
pub async fn receive_samples(
    db: &DatabaseConnection,
    request_id: Uuid,
    sample_ids: Option<&[Uuid]>,
    received_at: DateTime<Utc>,
) -> Result<ReceiveOutcome, DbErr> {
    let mut update = samples::Entity::update_many()
        .col_expr(
            samples::Column::Status,
            Expr::value(SampleStatus::InProgress.as_str()),
        )
        .col_expr(samples::Column::ReceiveDate, Expr::value(received_at))
        .col_expr(samples::Column::LastUpdated, Expr::value(Utc::now()))
        .filter(samples::Column::RequestId.eq(request_id))
        .filter(samples::Column::Status.is_in(store_strings(&[SampleStatus::PendingReceive])));

    if let Some(ids) = sample_ids {
        update = update.filter(samples::Column::Id.is_in(ids.to_vec()));
    }

    let updated_count = update.exec(db).await?.rows_affected;

    let total_samples_count = samples::Entity::find()
        .filter(samples::Column::RequestId.eq(request_id))
        .count(db)
        .await?;
    let received_samples_count = samples::Entity::find()
        .filter(samples::Column::RequestId.eq(request_id))
        .filter(samples::Column::Status.is_in(received_store_strings()))
        .count(db)
        .await?;

    Ok(ReceiveOutcome {
        updated_count,
        total_samples_count,
        received_samples_count,
        all_samples_received: total_samples_count > 0
            && received_samples_count == total_samples_count,
    })
}

#[derive(Debug, Clone)]
pub struct CompleteOutcome {
    pub updated: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
    pub not_found: Vec<Uuid>,
    /// Distinct requests whose samples changed.
    pub touched_requests: Vec<Uuid>,
}

/// Mark the testing operation of the given samples as complete. Only samples
/// currently `In Progress` transition to `Pending Entry Results`; the result
/// reports which ids were updated, skipped, or unknown.
pub async fn complete_operation(
    db: &DatabaseConnection,
    sample_ids: &[Uuid],
    performed_by: &str,
    completed_at: DateTime<Utc>,
) -> Result<CompleteOutcome, DbErr> {
    let found = samples::Entity::find()
        .filter(samples::Column::Id.is_in(sample_ids.to_vec()))
        .all(db)
        .await?;

    let mut candidates = Vec::new();
    let mut skipped = Vec::new();
    for sample in &found {
        if SampleStatus::canonicalize(&sample.status) == Some(SampleStatus::InProgress) {
            candidates.push(sample.id);
        } else {
            skipped.push(sample.id);
        }
    }
    let not_found: Vec<Uuid> = sample_ids
        .iter()
        .filter(|id| !found.iter().any(|s| s.id == **id))
        .copied()
        .collect();

    let mut updated = Vec::new();
    let mut touched_requests = Vec::new();
    if !candidates.is_empty() {
        samples::Entity::update_many()
            .col_expr(
                samples::Column::Status,
                Expr::value(SampleStatus::PendingEntryResults.as_str()),
            )
            .col_expr(
                samples::Column::OperationCompleteDate,
                Expr::value(completed_at),
            )
            .col_expr(
                samples::Column::OperationCompleteBy,
                Expr::value(performed_by),
            )
            .col_expr(samples::Column::LastUpdated, Expr::value(Utc::now()))
            .filter(samples::Column::Id.is_in(candidates.clone()))
            .filter(samples::Column::Status.is_in(store_strings(&[SampleStatus::InProgress])))
            .exec(db)
            .await?;

        // Report from the store, not the pre-read: a concurrent transition
        // can shrink the eligible set between the read and the conditioned
        // write, and the response must reflect what was actually written.
        let settled = samples::Entity::find()
            .filter(samples::Column::Id.is_in(candidates))
            .all(db)
            .await?;
        for sample in settled {
            if SampleStatus::canonicalize(&sample.status)
                == Some(SampleStatus::PendingEntryResults)
            {
                updated.push(sample.id);
                if !touched_requests.contains(&sample.request_id) {
                    touched_requests.push(sample.request_id);
                }
            } else {
                skipped.push(sample.id);
            }
        }
    }

    Ok(CompleteOutcome {
        updated,
        skipped,
        not_found,
        touched_requests,
    })
}

/// Finalize results entry for a whole request: every sample pending entry
/// results becomes `Completed`. Returns the number of samples updated.
pub async fn approve_results(
    db: &DatabaseConnection,
    request_id: Uuid,
) -> Result<u64, DbErr> {
    let result = samples::Entity::update_many()
        .col_expr(
            samples::Column::Status,
            Expr::value(SampleStatus::Completed.as_str()),
        )
        .col_expr(samples::Column::LastUpdated, Expr::value(Utc::now()))
        .filter(samples::Column::RequestId.eq(request_id))
        .filter(samples::Column::Status.is_in(store_strings(&[SampleStatus::PendingEntryResults])))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[derive(Debug, Clone)]
pub struct SingleUpdateOutcome {
    pub found: bool,
    pub updated: bool,
    pub previous_status: Option<String>,
    pub request_id: Option<Uuid>,
}

/// Apply a single-sample transition to `target`, conditioned on the sample
/// currently sitting in the target's declared from-set. Side effects follow
/// the edge: first receive stamps `receive_date`, operation completion stamps
/// the completion fields. `receive_date` is monotonic and never cleared.
pub async fn update_sample_status(
    db: &DatabaseConnection,
    sample_id: Uuid,
    target: SampleStatus,
    changed_by: Option<&str>,
) -> Result<SingleUpdateOutcome, DbErr> {
    let Some(sample) = samples::Entity::find_by_id(sample_id).one(db).await? else {
        return Ok(SingleUpdateOutcome {
            found: false,
            updated: false,
            previous_status: None,
            request_id: None,
        });
    };

    let from_set = eligible_from(target);
    if from_set.is_empty() {
        return Ok(SingleUpdateOutcome {
            found: true,
            updated: false,
            previous_status: Some(sample.status.clone()),
            request_id: Some(sample.request_id),
        });
    }

    let now = Utc::now();
    let mut update = samples::Entity::update_many()
        .col_expr(samples::Column::Status, Expr::value(target.as_str()))
        .col_expr(samples::Column::LastUpdated, Expr::value(now))
        .filter(samples::Column::Id.eq(sample_id))
        .filter(samples::Column::Status.is_in(store_strings(from_set)));

    match target {
        SampleStatus::InProgress => {
            if sample.receive_date.is_none() {
                update = update.col_expr(samples::Column::ReceiveDate, Expr::value(now));
            }
        }
        SampleStatus::PendingEntryResults => {
            update = update
                .col_expr(samples::Column::OperationCompleteDate, Expr::value(now))
                .col_expr(
                    samples::Column::OperationCompleteBy,
                    Expr::value(changed_by.unwrap_or("unknown")),
                );
        }
        _ => {}
    }

    let updated = update.exec(db).await?.rows_affected > 0;

    Ok(SingleUpdateOutcome {
        found: true,
        updated,
        previous_status: Some(sample.status),
        request_id: Some(sample.request_id),
    })
}

#[derive(Debug, Clone)]
pub struct OverrideOutcome {
    pub found: bool,
    pub updated: bool,
    pub previous_status: Option<String>,
    pub request_number: Option<String>,
}

/// Set an administrative override (`Rejected` / `Terminated`) on a request.
/// Conditioned on the request not already being terminal; a completed,
/// rejected or terminated request is left untouched and reported as skipped.
pub async fn override_request_status(
    db: &DatabaseConnection,
    request_id: Uuid,
    target: RequestStatus,
) -> Result<OverrideOutcome, DbErr> {
    debug_assert!(target.is_override());

    let Some(request) = requests::Entity::find_by_id(request_id).one(db).await? else {
        return Ok(OverrideOutcome {
            found: false,
            updated: false,
            previous_status: None,
            request_number: None,
        });
    };

    let terminal_strings: Vec<&'static str> = [
        RequestStatus::Completed,
        RequestStatus::Rejected,
        RequestStatus::Terminated,
    ]
    .iter()
    .flat_map(|s| s.store_synonyms().iter().copied())
    .collect();

    let updated = requests::Entity::update_many()
        .col_expr(requests::Column::Status, Expr::value(target.as_str()))
        .col_expr(requests::Column::LastUpdated, Expr::value(Utc::now()))
        .filter(requests::Column::Id.eq(request_id))
        .filter(requests::Column::Status.is_not_in(terminal_strings))
        .exec(db)
        .await?
        .rows_affected
        > 0;

    Ok(OverrideOutcome {
        found: true,
        updated,
        previous_status: Some(request.status),
        request_number: Some(request.request_number),
    })
}
