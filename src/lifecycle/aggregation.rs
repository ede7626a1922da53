//! Request status derivation.
//!
//! The single place where sample statuses roll up into a request status. No
//! other component recomputes this independently; the batch orchestrator
//! invokes it after sample mutations settle.

use super::models::{RequestStatus, SampleStatus};
use serde::Serialize;
use utoipa::ToSchema;

/// Counts derived from a request's sample statuses. `all_samples_received`
/// is deliberately a boolean on top of the request status rather than a
/// status value of its own, preserving the observed portal behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RequestRollup {
    pub total_samples: u64,
    pub received_samples: u64,
    pub all_samples_received: bool,
}

/// Pure tally over the current sample statuses.
pub fn rollup(statuses: &[SampleStatus]) -> RequestRollup {
    let total_samples = statuses.len() as u64;
    let received_samples = statuses
        .iter()
        .filter(|s| s.counts_as_received())
        .count() as u64;
    RequestRollup {
        total_samples,
        received_samples,
        all_samples_received: total_samples > 0 && received_samples == total_samples,
    }
}

/// Derive the request status from its samples.
///
/// Pure and idempotent: the result is a function of the inputs only. When the
/// request carries an administrative override (`Rejected` / `Terminated`) the
/// override wins and the samples are not consulted.
pub fn derive_request_status(current: RequestStatus, statuses: &[SampleStatus]) -> RequestStatus {
    if current.is_override() {
        return current;
    }

    let counts = rollup(statuses);
    if counts.total_samples == 0 {
        return RequestStatus::PendingReceiveSample;
    }

    if statuses.iter().all(|s| *s == SampleStatus::Completed) {
        return RequestStatus::Completed;
    }

    // A strict mix of received/unreceived samples keeps the request pending
    // until the full set crosses the threshold.
    if counts.all_samples_received {
        RequestStatus::InProgress
    } else {
        RequestStatus::PendingReceiveSample
    }
}
