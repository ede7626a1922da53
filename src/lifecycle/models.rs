//! Closed status vocabularies for testing samples and requests.
//!
//! Historical data stored status values with inconsistent casing and spelling
//! (`draft`, `submitted`, `in-progress`, ...). All raw strings coming from the
//! store or the wire pass through [`SampleStatus::canonicalize`] /
//! [`RequestStatus::canonicalize`] so the rest of the engine only ever
//! compares canonical variants.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Status of an individual testing sample.
///
/// Progression: `Pending Receive` → `In Progress` → `Pending Entry Results` →
/// `Completed`, with `Rejected` / `Terminated` reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SampleStatus {
    PendingReceive,
    InProgress,
    PendingEntryResults,
    Completed,
    Rejected,
    Terminated,
}

impl SampleStatus {
    /// Map a raw status string (including legacy synonyms) onto a canonical
    /// variant. Returns `None` for strings outside the known vocabulary.
    pub fn canonicalize(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "pending receive" | "draft" | "submitted" => Some(Self::PendingReceive),
            // "received" appears in historical rows for samples past the
            // receive boundary but not yet operated on.
            "in progress" | "received" => Some(Self::InProgress),
            "pending entry results" | "pending entry result" => Some(Self::PendingEntryResults),
            "completed" | "complete" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    /// Canonical wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingReceive => "Pending Receive",
            Self::InProgress => "In Progress",
            Self::PendingEntryResults => "Pending Entry Results",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
            Self::Terminated => "Terminated",
        }
    }

    /// Raw spellings that may appear in stored rows for this status. Used to
    /// build the status filter of conditioned `update_many` calls so the
    /// eligibility check and the write are a single store operation.
    pub fn store_synonyms(self) -> &'static [&'static str] {
        match self {
            Self::PendingReceive => &[
                "Pending Receive",
                "pending receive",
                "Draft",
                "draft",
                "Submitted",
                "submitted",
            ],
            Self::InProgress => &[
                "In Progress",
                "In progress",
                "in progress",
                "in-progress",
                "Received",
                "received",
            ],
            Self::PendingEntryResults => &["Pending Entry Results", "pending entry results"],
            Self::Completed => &["Completed", "completed"],
            Self::Rejected => &["Rejected", "rejected"],
            Self::Terminated => &["Terminated", "terminated"],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Terminated)
    }

    /// Whether this sample counts towards the request's received tally.
    pub fn counts_as_received(self) -> bool {
        matches!(
            self,
            Self::InProgress | Self::PendingEntryResults | Self::Completed
        )
    }
}

impl std::fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a request. `Rejected` and `Terminated` are administrative
/// overrides: once set they are authoritative and aggregation never
/// overwrites them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum RequestStatus {
    PendingReceiveSample,
    InProgress,
    Completed,
    Rejected,
    Terminated,
}

impl RequestStatus {
    pub fn canonicalize(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "pending receive sample" | "pending receive" | "draft" | "submitted" => {
                Some(Self::PendingReceiveSample)
            }
            "in progress" => Some(Self::InProgress),
            "completed" | "complete" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingReceiveSample => "Pending Receive Sample",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
            Self::Terminated => "Terminated",
        }
    }

    /// Raw spellings that may appear in stored request rows for this status.
    pub fn store_synonyms(self) -> &'static [&'static str] {
        match self {
            Self::PendingReceiveSample => &[
                "Pending Receive Sample",
                "pending receive sample",
                "Pending Receive",
                "pending receive",
                "Draft",
                "draft",
                "Submitted",
                "submitted",
            ],
            Self::InProgress => &["In Progress", "In progress", "in progress", "in-progress"],
            Self::Completed => &["Completed", "completed"],
            Self::Rejected => &["Rejected", "rejected"],
            Self::Terminated => &["Terminated", "terminated"],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Terminated)
    }

    /// Administrative overrides are set explicitly and take precedence over
    /// the aggregation rule.
    pub fn is_override(self) -> bool {
        matches!(self, Self::Rejected | Self::Terminated)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions the batch orchestrator can apply uniformly to a list of request
/// identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Receive all eligible samples of the request.
    Receive,
    /// Mark all in-progress samples as operation complete.
    Complete,
    /// Finalize results entry: pending-entry-results samples become completed.
    Approve,
    /// Administrative request-level rejection (override).
    Reject,
}

impl ActionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "receive" => Some(Self::Receive),
            "complete" => Some(Self::Complete),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}
