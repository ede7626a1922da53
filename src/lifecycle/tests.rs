use super::aggregation::{derive_request_status, rollup};
use super::models::{ActionKind, RequestStatus, SampleStatus};
use super::transitions::eligible_from;
use rstest::rstest;

#[rstest]
#[case("Pending Receive", SampleStatus::PendingReceive)]
#[case("pending receive", SampleStatus::PendingReceive)]
#[case("Draft", SampleStatus::PendingReceive)]
#[case("submitted", SampleStatus::PendingReceive)]
#[case("In Progress", SampleStatus::InProgress)]
#[case("in-progress", SampleStatus::InProgress)]
#[case("in_progress", SampleStatus::InProgress)]
#[case("Received", SampleStatus::InProgress)]
#[case("  received  ", SampleStatus::InProgress)]
#[case("Pending Entry Results", SampleStatus::PendingEntryResults)]
#[case("pending entry result", SampleStatus::PendingEntryResults)]
#[case("Completed", SampleStatus::Completed)]
#[case("complete", SampleStatus::Completed)]
#[case("REJECTED", SampleStatus::Rejected)]
#[case("terminated", SampleStatus::Terminated)]
fn sample_status_canonicalization(#[case] raw: &str, #[case] expected: SampleStatus) {
    assert_eq!(SampleStatus::canonicalize(raw), Some(expected));
}

#[rstest]
#[case("")]
#[case("unknown")]
#[case("completedish")]
fn sample_status_rejects_unknown_strings(#[case] raw: &str) {
    assert_eq!(SampleStatus::canonicalize(raw), None);
}

#[test]
fn sample_status_round_trips_through_canonical_spelling() {
    for status in [
        SampleStatus::PendingReceive,
        SampleStatus::InProgress,
        SampleStatus::PendingEntryResults,
        SampleStatus::Completed,
        SampleStatus::Rejected,
        SampleStatus::Terminated,
    ] {
        assert_eq!(SampleStatus::canonicalize(status.as_str()), Some(status));
    }
}

#[test]
fn store_synonyms_all_canonicalize_back() {
    for status in [
        SampleStatus::PendingReceive,
        SampleStatus::InProgress,
        SampleStatus::PendingEntryResults,
        SampleStatus::Completed,
        SampleStatus::Rejected,
        SampleStatus::Terminated,
    ] {
        for raw in status.store_synonyms() {
            assert_eq!(
                SampleStatus::canonicalize(raw),
                Some(status),
                "synonym {raw:?} should canonicalize to {status:?}"
            );
        }
    }
}

#[rstest]
#[case("Pending Receive Sample", RequestStatus::PendingReceiveSample)]
#[case("pending_receive_sample", RequestStatus::PendingReceiveSample)]
#[case("Draft", RequestStatus::PendingReceiveSample)]
#[case("In Progress", RequestStatus::InProgress)]
#[case("Completed", RequestStatus::Completed)]
#[case("rejected", RequestStatus::Rejected)]
#[case("Terminated", RequestStatus::Terminated)]
fn request_status_canonicalization(#[case] raw: &str, #[case] expected: RequestStatus) {
    assert_eq!(RequestStatus::canonicalize(raw), Some(expected));
}

#[test]
fn received_tally_counts_everything_past_the_receive_boundary() {
    let statuses = [
        SampleStatus::PendingReceive,
        SampleStatus::InProgress,
        SampleStatus::PendingEntryResults,
        SampleStatus::Completed,
        SampleStatus::Rejected,
    ];
    let counts = rollup(&statuses);
    assert_eq!(counts.total_samples, 5);
    assert_eq!(counts.received_samples, 3);
    assert!(!counts.all_samples_received);
}

#[test]
fn empty_request_is_not_all_received() {
    let counts = rollup(&[]);
    assert_eq!(counts.total_samples, 0);
    assert!(!counts.all_samples_received);
}

#[test]
fn all_received_flag_requires_every_sample() {
    let counts = rollup(&[SampleStatus::InProgress, SampleStatus::Completed]);
    assert!(counts.all_samples_received);

    let counts = rollup(&[SampleStatus::InProgress, SampleStatus::PendingReceive]);
    assert!(!counts.all_samples_received);
}

#[rstest]
#[case(&[], RequestStatus::PendingReceiveSample)]
#[case(&[SampleStatus::PendingReceive], RequestStatus::PendingReceiveSample)]
#[case(&[SampleStatus::PendingReceive, SampleStatus::InProgress], RequestStatus::PendingReceiveSample)]
#[case(&[SampleStatus::InProgress, SampleStatus::InProgress], RequestStatus::InProgress)]
#[case(&[SampleStatus::InProgress, SampleStatus::PendingEntryResults], RequestStatus::InProgress)]
#[case(&[SampleStatus::InProgress, SampleStatus::Completed], RequestStatus::InProgress)]
#[case(&[SampleStatus::Completed, SampleStatus::Completed], RequestStatus::Completed)]
fn derivation_follows_the_aggregation_rule(
    #[case] statuses: &[SampleStatus],
    #[case] expected: RequestStatus,
) {
    assert_eq!(
        derive_request_status(RequestStatus::PendingReceiveSample, statuses),
        expected
    );
}

#[test]
fn derivation_is_idempotent() {
    let statuses = [SampleStatus::InProgress, SampleStatus::Completed];
    let first = derive_request_status(RequestStatus::PendingReceiveSample, &statuses);
    let second = derive_request_status(first, &statuses);
    assert_eq!(first, second);
}

#[rstest]
#[case(RequestStatus::Rejected)]
#[case(RequestStatus::Terminated)]
fn overrides_are_authoritative(#[case] current: RequestStatus) {
    // Even a fully completed sample set never displaces an override.
    let statuses = [SampleStatus::Completed, SampleStatus::Completed];
    assert_eq!(derive_request_status(current, &statuses), current);
    assert_eq!(derive_request_status(current, &[]), current);
}

#[test]
fn single_rejected_sample_does_not_reject_the_request() {
    let statuses = [SampleStatus::Rejected, SampleStatus::InProgress];
    assert_eq!(
        derive_request_status(RequestStatus::InProgress, &statuses),
        RequestStatus::PendingReceiveSample
    );
}

#[test]
fn lifecycle_edges_match_the_progression() {
    assert_eq!(
        eligible_from(SampleStatus::InProgress),
        &[SampleStatus::PendingReceive]
    );
    assert_eq!(
        eligible_from(SampleStatus::PendingEntryResults),
        &[SampleStatus::InProgress]
    );
    assert_eq!(
        eligible_from(SampleStatus::Completed),
        &[SampleStatus::PendingEntryResults]
    );
    // Nothing transitions back into the initial state.
    assert!(eligible_from(SampleStatus::PendingReceive).is_empty());
}

#[rstest]
#[case(SampleStatus::Rejected)]
#[case(SampleStatus::Terminated)]
fn terminal_side_branches_reachable_from_any_non_terminal_state(#[case] target: SampleStatus) {
    let from_set = eligible_from(target);
    assert!(from_set.contains(&SampleStatus::PendingReceive));
    assert!(from_set.contains(&SampleStatus::InProgress));
    assert!(from_set.contains(&SampleStatus::PendingEntryResults));
    assert!(!from_set.iter().any(|s| s.is_terminal()));
}

#[test]
fn terminal_statuses_are_closed() {
    for status in [
        SampleStatus::Completed,
        SampleStatus::Rejected,
        SampleStatus::Terminated,
    ] {
        assert!(status.is_terminal());
    }
    assert!(!SampleStatus::PendingEntryResults.is_terminal());
}

#[rstest]
#[case("receive", ActionKind::Receive)]
#[case("Complete", ActionKind::Complete)]
#[case("APPROVE", ActionKind::Approve)]
#[case(" reject ", ActionKind::Reject)]
fn batch_actions_parse(#[case] raw: &str, #[case] expected: ActionKind) {
    assert_eq!(ActionKind::parse(raw), Some(expected));
}

#[test]
fn unknown_batch_action_is_rejected() {
    assert_eq!(ActionKind::parse("escalate"), None);
}
