//! End-to-end transfer scenarios against recording doubles.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use chrono::TimeDelta;
use playout_core::storage::ObjectAcl;
use playout_core::work_order::WorkOrderStatus;
use playout_relay::{InvocationContext, PollOutcome, TransferStatus};
use playout_test_utils::{
    Fault, MALFORMED_XML, RelayHarness, SCHEDULE_XML, StoreOp, event, init_test_logging,
    polling_event,
};
use tokio::time::Instant;

const FILE: &str = "SCH_HHUN_20250515.xml";
const CHANNEL: &str = "ARQTV3";
const SOURCE_KEY: &str = "tx-schedules/incoming/SCH_HHUN_20250515.xml";
const ARCHIVE_KEY: &str = "tx-schedules/archive/SCH_HHUN_20250515.json";
const DESTINATION_KEY: &str = "rt-demo/schedules/ARQTV3/SCH_HHUN_20250515.json";
const DONE_PREFIX: &str = "rt-demo/procschedules/ARQTV3/done/";

fn budget() -> InvocationContext {
    InvocationContext::with_budget(Duration::from_secs(900))
}

#[tokio::test]
async fn polling_disabled_succeeds_after_uploads() {
    init_test_logging();
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);

    let result = harness.pipeline.execute(&event(FILE, CHANNEL), &budget()).await;

    assert_eq!(result.status, TransferStatus::Success);
    assert!(result.archived_json.as_deref().unwrap().ends_with("SCH_HHUN_20250515.json"));
    assert_eq!(
        result.vipe_json.as_deref(),
        Some("memory://destination/rt-demo/schedules/ARQTV3/SCH_HHUN_20250515.json")
    );
    assert_eq!(result.processed_found, None);
    assert_eq!(result.polling_enabled, Some(false));

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["processed_found"].is_null());
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["channel"], CHANNEL);

    assert_eq!(harness.primary.puts(), vec![ARCHIVE_KEY]);
    assert_eq!(harness.destination.puts(), vec![DESTINATION_KEY]);
    assert_eq!(
        harness.destination.acl(DESTINATION_KEY),
        Some(ObjectAcl::BucketOwnerFullControl)
    );
    assert_eq!(harness.primary.acl(ARCHIVE_KEY), Some(ObjectAcl::Private));
    assert_eq!(
        harness.primary.data(ARCHIVE_KEY),
        harness.destination.data(DESTINATION_KEY)
    );
    assert_eq!(harness.destination.listings_of(DONE_PREFIX), 0);
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::Success]);
}

#[tokio::test(start_paused = true)]
async fn marker_found_on_second_poll() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);
    // The done-path diagnostic listing and the first poll see nothing.
    harness.seed_marker(FILE, CHANNEL, 1, 2);

    let start = Instant::now();
    let result = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 60.0), &budget())
        .await;

    assert_eq!(result.status, TransferStatus::Success);
    assert_eq!(result.processed_found, Some(true));
    assert_eq!(result.poll_outcome, Some(PollOutcome::Found));
    assert_eq!(
        result.processed_path.as_deref(),
        Some("procschedules/ARQTV3/done/")
    );
    assert_eq!(harness.destination.listings_of(DONE_PREFIX), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::Success]);
}

#[tokio::test(start_paused = true)]
async fn max_wait_exhausted_is_in_progress() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);

    let start = Instant::now();
    let result = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 12.0), &budget())
        .await;

    assert_eq!(result.status, TransferStatus::InProgress);
    assert_eq!(result.processed_found, Some(false));
    assert_eq!(result.poll_outcome, Some(PollOutcome::TimedOut));
    assert!(result.message.contains("not confirmed within timeout"));
    assert_eq!(start.elapsed(), Duration::from_secs(12));
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::InProgress]);
}

#[tokio::test]
async fn missing_source_is_error_without_uploads() {
    let harness = RelayHarness::new();

    let result = harness.pipeline.execute(&event(FILE, CHANNEL), &budget()).await;

    assert_eq!(result.status, TransferStatus::Error);
    assert!(result.message.starts_with("Error processing file SCH_HHUN_20250515.xml"));
    assert_eq!(result.file_name.as_deref(), Some(FILE));
    assert!(harness.primary.puts().is_empty());
    assert!(harness.destination.puts().is_empty());
    assert_eq!(harness.broker.calls(), 0);
    assert_eq!(
        harness.primary.operations(),
        vec![StoreOp::Get {
            key: SOURCE_KEY.to_string()
        }]
    );
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::Error]);
}

#[tokio::test]
async fn malformed_source_is_error_before_any_upload() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, MALFORMED_XML);

    let result = harness.pipeline.execute(&event(FILE, CHANNEL), &budget()).await;

    assert_eq!(result.status, TransferStatus::Error);
    assert!(
        result
            .message
            .starts_with("File SCH_HHUN_20250515.xml contains malformed XML")
    );
    assert!(harness.primary.puts().is_empty());
    assert!(harness.destination.operations().is_empty());
    assert_eq!(harness.broker.calls(), 0);
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::Error]);
}

#[tokio::test]
async fn validation_error_touches_nothing() {
    let harness = RelayHarness::new();
    let event = event("SCH_HHUN_20250515.txt", CHANNEL);

    let result = harness.pipeline.execute(&event, &budget()).await;

    assert_eq!(result.status, TransferStatus::Error);
    assert_eq!(result.message, "Input file must have a .xml extension");
    assert!(harness.primary.operations().is_empty());
    assert!(harness.reporter.updates().is_empty());
}

#[tokio::test]
async fn denied_credentials_stop_after_archive() {
    let harness = RelayHarness::with_denying_broker();
    harness.seed_source(FILE, SCHEDULE_XML);

    let result = harness.pipeline.execute(&event(FILE, CHANNEL), &budget()).await;

    assert_eq!(result.status, TransferStatus::Error);
    assert!(result.message.contains("cross-account credential exchange failed"));
    assert_eq!(harness.primary.puts(), vec![ARCHIVE_KEY]);
    assert!(harness.destination.operations().is_empty());
    assert_eq!(harness.broker.calls(), 1);
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::Error]);
}

#[tokio::test]
async fn destination_upload_failure_is_error() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);
    harness
        .destination
        .inject_failure("rt-demo/schedules/", Fault::AccessDenied);

    let result = harness.pipeline.execute(&event(FILE, CHANNEL), &budget()).await;

    assert_eq!(result.status, TransferStatus::Error);
    assert!(result.message.contains("failed to upload to destination"));
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::Error]);
}

#[tokio::test]
async fn reporter_failure_does_not_change_result() {
    let harness = RelayHarness::with_failing_reporter();
    harness.seed_source(FILE, SCHEDULE_XML);

    let result = harness.pipeline.execute(&event(FILE, CHANNEL), &budget()).await;

    assert_eq!(result.status, TransferStatus::Success);
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::Success]);
}

#[tokio::test]
async fn non_uuid_work_order_is_not_reported() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);
    let mut event = event(FILE, CHANNEL);
    event.work_order_id = Some("WO-2025-0515".into());

    let result = harness.pipeline.execute(&event, &budget()).await;

    assert_eq!(result.status, TransferStatus::Success);
    assert!(harness.reporter.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn insufficient_budget_reports_in_progress_without_polling() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);
    harness.seed_marker(FILE, CHANNEL, 1, 0);
    let ctx = InvocationContext::with_budget(Duration::from_secs(4));

    let result = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 60.0), &ctx)
        .await;

    assert_eq!(result.status, TransferStatus::InProgress);
    assert_eq!(result.processed_found, None);
    assert_eq!(result.poll_outcome, None);
    assert!(result.message.contains("insufficient time for polling"));
    assert_eq!(harness.destination.listings_of(DONE_PREFIX), 0);
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::InProgress]);
}

#[tokio::test(start_paused = true)]
async fn access_denied_listing_is_neutral_in_progress() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);
    harness
        .destination
        .inject_failure(DONE_PREFIX, Fault::AccessDenied);

    let start = Instant::now();
    let result = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 300.0), &budget())
        .await;

    assert_eq!(result.status, TransferStatus::InProgress);
    assert_eq!(result.poll_outcome, Some(PollOutcome::AccessDenied));
    assert_eq!(result.processed_found, Some(false));
    let message = result.message.to_lowercase();
    assert!(!message.contains("denied"));
    assert!(!message.contains("permission"));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::InProgress]);
}

#[tokio::test(start_paused = true)]
async fn leftover_marker_from_earlier_run_is_not_confirmation() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);
    // Ten minutes before this run's upload.
    harness.seed_marker(FILE, CHANNEL, 600, 0);

    let start = Instant::now();
    let result = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 800.0), &budget())
        .await;

    assert_eq!(result.status, TransferStatus::InProgress);
    assert_eq!(result.poll_outcome, Some(PollOutcome::TimedOut));
    assert_eq!(result.processed_found, Some(false));
    assert_eq!(start.elapsed(), Duration::from_secs(800));
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::InProgress]);
}

#[tokio::test(start_paused = true)]
async fn rerun_ignores_the_previous_runs_marker() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);
    harness.seed_marker(FILE, CHANNEL, 1, 0);

    let first = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 30.0), &budget())
        .await;
    assert_eq!(first.poll_outcome, Some(PollOutcome::Found));

    harness.clock.advance(TimeDelta::minutes(10));
    let second = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 30.0), &budget())
        .await;
    assert_eq!(second.status, TransferStatus::InProgress);
    assert_eq!(second.poll_outcome, Some(PollOutcome::TimedOut));

    harness.seed_marker(FILE, CHANNEL, 2, 0);
    let third = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 30.0), &budget())
        .await;
    assert_eq!(third.status, TransferStatus::Success);
    assert_eq!(
        harness.reporter.statuses(),
        vec![
            WorkOrderStatus::Success,
            WorkOrderStatus::InProgress,
            WorkOrderStatus::Success
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_done_listing_is_neutral_in_progress() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);
    harness
        .destination
        .inject_failure(DONE_PREFIX, Fault::Unavailable);

    let start = Instant::now();
    let result = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 300.0), &budget())
        .await;

    assert_eq!(result.status, TransferStatus::InProgress);
    assert_eq!(result.poll_outcome, Some(PollOutcome::TransientError));
    assert_eq!(result.processed_found, Some(false));
    assert!(result.message.ends_with("uploaded but processing could not be confirmed."));
    assert!(!result.message.to_lowercase().contains("unavailable"));
    // Diagnostic listing plus three failed attempts five seconds apart.
    assert_eq!(harness.destination.listings_of(DONE_PREFIX), 4);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    assert_eq!(harness.reporter.statuses(), vec![WorkOrderStatus::InProgress]);

    harness.destination.clear_failures();
    harness.seed_marker(FILE, CHANNEL, 1, 0);
    let retried = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 300.0), &budget())
        .await;
    assert_eq!(retried.status, TransferStatus::Success);
    assert_eq!(retried.poll_outcome, Some(PollOutcome::Found));
}

#[tokio::test(start_paused = true)]
async fn marker_is_found_across_paged_done_listing() {
    let harness = RelayHarness::with_destination_page_size(4);
    harness.seed_source(FILE, SCHEDULE_XML);
    for i in 0..30 {
        harness.seed_marker(&format!("AAA_{i:02}.xml"), CHANNEL, 1, 0);
    }
    harness.seed_marker(FILE, CHANNEL, 1, 0);

    let result = harness
        .pipeline
        .execute(&polling_event(FILE, CHANNEL, 60.0), &budget())
        .await;

    assert_eq!(result.status, TransferStatus::Success);
    let continued_pages = harness
        .destination
        .operations()
        .into_iter()
        .filter(|op| matches!(op, StoreOp::ListPage { token: Some(_), .. }))
        .count();
    // 31 markers at 4 per page: 7 continuation pages for each full listing.
    assert!(continued_pages >= 7, "continued pages: {continued_pages}");
}

#[tokio::test]
async fn repeated_invocations_write_the_same_keys() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);

    let first = harness.pipeline.execute(&event(FILE, CHANNEL), &budget()).await;
    let second = harness.pipeline.execute(&event(FILE, CHANNEL), &budget()).await;

    assert_eq!(first, second);
    assert_eq!(harness.primary.puts(), vec![ARCHIVE_KEY, ARCHIVE_KEY]);
    assert_eq!(harness.destination.puts(), vec![DESTINATION_KEY, DESTINATION_KEY]);
}

#[tokio::test]
async fn transformed_output_is_a_json_envelope() {
    let harness = RelayHarness::new();
    harness.seed_source(FILE, SCHEDULE_XML);
    let mut event = event(FILE, CHANNEL);
    event.fps = Some(30.0);

    harness.pipeline.execute(&event, &budget()).await;

    let body = harness.destination.data(DESTINATION_KEY).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["channel_id"], CHANNEL);
    assert_eq!(value["frame_rate"], 30.0);
    assert_eq!(value["root"], "Schedule");
    assert_eq!(value["document"]["children"][0]["name"], "Event");
}
