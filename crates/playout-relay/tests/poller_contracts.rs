//! Completion poller contracts: budgets, age windows, fault handling.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use playout_core::clock::FixedClock;
use playout_relay::{AgeWindow, CompletionPoller, PollConfig, PollOutcome};
use playout_test_utils::{Fault, RecordingStore, fixture_now};
use tokio::time::Instant;

const PREFIX: &str = "rt-demo/procschedules/ARQTV3/done/";
const MARKER: &str = "SCH_HHUN_20250515.json.done";

fn poller() -> CompletionPoller {
    CompletionPoller::new(Arc::new(FixedClock::new(fixture_now())))
}

fn config(max_wait_secs: u64) -> PollConfig {
    PollConfig {
        max_wait: Duration::from_secs(max_wait_secs),
        interval: Duration::from_secs(5),
        age_window: AgeWindow::new(Duration::from_secs(10), Duration::from_secs(120)),
        max_consecutive_errors: 3,
    }
}

fn marker(store: &RecordingStore, age_secs: i64) {
    store.insert(
        &format!("{PREFIX}{MARKER}.{age_secs}"),
        Vec::<u8>::new(),
        Some(fixture_now() - TimeDelta::seconds(age_secs)),
    );
}

async fn poll(store: &RecordingStore, config: &PollConfig) -> PollOutcome {
    poller().poll(store, PREFIX, MARKER, config).await
}

#[tokio::test(start_paused = true)]
async fn age_window_bounds_are_inclusive() {
    for (age, expected) in [
        (10, PollOutcome::Found),
        (120, PollOutcome::Found),
        (9, PollOutcome::TimedOut),
        (121, PollOutcome::TimedOut),
    ] {
        let store = RecordingStore::new("destination");
        marker(&store, age);
        assert_eq!(poll(&store, &config(6)).await, expected, "age {age}");
    }
}

#[tokio::test(start_paused = true)]
async fn access_denied_short_circuits() {
    let store = RecordingStore::new("destination");
    store.inject_failure(PREFIX, Fault::AccessDenied);

    let start = Instant::now();
    let outcome = poll(&store, &config(600)).await;

    assert_eq!(outcome, PollOutcome::AccessDenied);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(store.listings_of(PREFIX), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_listing_failures_become_transient_error() {
    let store = RecordingStore::new("destination");
    store.inject_failure(PREFIX, Fault::Unavailable);

    let start = Instant::now();
    let outcome = poll(&store, &config(600)).await;

    assert_eq!(outcome, PollOutcome::TransientError);
    assert_eq!(store.listings_of(PREFIX), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn non_permission_storage_faults_are_not_access_denied() {
    let store = RecordingStore::new("destination");
    store.inject_failure(PREFIX, Fault::Storage);

    assert_eq!(
        poll(&store, &config(600)).await,
        PollOutcome::TransientError
    );
}

#[tokio::test(start_paused = true)]
async fn listing_recovers_below_error_threshold() {
    let store = RecordingStore::new("destination");
    store.inject_failure_times(PREFIX, Fault::Unavailable, 2);
    marker(&store, 30);

    let start = Instant::now();
    let outcome = poll(&store, &config(600)).await;

    assert_eq!(outcome, PollOutcome::Found);
    assert_eq!(store.listings_of(PREFIX), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn marker_behind_many_pages_is_found() {
    let store = RecordingStore::new("destination").with_page_size(1);
    for i in 0..25 {
        store.insert(
            &format!("{PREFIX}AAA_{i:02}.json.done"),
            Vec::<u8>::new(),
            Some(fixture_now()),
        );
    }
    marker(&store, 30);

    assert_eq!(poll(&store, &config(30)).await, PollOutcome::Found);
    // One logical listing, 26 pages.
    assert_eq!(store.listings_of(PREFIX), 1);
    assert_eq!(store.operations().len(), 26);
}

#[tokio::test(start_paused = true)]
async fn markers_without_timestamps_never_match() {
    let store = RecordingStore::new("destination");
    store.insert(&format!("{PREFIX}{MARKER}"), Vec::<u8>::new(), None);

    assert_eq!(poll(&store, &config(10)).await, PollOutcome::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn polling_is_idempotent() {
    let store = RecordingStore::new("destination");
    marker(&store, 600);
    marker(&store, 3);

    let first = poll(&store, &config(10)).await;
    let second = poll(&store, &config(10)).await;
    assert_eq!(first, PollOutcome::TimedOut);
    assert_eq!(first, second);

    marker(&store, 60);
    let third = poll(&store, &config(10)).await;
    let fourth = poll(&store, &config(10)).await;
    assert_eq!(third, PollOutcome::Found);
    assert_eq!(third, fourth);
}

#[tokio::test(start_paused = true)]
async fn interval_is_clamped_to_sane_range() {
    let store = RecordingStore::new("destination");
    let mut fast = config(3);
    fast.interval = Duration::ZERO;
    assert_eq!(poll(&store, &fast).await, PollOutcome::TimedOut);
    assert_eq!(store.listings_of(PREFIX), 3);

    let store = RecordingStore::new("destination");
    let mut slow = config(70);
    slow.interval = Duration::from_secs(600);
    let start = Instant::now();
    assert_eq!(poll(&store, &slow).await, PollOutcome::TimedOut);
    assert_eq!(store.listings_of(PREFIX), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(70));
}
