//! Pre-built fixtures for relay scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use playout_core::clock::{Clock, FixedClock};
use playout_core::config::RelayConfig;
use playout_relay::identity::KeyLayout;
use playout_relay::request::InvocationEvent;
use playout_relay::{TransferPipeline, XmlDocumentTransform};

use crate::doubles::{RecordingReporter, StaticBroker};
use crate::storage::RecordingStore;

/// A small well-formed schedule.
pub const SCHEDULE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Schedule channel="HHUN" date="2025-05-15">
    <Event id="1" start="06:00:00:00">
        <Title>Morning News</Title>
        <Duration>00:30:00:00</Duration>
    </Event>
    <Event id="2" start="06:30:00:00">
        <Title>Weather</Title>
        <Duration>00:05:00:00</Duration>
    </Event>
</Schedule>
"#;

/// A truncated schedule.
pub const MALFORMED_XML: &str = "<Schedule channel=\"HHUN\"><Event id=\"1\"><Title>Morning</Event>";

/// Work order used by fixtures.
pub const WORK_ORDER_ID: &str = "3f2b8c1e-9d4a-4e6b-8f0a-1c2d3e4f5a6b";

/// Fixed "now" every fixture clock starts at.
pub fn fixture_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_747_300_000, 0).unwrap()
}

/// Builds an event for `file_name` on `channel_id`.
pub fn event(file_name: &str, channel_id: &str) -> InvocationEvent {
    InvocationEvent {
        file_name: Some(file_name.to_string()),
        vipe_channel_id: Some(channel_id.to_string()),
        work_order_id: Some(WORK_ORDER_ID.to_string()),
        ..InvocationEvent::default()
    }
}

/// Builds an event with polling enabled.
pub fn polling_event(file_name: &str, channel_id: &str, max_wait_secs: f64) -> InvocationEvent {
    InvocationEvent {
        enable_polling: Some(true),
        poll_max_wait_time: Some(max_wait_secs),
        poll_interval: Some(5.0),
        ..event(file_name, channel_id)
    }
}

/// Environment with every required relay variable set.
pub fn relay_env() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("ENVIRONMENT", "uat"),
        ("AWS_ACCOUNT_ID", "111122223333"),
        ("AWS_REGION", "eu-west-2"),
        ("VIPE_CROSS_ACCOUNT_ID", "444455556666"),
        ("VIPE_CROSS_ACCOUNT_ROLE_NAME", "vipe-schedule-upload"),
        ("VIPE_CROSS_ACCOUNT_EXTERNAL_ID", "playout"),
    ])
}

/// Loads a [`RelayConfig`] from [`relay_env`].
pub fn relay_config() -> RelayConfig {
    let env = relay_env();
    RelayConfig::from_lookup(|name| env.get(name).map(|v| (*v).to_string()))
        .expect("fixture config is valid")
}

/// A pipeline wired to recording doubles.
pub struct RelayHarness {
    /// Primary store (ingest and archive).
    pub primary: Arc<RecordingStore>,
    /// Cross-account destination store.
    pub destination: Arc<RecordingStore>,
    /// Broker handing out `destination`.
    pub broker: Arc<StaticBroker<RecordingStore>>,
    /// Work-order reporter.
    pub reporter: Arc<RecordingReporter>,
    /// Clock marker ages and upload stamps are computed against.
    pub clock: FixedClock,
    /// Pipeline under test.
    pub pipeline: TransferPipeline,
}

impl RelayHarness {
    /// Creates a harness with default layout and poll settings.
    pub fn new() -> Self {
        Self::build(RecordingStore::new("destination"), RecordingReporter::new(), false)
    }

    /// Creates a harness whose destination store pages listings by `page_size`.
    pub fn with_destination_page_size(page_size: usize) -> Self {
        Self::build(
            RecordingStore::new("destination").with_page_size(page_size),
            RecordingReporter::new(),
            false,
        )
    }

    /// Creates a harness whose broker denies every exchange.
    pub fn with_denying_broker() -> Self {
        Self::build(RecordingStore::new("destination"), RecordingReporter::new(), true)
    }

    /// Creates a harness whose reporter fails every update.
    pub fn with_failing_reporter() -> Self {
        Self::build(RecordingStore::new("destination"), RecordingReporter::failing(), false)
    }

    fn build(destination: RecordingStore, reporter: RecordingReporter, deny: bool) -> Self {
        let clock = FixedClock::new(fixture_now());
        let primary = Arc::new(RecordingStore::new("primary").with_clock(Arc::new(clock.clone())));
        let destination = Arc::new(destination.with_clock(Arc::new(clock.clone())));
        let broker = Arc::new(if deny {
            StaticBroker::denying()
        } else {
            StaticBroker::granting(destination.clone())
        });
        let reporter = Arc::new(reporter);
        let pipeline = TransferPipeline::from_config(
            &relay_config(),
            primary.clone(),
            broker.clone(),
            Arc::new(XmlDocumentTransform),
            reporter.clone(),
        )
        .with_clock(Arc::new(clock.clone()));

        Self {
            primary,
            destination,
            broker,
            reporter,
            clock,
            pipeline,
        }
    }

    /// Places `xml` at the ingest key of `file_name`.
    pub fn seed_source(&self, file_name: &str, xml: &str) {
        self.primary.insert(
            &format!("{}/{file_name}", KeyLayout::default().ingest_prefix),
            xml.as_bytes().to_vec(),
            Some(fixture_now()),
        );
    }

    /// Places a completion marker for `file_name` under `channel`, `age_secs`
    /// old on the harness clock, visible after `after_listings` listings.
    pub fn seed_marker(&self, file_name: &str, channel: &str, age_secs: i64, after_listings: u32) {
        let written = self.clock.now() - TimeDelta::seconds(age_secs);
        let stem = file_name.strip_suffix(".xml").unwrap_or(file_name);
        let key = format!(
            "{}/{channel}/done/{stem}.json.done.{}",
            KeyLayout::default().done_prefix_base,
            written.format("%Y%m%d%H%M%S")
        );
        self.destination
            .insert_after_listings(&key, Vec::<u8>::new(), Some(written), after_listings);
    }
}

impl Default for RelayHarness {
    fn default() -> Self {
        Self::new()
    }
}
