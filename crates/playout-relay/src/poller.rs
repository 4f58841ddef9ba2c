//! Completion poller.
//!
//! The downstream processor acknowledges a delivered artifact only by writing
//! a marker object under its done prefix. The poller repeatedly lists that
//! prefix until a marker whose basename starts with the expected prefix, and
//! which falls inside the [`AgeWindow`], shows up.
//!
//! ## Outcomes
//!
//! - `Found`: a matching marker was listed
//! - `TimedOut`: `max_wait` elapsed without a match
//! - `AccessDenied`: a listing was refused; returned on the first refusal
//! - `TransientError`: `max_consecutive_errors` listings in a row failed
//!   for any other reason
//!
//! Marker names are reused across runs of the same artifact, so the
//! store-reported last-modified time is what tells this run's marker apart
//! from a leftover one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::TryStreamExt;
use playout_core::clock::{Clock, SystemClock};
use playout_core::observability::poll_span;
use playout_core::storage::{BlobStore, ObjectMeta};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, warn};

use crate::metrics;

/// Shortest interval between listings.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Longest interval between listings.
pub const MAX_INTERVAL: Duration = Duration::from_secs(30);

/// Terminal result of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollOutcome {
    /// A matching marker was found.
    Found,
    /// The wait budget ran out without a match.
    TimedOut,
    /// Listing the done prefix was refused.
    AccessDenied,
    /// Listing kept failing for reasons other than permissions.
    TransientError,
}

impl PollOutcome {
    /// Returns the wire name of the outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Found => "FOUND",
            Self::TimedOut => "TIMED_OUT",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::TransientError => "TRANSIENT_ERROR",
        }
    }
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markers accepted as belonging to this run.
///
/// A marker matches when its age lies in `[min, max]` (inclusive) and, if
/// `not_before` is set, it was last modified no earlier than that instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeWindow {
    /// Youngest accepted age.
    pub min: Duration,
    /// Oldest accepted age.
    pub max: Duration,
    /// Earliest accepted last-modified time.
    pub not_before: Option<DateTime<Utc>>,
}

impl AgeWindow {
    /// Creates a window over marker ages. An inverted window matches nothing.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            not_before: None,
        }
    }

    /// Also rejects markers last modified before `earliest`.
    #[must_use]
    pub fn not_before(mut self, earliest: DateTime<Utc>) -> Self {
        self.not_before = Some(earliest);
        self
    }

    /// Returns true if `age` lies within `[min, max]`.
    ///
    /// A negative age (marker stamped in the future) never matches.
    #[must_use]
    pub fn contains(&self, age: TimeDelta) -> bool {
        let min = TimeDelta::from_std(self.min).unwrap_or(TimeDelta::MAX);
        let max = TimeDelta::from_std(self.max).unwrap_or(TimeDelta::MAX);
        min <= age && age <= max
    }

    /// Returns true if a marker last modified at `modified` matches at `now`.
    #[must_use]
    pub fn accepts(&self, modified: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.not_before.is_none_or(|earliest| modified >= earliest)
            && self.contains(now - modified)
    }
}

/// Parameters of one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Total time the loop may run.
    pub max_wait: Duration,
    /// Requested time between listings; clamped to `[MIN_INTERVAL, MAX_INTERVAL]`.
    pub interval: Duration,
    /// Accepted markers.
    pub age_window: AgeWindow,
    /// Consecutive non-permission listing failures tolerated.
    pub max_consecutive_errors: u32,
}

impl PollConfig {
    /// Returns the interval actually slept between listings.
    #[must_use]
    pub fn effective_interval(&self) -> Duration {
        self.interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
    }
}

/// Result of a single listing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// A marker inside the age window.
    Matched(ObjectMeta),
    /// No candidate matched.
    NoMatch {
        /// Objects whose basename matched but whose age did not.
        rejected: usize,
    },
}

/// Polls a done prefix for a completion marker.
#[derive(Clone)]
pub struct CompletionPoller {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CompletionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionPoller").finish_non_exhaustive()
    }
}

impl Default for CompletionPoller {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl CompletionPoller {
    /// Creates a poller that computes marker ages against `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Returns the current time on the clock marker ages are computed against.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Runs the poll loop until an outcome is reached.
    pub async fn poll(
        &self,
        store: &dyn BlobStore,
        prefix: &str,
        marker_prefix: &str,
        config: &PollConfig,
    ) -> PollOutcome {
        let started = Instant::now();
        let outcome = self
            .run(store, prefix, marker_prefix, config)
            .instrument(poll_span(prefix, marker_prefix))
            .await;
        metrics::record_poll_outcome(outcome, started.elapsed());
        outcome
    }

    async fn run(
        &self,
        store: &dyn BlobStore,
        prefix: &str,
        marker_prefix: &str,
        config: &PollConfig,
    ) -> PollOutcome {
        let deadline = Instant::now() + config.max_wait;
        let interval = config.effective_interval();
        let mut attempt: u32 = 0;
        let mut consecutive_errors: u32 = 0;

        info!(
            max_wait_secs = config.max_wait.as_secs_f64(),
            interval_secs = interval.as_secs_f64(),
            "polling for completion marker"
        );

        while Instant::now() < deadline {
            attempt += 1;
            metrics::record_poll_attempt();

            match self.scan(store, prefix, marker_prefix, config.age_window).await {
                Ok(Scan::Matched(marker)) => {
                    info!(attempt, key = %marker.key, "completion marker found");
                    return PollOutcome::Found;
                }
                Ok(Scan::NoMatch { rejected }) => {
                    consecutive_errors = 0;
                    debug!(attempt, rejected, "completion marker not found yet");
                }
                Err(e) if e.is_access_denied() => {
                    warn!(attempt, error = %e, "listing done prefix denied");
                    return PollOutcome::AccessDenied;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        attempt,
                        consecutive_errors,
                        retryable = e.is_retryable(),
                        error = %e,
                        "listing done prefix failed"
                    );
                    if consecutive_errors >= config.max_consecutive_errors.max(1) {
                        return PollOutcome::TransientError;
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(interval.min(remaining)).await;
        }

        info!(attempts = attempt, "completion marker not found within wait budget");
        PollOutcome::TimedOut
    }

    /// Lists `prefix` once and looks for a marker matching `marker_prefix`
    /// inside `window`.
    ///
    /// Stops paging at the first match; otherwise the whole listing is read.
    ///
    /// # Errors
    ///
    /// Returns the gateway error of the first page that fails.
    pub async fn scan(
        &self,
        store: &dyn BlobStore,
        prefix: &str,
        marker_prefix: &str,
        window: AgeWindow,
    ) -> playout_core::Result<Scan> {
        let now = self.clock.now();
        let mut rejected = 0;
        let mut listing = store.list(prefix);

        while let Some(object) = listing.try_next().await? {
            if !object.basename().starts_with(marker_prefix) {
                continue;
            }
            match object.last_modified {
                Some(modified) if window.accepts(modified, now) => {
                    return Ok(Scan::Matched(object));
                }
                Some(modified) => {
                    rejected += 1;
                    debug!(
                        key = %object.key,
                        age_secs = (now - modified).num_seconds(),
                        "marker outside age window"
                    );
                }
                None => {
                    rejected += 1;
                    debug!(key = %object.key, "marker has no last-modified time");
                }
            }
        }

        Ok(Scan::NoMatch { rejected })
    }
}
