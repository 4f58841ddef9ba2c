//! Relay metrics.
//!
//! Recorded through the `metrics` crate facade; the binary installs no
//! exporter, so without a recorder every call is a no-op.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `playout_relay_transfers_total` | Counter | `status` | Invocations by final status |
//! | `playout_relay_poll_attempts_total` | Counter | - | Completion-marker listings performed |
//! | `playout_relay_poll_outcomes_total` | Counter | `outcome` | Poll loops by terminal outcome |
//! | `playout_relay_poll_duration_seconds` | Histogram | `outcome` | Wall time spent in a poll loop |
//! | `playout_relay_credential_exchanges_total` | Counter | `result` | Cross-account role assumptions (recorded by `playout-core`) |

use std::time::Duration;

use metrics::{counter, histogram};

use crate::poller::PollOutcome;
use crate::result::TransferStatus;

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Invocations by final status.
    pub const TRANSFERS_TOTAL: &str = "playout_relay_transfers_total";
    /// Counter: Completion-marker listings performed.
    pub const POLL_ATTEMPTS_TOTAL: &str = "playout_relay_poll_attempts_total";
    /// Counter: Poll loops by terminal outcome.
    pub const POLL_OUTCOMES_TOTAL: &str = "playout_relay_poll_outcomes_total";
    /// Histogram: Wall time spent in a poll loop, in seconds.
    pub const POLL_DURATION_SECONDS: &str = "playout_relay_poll_duration_seconds";
}

/// Label keys used across metrics.
pub mod labels {
    /// Final transfer status (`SUCCESS`, `IN_PROGRESS`, `ERROR`).
    pub const STATUS: &str = "status";
    /// Poll outcome (`FOUND`, `TIMED_OUT`, ...).
    pub const OUTCOME: &str = "outcome";
}

/// Records a finished invocation.
pub fn record_transfer(status: TransferStatus) {
    counter!(names::TRANSFERS_TOTAL, labels::STATUS => status.as_str()).increment(1);
}

/// Records one listing of the done prefix.
pub fn record_poll_attempt() {
    counter!(names::POLL_ATTEMPTS_TOTAL).increment(1);
}

/// Records the terminal outcome of a poll loop and how long it ran.
pub fn record_poll_outcome(outcome: PollOutcome, elapsed: Duration) {
    counter!(names::POLL_OUTCOMES_TOTAL, labels::OUTCOME => outcome.as_str()).increment(1);
    histogram!(names::POLL_DURATION_SECONDS, labels::OUTCOME => outcome.as_str())
        .record(elapsed.as_secs_f64());
}
