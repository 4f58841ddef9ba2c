//! Work-order status reporting.
//!
//! The work-order ledger lives outside this system. The relay only pushes
//! terminal status transitions through [`WorkOrderReporter`], and always does
//! so best-effort: a failed report is logged and never changes the outcome of
//! the transfer that produced it.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Result;

/// Status values understood by the work-order ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    /// Artifact delivered (and confirmed, when polling was requested).
    Success,
    /// Artifact delivered but downstream consumption is not confirmed.
    InProgress,
    /// The transfer failed.
    Error,
}

impl WorkOrderStatus {
    /// Returns the ledger's wire name for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::InProgress => "IN_PROGRESS",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives terminal status transitions for a work order.
#[async_trait]
pub trait WorkOrderReporter: Send + Sync + 'static {
    /// Records `status` against the work order `id`.
    async fn update_status(&self, id: Uuid, status: WorkOrderStatus) -> Result<()>;
}

/// Reporter that only writes the transition to the log.
///
/// Used when no ledger is wired in; the transition still shows up in the
/// structured log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter;

#[async_trait]
impl WorkOrderReporter for LoggingReporter {
    async fn update_status(&self, id: Uuid, status: WorkOrderStatus) -> Result<()> {
        info!(work_order_id = %id, %status, "work order status updated");
        Ok(())
    }
}

/// Parses a work-order identifier, accepting only UUID syntax.
#[must_use]
pub fn parse_work_order_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Reports `status` for `work_order_id` without ever failing.
///
/// A missing identifier is a no-op. A non-UUID identifier is skipped with a
/// warning. Reporter failures are logged at `error`.
pub async fn report_best_effort(
    reporter: &dyn WorkOrderReporter,
    work_order_id: Option<&str>,
    status: WorkOrderStatus,
) {
    let Some(raw) = work_order_id else {
        return;
    };
    let Some(id) = parse_work_order_id(raw) else {
        warn!(work_order_id = raw, "invalid work_order_id; skipping status update");
        return;
    };
    if let Err(e) = reporter.update_status(id, status).await {
        error!(work_order_id = %id, %status, error = %e, "failed to update work order status");
    }
}
