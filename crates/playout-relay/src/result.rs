//! Invocation result returned to the invoker.

use playout_core::work_order::WorkOrderStatus;
use serde::Serialize;

use crate::poller::PollOutcome;

/// Final status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Delivered, and confirmed when polling was requested.
    Success,
    /// Delivered, but consumption was not confirmed.
    InProgress,
    /// Not delivered.
    Error,
}

impl TransferStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::InProgress => "IN_PROGRESS",
            Self::Error => "ERROR",
        }
    }

    /// The work-order status reported for this final status.
    #[must_use]
    pub fn work_order_status(self) -> WorkOrderStatus {
        match self {
            Self::Success => WorkOrderStatus::Success,
            Self::InProgress => WorkOrderStatus::InProgress,
            Self::Error => WorkOrderStatus::Error,
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured result of one invocation.
///
/// `processed_found` is always serialised (`null` when no poll ran); the
/// other optional fields are omitted when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    /// Final status.
    pub status: TransferStatus,
    /// Human-readable summary.
    pub message: String,
    /// URI of the archived copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_json: Option<String>,
    /// URI of the destination copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vipe_json: Option<String>,
    /// Artifact name, when one was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Channel the completion marker is looked up under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Whether polling was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling_enabled: Option<bool>,
    /// Whether the completion marker was found; `None` when no poll ran.
    pub processed_found: Option<bool>,
    /// Done path relative to the destination's top-level folder, when polling was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_path: Option<String>,
    /// Poll outcome, when a poll ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_outcome: Option<PollOutcome>,
}

impl TransferResult {
    /// Creates an `ERROR` result.
    #[must_use]
    pub fn error(message: impl Into<String>, file_name: Option<String>) -> Self {
        Self {
            status: TransferStatus::Error,
            message: message.into(),
            archived_json: None,
            vipe_json: None,
            file_name,
            channel: None,
            polling_enabled: None,
            processed_found: None,
            processed_path: None,
            poll_outcome: None,
        }
    }

    /// Returns true for an `ERROR` result.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == TransferStatus::Error
    }
}
