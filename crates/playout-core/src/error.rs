//! Error types and result aliases for the playout relay.
//!
//! Gateway errors carry a retryable-vs-fatal distinction so callers can decide
//! whether another attempt makes sense. Permission faults are always fatal;
//! throttling and connectivity faults are retryable at the caller's discretion.

/// The result type used throughout `playout-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blob store, credential and configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested object or bucket does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller's identity is not allowed to perform the operation.
    #[error("access denied: {message}")]
    AccessDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// A throttling, timeout or connectivity fault. Safe to retry.
    #[error("service unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Any other storage failure. Not retryable.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Exchanging credentials for a scoped identity failed.
    #[error("credential exchange failed: {message}")]
    Credentials {
        /// Description of the failure.
        message: String,
        /// Whether the broker rejected the identity (as opposed to being unreachable).
        denied: bool,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new retryable error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new access denied error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Returns true when another attempt could succeed without any change
    /// in configuration or permissions.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns true for authorization faults, including a rejected credential exchange.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            Self::AccessDenied { .. } | Self::Credentials { denied: true, .. }
        )
    }
}
