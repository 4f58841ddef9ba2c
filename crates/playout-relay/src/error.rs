//! Error types for the transfer pipeline.
//!
//! Everything upstream of polling is fatal to an invocation and is expressed
//! as a [`TransferError`]. Poll results are values ([`crate::poller::PollOutcome`]),
//! never errors: an unconfirmed delivery is still a delivery.

/// The result type used throughout `playout-relay`.
pub type Result<T> = std::result::Result<T, TransferError>;

/// Which upload leg failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    /// The primary account's archive prefix.
    Archive,
    /// The cross-account destination store.
    Destination,
}

impl std::fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Archive => "archive",
            Self::Destination => "destination",
        })
    }
}

/// Errors that end a transfer invocation.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The request is missing a field or carries an invalid one. No I/O was attempted.
    #[error("{message}")]
    Validation {
        /// The offending request field.
        field: &'static str,
        /// Human-readable description.
        message: String,
    },

    /// The source artifact could not be read.
    #[error("failed to fetch {key}: {source}")]
    Fetch {
        /// The source key.
        key: String,
        /// The gateway error.
        #[source]
        source: playout_core::Error,
    },

    /// The source artifact is not structurally valid.
    #[error("File {file_name} contains malformed XML: {message}")]
    MalformedInput {
        /// The artifact name.
        file_name: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The transform stage rejected or failed on the artifact.
    #[error("transform failed: {message}")]
    Transform {
        /// Description of the failure.
        message: String,
    },

    /// Writing the transformed artifact failed.
    #[error("failed to upload to {target} key {key}: {source}")]
    Upload {
        /// Which leg failed.
        target: UploadTarget,
        /// The destination key.
        key: String,
        /// The gateway error.
        #[source]
        source: playout_core::Error,
    },

    /// The credential broker refused or failed to issue a scoped identity.
    #[error("cross-account credential exchange failed: {0}")]
    Credential(#[source] playout_core::Error),
}

impl TransferError {
    /// Creates a validation error for `field`.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns true when the error was raised before any I/O.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Short machine-readable kind, used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Fetch { .. } => "fetch",
            Self::MalformedInput { .. } => "malformed_input",
            Self::Transform { .. } => "transform",
            Self::Upload { .. } => "upload",
            Self::Credential(_) => "credential",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_shown_verbatim() {
        let err = TransferError::validation("file_name", "Missing required 'file_name' in event payload");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Missing required 'file_name' in event payload");
    }

    #[test]
    fn upload_error_names_leg_and_key() {
        let err = TransferError::Upload {
            target: UploadTarget::Destination,
            key: "rt-demo/schedules/ARQTV3/SCH.json".into(),
            source: playout_core::Error::access_denied("PutObject"),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("destination"));
        assert!(rendered.contains("rt-demo/schedules/ARQTV3/SCH.json"));
        assert_eq!(err.kind(), "upload");
    }
}
