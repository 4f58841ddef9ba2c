//! Invocation payload and request validation.
//!
//! [`InvocationEvent`] is the raw JSON payload as the invoker sends it; every
//! field is optional at this layer so that a missing field becomes a
//! field-specific validation message instead of a deserialization failure.
//! [`InvocationEvent::validate`] turns it into a [`TransferRequest`].

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TransferError};

/// Default frame rate when the payload does not carry one.
pub const DEFAULT_FPS: f64 = 25.0;

/// Extension every ingest artifact must carry.
pub const SOURCE_EXTENSION: &str = ".xml";

/// Raw invocation payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationEvent {
    /// Artifact name under the ingest prefix.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Destination channel identifier.
    #[serde(default)]
    pub vipe_channel_id: Option<String>,
    /// Channel the completion marker is written under; defaults to `vipe_channel_id`.
    #[serde(default)]
    pub channel: Option<String>,
    /// Work order to report against.
    #[serde(default)]
    pub work_order_id: Option<String>,
    /// Frame rate handed to the transform stage.
    #[serde(default)]
    pub fps: Option<f64>,
    /// Whether to wait for the downstream completion marker.
    #[serde(default)]
    pub enable_polling: Option<bool>,
    /// Upper bound on the poll, in seconds.
    #[serde(default)]
    pub poll_max_wait_time: Option<f64>,
    /// Interval between listings, in seconds.
    #[serde(default)]
    pub poll_interval: Option<f64>,
}

/// A validated transfer request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    /// Artifact name, ending in `.xml`.
    pub file_name: String,
    /// Destination channel identifier.
    pub vipe_channel_id: String,
    /// Channel the completion marker is written under.
    pub channel: String,
    /// Work order to report against, as given.
    pub work_order_id: Option<String>,
    /// Frame rate handed to the transform stage.
    pub fps: f64,
    /// Whether to wait for the downstream completion marker.
    pub polling_enabled: bool,
    /// Caller-supplied upper bound on the poll.
    pub poll_max_wait: Option<Duration>,
    /// Caller-supplied interval between listings.
    pub poll_interval: Option<Duration>,
}

impl InvocationEvent {
    /// Parses a payload from JSON.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the payload is not a JSON object of the
    /// expected shape.
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| TransferError::validation("event", format!("Invalid event payload: {e}")))
    }

    /// Validates the payload.
    ///
    /// Checks run in a fixed order and the first failure wins: `file_name`
    /// present, `vipe_channel_id` present, `.xml` extension, `file_name`
    /// shape, `fps`, poll durations.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<TransferRequest> {
        let file_name = non_empty(self.file_name.as_deref()).ok_or_else(|| {
            TransferError::validation("file_name", "Missing required 'file_name' in event payload")
        })?;

        let vipe_channel_id = non_empty(self.vipe_channel_id.as_deref()).ok_or_else(|| {
            TransferError::validation(
                "vipe_channel_id",
                "Missing required 'vipe_channel_id' in event payload",
            )
        })?;

        let Some(stem) = file_name.strip_suffix(SOURCE_EXTENSION) else {
            return Err(TransferError::validation(
                "file_name",
                "Input file must have a .xml extension",
            ));
        };

        // Without a separator the name is a single key segment; "." and ".."
        // cannot end in ".xml".
        if stem.is_empty() || file_name.contains('/') {
            return Err(TransferError::validation(
                "file_name",
                format!("Invalid file_name '{file_name}': must be a bare file name"),
            ));
        }

        let fps = self.fps.unwrap_or(DEFAULT_FPS);
        if !fps.is_finite() || fps <= 0.0 {
            return Err(TransferError::validation(
                "fps",
                format!("Invalid fps {fps}: must be a positive number"),
            ));
        }

        let poll_max_wait = seconds("poll_max_wait_time", self.poll_max_wait_time)?;
        let poll_interval = seconds("poll_interval", self.poll_interval)?;

        let channel = non_empty(self.channel.as_deref()).unwrap_or(vipe_channel_id);

        Ok(TransferRequest {
            file_name: file_name.to_string(),
            vipe_channel_id: vipe_channel_id.to_string(),
            channel: channel.to_string(),
            work_order_id: self.work_order_id.clone(),
            fps,
            polling_enabled: self.enable_polling.unwrap_or(false),
            poll_max_wait,
            poll_interval,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn seconds(field: &'static str, value: Option<f64>) -> Result<Option<Duration>> {
    let Some(secs) = value else {
        return Ok(None);
    };
    if !secs.is_finite() || secs < 0.0 {
        return Err(TransferError::validation(
            field,
            format!("Invalid {field} {secs}: must be a non-negative number of seconds"),
        ));
    }
    Duration::try_from_secs_f64(secs).map(Some).map_err(|e| {
        TransferError::validation(field, format!("Invalid {field} {secs}: {e}"))
    })
}
