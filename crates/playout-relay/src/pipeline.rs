//! Transfer pipeline.
//!
//! One invocation runs, in order:
//!
//! 1. validate the request (no I/O on failure, nothing reported)
//! 2. fetch the source artifact from the primary store
//! 3. check it is well-formed
//! 4. transform it
//! 5. upload to the archive, assume the cross-account role, upload to the
//!    destination with owner transfer
//! 6. optionally poll the destination's done prefix for a completion marker
//!
//! Any failure in steps 2-5 ends the invocation with `ERROR`. A poll never
//! does: the artifact was delivered, only confirmation is missing, so every
//! outcome other than `FOUND` reduces to `IN_PROGRESS`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use playout_core::clock::Clock;
use playout_core::config::{PollDefaults, RelayConfig};
use playout_core::credentials::CredentialBroker;
use playout_core::observability::transfer_span;
use playout_core::storage::{BlobStore, ObjectAcl};
use playout_core::work_order::{WorkOrderReporter, report_best_effort};
use tracing::{Instrument, debug, error, info, warn};

use crate::context::InvocationContext;
use crate::error::{Result, TransferError, UploadTarget};
use crate::identity::{ArtifactIdentity, KeyLayout};
use crate::metrics;
use crate::poller::{AgeWindow, CompletionPoller, PollConfig, PollOutcome};
use crate::request::{InvocationEvent, TransferRequest};
use crate::result::{TransferResult, TransferStatus};
use crate::transform::ScheduleTransform;

/// Where the artifact landed.
struct Delivery {
    archived_uri: String,
    destination_uri: String,
    destination: Arc<dyn BlobStore>,
    uploaded_at: DateTime<Utc>,
}

/// How the post-upload phase ended.
struct Confirmation {
    status: TransferStatus,
    message: String,
    processed_found: Option<bool>,
    poll_outcome: Option<PollOutcome>,
}

/// Sequences fetch, transform, dual upload and completion polling.
pub struct TransferPipeline {
    primary: Arc<dyn BlobStore>,
    broker: Arc<dyn CredentialBroker>,
    transform: Arc<dyn ScheduleTransform>,
    reporter: Arc<dyn WorkOrderReporter>,
    poller: CompletionPoller,
    layout: KeyLayout,
    poll_defaults: PollDefaults,
}

impl std::fmt::Debug for TransferPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferPipeline")
            .field("primary", &self.primary.root_uri())
            .field("layout", &self.layout)
            .field("poll_defaults", &self.poll_defaults)
            .finish_non_exhaustive()
    }
}

impl TransferPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        primary: Arc<dyn BlobStore>,
        broker: Arc<dyn CredentialBroker>,
        transform: Arc<dyn ScheduleTransform>,
        reporter: Arc<dyn WorkOrderReporter>,
        layout: KeyLayout,
        poll_defaults: PollDefaults,
    ) -> Self {
        Self {
            primary,
            broker,
            transform,
            reporter,
            poller: CompletionPoller::default(),
            layout,
            poll_defaults,
        }
    }

    /// Creates a pipeline with layout and poll defaults taken from `config`.
    #[must_use]
    pub fn from_config(
        config: &RelayConfig,
        primary: Arc<dyn BlobStore>,
        broker: Arc<dyn CredentialBroker>,
        transform: Arc<dyn ScheduleTransform>,
        reporter: Arc<dyn WorkOrderReporter>,
    ) -> Self {
        Self::new(
            primary,
            broker,
            transform,
            reporter,
            KeyLayout::from_config(config),
            config.poll.clone(),
        )
    }

    /// Replaces the clock marker ages are computed against.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.poller = CompletionPoller::new(clock);
        self
    }

    /// Runs one invocation. Never fails: every error becomes an `ERROR` result.
    pub async fn execute(&self, event: &InvocationEvent, ctx: &InvocationContext) -> TransferResult {
        let result = match event.validate() {
            Ok(request) => {
                let span = transfer_span(
                    &request.file_name,
                    &request.channel,
                    request.work_order_id.as_deref(),
                );
                self.execute_validated(&request, ctx).instrument(span).await
            }
            Err(e) => {
                error!(error = %e, "rejected invocation payload");
                TransferResult::error(e.to_string(), event.file_name.clone())
            }
        };
        metrics::record_transfer(result.status);
        result
    }

    async fn execute_validated(
        &self,
        request: &TransferRequest,
        ctx: &InvocationContext,
    ) -> TransferResult {
        let Some(identity) = ArtifactIdentity::derive(
            &self.layout,
            &request.file_name,
            &request.vipe_channel_id,
            &request.channel,
        ) else {
            // Validation already checked the extension.
            return TransferResult::error(
                "Input file must have a .xml extension",
                Some(request.file_name.clone()),
            );
        };

        let delivery = match self.deliver(request, &identity).await {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(kind = e.kind(), error = %e, "transfer failed");
                self.report(request, TransferStatus::Error).await;
                let message = match e {
                    TransferError::MalformedInput { .. } => e.to_string(),
                    _ => format!("Error processing file {}: {e}", request.file_name),
                };
                return TransferResult::error(message, Some(request.file_name.clone()));
            }
        };

        let confirmation = if request.polling_enabled {
            self.confirm(request, &identity, &delivery, ctx).await
        } else {
            info!("polling disabled; skipping processed file check");
            Confirmation {
                status: TransferStatus::Success,
                message: format!(
                    "Schedule file '{}' successfully transformed and uploaded.",
                    request.file_name
                ),
                processed_found: None,
                poll_outcome: None,
            }
        };

        self.report(request, confirmation.status).await;

        TransferResult {
            status: confirmation.status,
            message: confirmation.message,
            archived_json: Some(delivery.archived_uri),
            vipe_json: Some(delivery.destination_uri),
            file_name: Some(request.file_name.clone()),
            channel: Some(request.channel.clone()),
            polling_enabled: Some(request.polling_enabled),
            processed_found: confirmation.processed_found,
            processed_path: request
                .polling_enabled
                .then(|| identity.processed_path.clone()),
            poll_outcome: confirmation.poll_outcome,
        }
    }

    /// Steps 2-5: everything that must succeed for the artifact to count as delivered.
    async fn deliver(
        &self,
        request: &TransferRequest,
        identity: &ArtifactIdentity,
    ) -> Result<Delivery> {
        info!(source = %self.primary.uri(&identity.source_key), "downloading source artifact");
        let source = self
            .primary
            .get(&identity.source_key)
            .await
            .map_err(|source| TransferError::Fetch {
                key: identity.source_key.clone(),
                source,
            })?;

        self.transform
            .check_well_formed(&request.file_name, &source)?;

        debug!(bytes = source.len(), "transforming artifact");
        let output: Bytes =
            self.transform
                .transform(&source, &request.vipe_channel_id, request.fps)?;

        info!(target = %self.primary.uri(&identity.archive_key), "uploading archive copy");
        self.primary
            .put(&identity.archive_key, output.clone(), ObjectAcl::Private)
            .await
            .map_err(|source| TransferError::Upload {
                target: UploadTarget::Archive,
                key: identity.archive_key.clone(),
                source,
            })?;

        info!("assuming cross-account role");
        let destination = self
            .broker
            .assume_cross_account()
            .await
            .map_err(TransferError::Credential)?;

        info!(
            target = %destination.uri(&identity.destination_key),
            "uploading destination copy with bucket-owner-full-control"
        );
        destination
            .put(
                &identity.destination_key,
                output,
                ObjectAcl::BucketOwnerFullControl,
            )
            .await
            .map_err(|source| TransferError::Upload {
                target: UploadTarget::Destination,
                key: identity.destination_key.clone(),
                source,
            })?;

        let uploaded_at = self.poller.now();

        info!("schedule file transformed and uploaded");
        Ok(Delivery {
            archived_uri: self.primary.uri(&identity.archive_key),
            destination_uri: destination.uri(&identity.destination_key),
            destination,
            uploaded_at,
        })
    }

    /// Step 6: wait for the completion marker within the remaining budget.
    async fn confirm(
        &self,
        request: &TransferRequest,
        identity: &ArtifactIdentity,
        delivery: &Delivery,
        ctx: &InvocationContext,
    ) -> Confirmation {
        let destination = delivery.destination.as_ref();
        let max_wait = self.poll_budget(request, ctx);
        let file_name = &request.file_name;

        if max_wait.is_zero() {
            warn!("not enough time remaining for polling");
            return Confirmation {
                status: TransferStatus::InProgress,
                message: format!(
                    "Schedule file '{file_name}' uploaded but insufficient time for polling."
                ),
                processed_found: None,
                poll_outcome: None,
            };
        }

        log_done_listing(destination, &identity.done_prefix).await;

        let config = PollConfig {
            max_wait,
            interval: request.poll_interval.unwrap_or(self.poll_defaults.interval),
            age_window: self.age_window(max_wait, delivery.uploaded_at),
            max_consecutive_errors: self.poll_defaults.max_consecutive_errors,
        };

        let outcome = self
            .poller
            .poll(
                destination,
                &identity.done_prefix,
                &identity.marker_prefix,
                &config,
            )
            .await;

        let (status, message) = match outcome {
            PollOutcome::Found => (
                TransferStatus::Success,
                format!(
                    "Schedule file '{file_name}' successfully processed and confirmed in done path."
                ),
            ),
            PollOutcome::TimedOut => (
                TransferStatus::InProgress,
                format!(
                    "Schedule file '{file_name}' uploaded but processed file not confirmed within timeout."
                ),
            ),
            PollOutcome::AccessDenied | PollOutcome::TransientError => (
                TransferStatus::InProgress,
                format!(
                    "Schedule file '{file_name}' uploaded but processing could not be confirmed."
                ),
            ),
        };

        Confirmation {
            status,
            message,
            processed_found: Some(outcome == PollOutcome::Found),
            poll_outcome: Some(outcome),
        }
    }

    /// Remaining invocation budget minus the safety margin, capped by the
    /// request's own wait limit.
    fn poll_budget(&self, request: &TransferRequest, ctx: &InvocationContext) -> Duration {
        let remaining = ctx
            .remaining()
            .saturating_sub(self.poll_defaults.safety_margin);
        request
            .poll_max_wait
            .map_or(remaining, |requested| requested.min(remaining))
    }

    /// Markers between `marker_min_age` old and `max_wait + slack` old that
    /// were written no earlier than `slack` before this run's upload.
    fn age_window(&self, max_wait: Duration, uploaded_at: DateTime<Utc>) -> AgeWindow {
        let slack = self.poll_defaults.marker_age_slack;
        let earliest = TimeDelta::from_std(slack)
            .ok()
            .and_then(|slack| uploaded_at.checked_sub_signed(slack))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        AgeWindow::new(
            self.poll_defaults.marker_min_age,
            max_wait.saturating_add(slack),
        )
        .not_before(earliest)
    }

    async fn report(&self, request: &TransferRequest, status: TransferStatus) {
        report_best_effort(
            self.reporter.as_ref(),
            request.work_order_id.as_deref(),
            status.work_order_status(),
        )
        .await;
    }
}

/// Logs what is currently under the done prefix. Failures are ignored.
async fn log_done_listing(destination: &dyn BlobStore, done_prefix: &str) {
    match destination.list_all(done_prefix).await {
        Ok(objects) => {
            let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
            debug!(prefix = done_prefix, ?keys, "files in done path");
        }
        Err(e) => {
            debug!(prefix = done_prefix, error = %e, "could not list done path");
        }
    }
}
