//! Credential brokers for cross-account store access.
//!
//! A broker exchanges the process identity for a short-lived, role-scoped
//! identity and hands back a [`BlobStore`] authenticated with it. The returned
//! gateway honours the same contract as the primary one, so callers never
//! learn which account they are talking to.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_sts::error::{ProvideErrorMetadata, SdkError};
use aws_types::SdkConfig;
use metrics::counter;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::observability::Redacted;
use crate::s3::S3Backend;
use crate::storage::BlobStore;

/// Minimum session duration accepted by STS (15 minutes).
pub const MIN_SESSION_DURATION: Duration = Duration::from_secs(900);

/// Maximum session duration for role chaining (1 hour).
pub const MAX_SESSION_DURATION: Duration = Duration::from_secs(3600);

const CREDENTIAL_EXCHANGES_TOTAL: &str = "playout_relay_credential_exchanges_total";

/// Clamps a session duration to the range STS accepts.
#[must_use]
pub fn clamp_session_duration(duration: Duration) -> Duration {
    duration.clamp(MIN_SESSION_DURATION, MAX_SESSION_DURATION)
}

/// Exchanges a long-lived identity for a cross-account scoped gateway.
#[async_trait]
pub trait CredentialBroker: Send + Sync + 'static {
    /// Assumes the cross-account role and returns a gateway over the
    /// destination store.
    ///
    /// Fails closed: a rejected identity yields `Error::Credentials { denied: true, .. }`.
    async fn assume_cross_account(&self) -> Result<Arc<dyn BlobStore>>;
}

/// Parameters of an `AssumeRole` exchange.
#[derive(Debug, Clone)]
pub struct AssumeRoleConfig {
    /// Role to assume in the destination account.
    pub role_arn: String,
    /// External ID the destination account expects.
    pub external_id: Redacted<String>,
    /// Session name recorded in the destination account's audit trail.
    pub session_name: String,
    /// Requested session duration (clamped to STS limits).
    pub session_duration: Duration,
    /// Bucket the scoped gateway targets.
    pub bucket: String,
}

/// STS-backed broker.
pub struct StsCredentialBroker {
    config: AssumeRoleConfig,
    sdk_config: SdkConfig,
    sts: aws_sdk_sts::Client,
}

impl std::fmt::Debug for StsCredentialBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StsCredentialBroker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StsCredentialBroker {
    /// Creates a broker over the given SDK configuration.
    #[must_use]
    pub fn new(sdk_config: SdkConfig, config: AssumeRoleConfig) -> Self {
        let sts = aws_sdk_sts::Client::new(&sdk_config);
        Self {
            config,
            sdk_config,
            sts,
        }
    }

    /// Creates a broker using the process's default credential chain.
    pub async fn from_environment(config: AssumeRoleConfig) -> Self {
        Self::new(aws_config::load_from_env().await, config)
    }

    fn session_duration_secs(&self) -> i32 {
        let secs = clamp_session_duration(self.config.session_duration).as_secs();
        i32::try_from(secs).unwrap_or(i32::MAX)
    }
}

#[async_trait]
impl CredentialBroker for StsCredentialBroker {
    #[instrument(skip(self), fields(role_arn = %self.config.role_arn))]
    async fn assume_cross_account(&self) -> Result<Arc<dyn BlobStore>> {
        let response = self
            .sts
            .assume_role()
            .role_arn(&self.config.role_arn)
            .role_session_name(&self.config.session_name)
            .external_id(self.config.external_id.expose())
            .duration_seconds(self.session_duration_secs())
            .send()
            .await
            .map_err(|e| {
                counter!(CREDENTIAL_EXCHANGES_TOTAL, "result" => "error").increment(1);
                classify_sts_error(&self.config.role_arn, e)
            })?;

        let Some(issued) = response.credentials() else {
            counter!(CREDENTIAL_EXCHANGES_TOTAL, "result" => "error").increment(1);
            return Err(Error::Credentials {
                message: format!("AssumeRole {} returned no credentials", self.config.role_arn),
                denied: false,
            });
        };

        let expires_at = SystemTime::try_from(*issued.expiration()).ok();
        let credentials = Credentials::new(
            issued.access_key_id(),
            issued.secret_access_key(),
            Some(issued.session_token().to_string()),
            expires_at,
            "playout-relay-assume-role",
        );

        let s3_config = aws_sdk_s3::config::Builder::from(&self.sdk_config)
            .credentials_provider(credentials)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);

        counter!(CREDENTIAL_EXCHANGES_TOTAL, "result" => "ok").increment(1);
        info!(bucket = %self.config.bucket, "cross-account session established");

        Ok(Arc::new(S3Backend::new(client, self.config.bucket.clone())))
    }
}

fn classify_sts_error<E>(
    role_arn: &str,
    err: SdkError<E, aws_smithy_runtime_api::client::orchestrator::HttpResponse>,
) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().unwrap_or("-").to_string();
    let denied = status == Some(403)
        || matches!(
            code.as_str(),
            "AccessDenied" | "AccessDeniedException" | "ExpiredToken" | "InvalidClientTokenId"
        );

    if denied {
        warn!(role_arn, code = %code, "cross-account role assumption denied");
    }

    Error::Credentials {
        message: format!("AssumeRole {role_arn} failed (code={code}): {err}"),
        denied,
    }
}
