//! Relay configuration.
//!
//! Built once at process start from the environment and passed into the
//! pipeline, gateway and broker constructors. Nothing reads the environment
//! after [`RelayConfig::from_env`] returns.

use std::time::Duration;

use crate::credentials::{AssumeRoleConfig, clamp_session_duration};
use crate::error::{Error, Result};
use crate::observability::{LogFormat, Redacted};

const DEFAULT_INGEST_PREFIX: &str = "tx-schedules/incoming";
const DEFAULT_ARCHIVE_PREFIX: &str = "tx-schedules/archive";
const DEFAULT_DESTINATION_PREFIX_BASE: &str = "rt-demo/schedules";
const DEFAULT_DONE_PREFIX_BASE: &str = "rt-demo/procschedules";
const DEFAULT_SESSION_NAME: &str = "VipeS3UploadSession";

/// Cross-account access settings.
#[derive(Debug, Clone)]
pub struct CrossAccountConfig {
    /// Destination account ID.
    pub account_id: String,
    /// Role to assume in the destination account.
    pub role_arn: String,
    /// External ID the destination account expects.
    pub external_id: Redacted<String>,
    /// STS session name.
    pub session_name: String,
    /// Requested STS session duration.
    pub session_duration: Duration,
}

/// Completion-poll defaults applied by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDefaults {
    /// Interval between listings when the request does not set one.
    pub interval: Duration,
    /// Time kept back from the invocation budget for reporting and cleanup.
    pub safety_margin: Duration,
    /// Youngest marker age accepted.
    pub marker_min_age: Duration,
    /// How long before this run's destination upload a marker may have been
    /// written and still count. Also added to the poll budget to form the
    /// oldest marker age accepted.
    pub marker_age_slack: Duration,
    /// Consecutive non-permission listing failures tolerated before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for PollDefaults {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            safety_margin: Duration::from_secs(5),
            marker_min_age: Duration::ZERO,
            marker_age_slack: Duration::from_secs(60),
            max_consecutive_errors: 3,
        }
    }
}

/// Configuration for the schedule relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Deployment environment name (e.g. `uat`).
    pub environment: String,
    /// AWS region of the primary account.
    pub region: String,
    /// Primary account ID.
    pub account_id: String,
    /// Bucket holding ingest and archive prefixes.
    pub schedule_bucket: String,
    /// Prefix new schedules arrive under.
    pub ingest_prefix: String,
    /// Prefix transformed schedules are archived under.
    pub archive_prefix: String,
    /// Cross-account destination bucket.
    pub destination_bucket: String,
    /// Base prefix for destination uploads (`{base}/{channel_id}/...`).
    pub destination_prefix_base: String,
    /// Base prefix completion markers appear under (`{base}/{channel}/done/`).
    pub done_prefix_base: String,
    /// Cross-account settings.
    pub cross_account: CrossAccountConfig,
    /// Poll defaults.
    pub poll: PollDefaults,
    /// Log output format.
    pub log_format: LogFormat,
}

impl RelayConfig {
    /// Loads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when a required one is missing
    /// or any value fails to parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`RelayConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let environment = env.required("ENVIRONMENT")?;
        let account_id = env.required("AWS_ACCOUNT_ID")?;
        let region = env.required("AWS_REGION")?;
        let cross_account_id = env.required("VIPE_CROSS_ACCOUNT_ID")?;
        let role_name = env.required("VIPE_CROSS_ACCOUNT_ROLE_NAME")?;
        let external_id_base = env.required("VIPE_CROSS_ACCOUNT_EXTERNAL_ID")?;

        let defaults = PollDefaults::default();
        let poll = PollDefaults {
            interval: env
                .secs("RELAY_POLL_INTERVAL_SECS")?
                .unwrap_or(defaults.interval),
            safety_margin: env
                .secs("RELAY_SAFETY_MARGIN_SECS")?
                .unwrap_or(defaults.safety_margin),
            marker_min_age: env
                .secs("RELAY_MARKER_MIN_AGE_SECS")?
                .unwrap_or(defaults.marker_min_age),
            marker_age_slack: env
                .secs("RELAY_MARKER_AGE_SLACK_SECS")?
                .unwrap_or(defaults.marker_age_slack),
            max_consecutive_errors: match env.u64("RELAY_MAX_CONSECUTIVE_LIST_ERRORS")? {
                Some(0) => {
                    return Err(Error::InvalidInput(
                        "RELAY_MAX_CONSECUTIVE_LIST_ERRORS must be greater than 0".to_string(),
                    ));
                }
                Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
                None => defaults.max_consecutive_errors,
            },
        };

        // At upload time the accepted ages are [min_age, slack].
        if poll.marker_min_age > poll.marker_age_slack {
            return Err(Error::InvalidInput(format!(
                "RELAY_MARKER_MIN_AGE_SECS ({}) must not exceed RELAY_MARKER_AGE_SLACK_SECS ({})",
                poll.marker_min_age.as_secs(),
                poll.marker_age_slack.as_secs()
            )));
        }

        let log_format = match env.string("RELAY_LOG_FORMAT") {
            Some(v) => v
                .parse()
                .map_err(|e| Error::InvalidInput(format!("RELAY_LOG_FORMAT: {e}")))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            schedule_bucket: format!("{environment}-playout-schedule-{account_id}"),
            ingest_prefix: env.prefix("SCHEDULE_S3_INGEST_PATH", DEFAULT_INGEST_PREFIX),
            archive_prefix: env.prefix("SCHEDULE_S3_DONE_PATH", DEFAULT_ARCHIVE_PREFIX),
            destination_bucket: env
                .string("VIPE_S3_BUCKET")
                .unwrap_or_else(|| format!("uat-inbound-media-files-{cross_account_id}")),
            destination_prefix_base: env
                .prefix("VIPE_S3_KEY_PREFIX_BASE", DEFAULT_DESTINATION_PREFIX_BASE),
            done_prefix_base: env.prefix("VIPE_S3_DONE_PATH", DEFAULT_DONE_PREFIX_BASE),
            cross_account: CrossAccountConfig {
                role_arn: format!("arn:aws:iam::{cross_account_id}:role/{environment}-{role_name}"),
                external_id: Redacted::new(format!("{environment}-{external_id_base}")),
                session_name: env
                    .string("RELAY_ASSUME_ROLE_SESSION_NAME")
                    .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string()),
                session_duration: clamp_session_duration(
                    env.secs("RELAY_ASSUME_ROLE_DURATION_SECS")?
                        .unwrap_or(Duration::from_secs(900)),
                ),
                account_id: cross_account_id,
            },
            poll,
            log_format,
            environment,
            account_id,
            region,
        })
    }

    /// Returns the STS exchange parameters for the destination account.
    #[must_use]
    pub fn assume_role_config(&self) -> AssumeRoleConfig {
        AssumeRoleConfig {
            role_arn: self.cross_account.role_arn.clone(),
            external_id: self.cross_account.external_id.clone(),
            session_name: self.cross_account.session_name.clone(),
            session_duration: self.cross_account.session_duration,
            bucket: self.destination_bucket.clone(),
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn required(&self, name: &str) -> Result<String> {
        self.string(name).ok_or_else(|| {
            Error::InvalidInput(format!("missing required environment variable: {name}"))
        })
    }

    fn prefix(&self, name: &str, default: &str) -> String {
        self.string(name)
            .unwrap_or_else(|| default.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    fn u64(&self, name: &str) -> Result<Option<u64>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u64>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
    }

    fn secs(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.u64(name)?.map(Duration::from_secs))
    }
}
