//! Command-line entry point.
//!
//! Reads one invocation payload, runs it through the pipeline against the
//! real stores and prints the result as JSON on stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use playout_core::config::RelayConfig;
use playout_core::credentials::StsCredentialBroker;
use playout_core::observability::{LogFormat, init_logging};
use playout_core::s3::S3Backend;
use playout_core::work_order::LoggingReporter;
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::context::InvocationContext;
use crate::pipeline::TransferPipeline;
use crate::request::InvocationEvent;
use crate::result::TransferResult;
use crate::transform::XmlDocumentTransform;

/// Relays one schedule file to the destination store.
#[derive(Debug, Parser)]
#[command(name = "playout-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path of the invocation payload JSON, or `-` for stdin.
    #[arg(long, default_value = "-")]
    pub event: String,

    /// Total execution budget of this invocation, in seconds.
    #[arg(long, env = "RELAY_BUDGET_SECS", default_value_t = 900)]
    pub budget_secs: u64,

    /// Log format; overrides `RELAY_LOG_FORMAT`.
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Returns the execution budget.
    #[must_use]
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }

    async fn read_event(&self) -> Result<Vec<u8>> {
        if self.event == "-" {
            let mut raw = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut raw)
                .await
                .context("failed to read event from stdin")?;
            return Ok(raw);
        }
        let path = PathBuf::from(&self.event);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read event file {}", path.display()))
    }
}

/// Loads configuration, wires the production collaborators and runs one
/// invocation.
///
/// # Errors
///
/// Returns an error when configuration is invalid or the payload cannot be
/// read. A payload that is read but invalid yields an `ERROR` result instead.
pub async fn run(cli: &Cli) -> Result<TransferResult> {
    let ctx = InvocationContext::with_budget(cli.budget());

    let config = RelayConfig::from_env().context("invalid relay configuration")?;
    init_logging(cli.log_format.unwrap_or(config.log_format));
    info!(
        environment = %config.environment,
        region = %config.region,
        schedule_bucket = %config.schedule_bucket,
        destination_bucket = %config.destination_bucket,
        "relay configured"
    );

    let raw = cli.read_event().await?;
    let event = match InvocationEvent::from_json(&raw) {
        Ok(event) => event,
        Err(e) => return Ok(TransferResult::error(e.to_string(), None)),
    };

    let primary = Arc::new(S3Backend::from_environment(config.schedule_bucket.clone()).await);
    let broker = Arc::new(StsCredentialBroker::from_environment(config.assume_role_config()).await);
    let pipeline = TransferPipeline::from_config(
        &config,
        primary,
        broker,
        Arc::new(XmlDocumentTransform),
        Arc::new(LoggingReporter),
    );

    Ok(pipeline.execute(&event, &ctx).await)
}
