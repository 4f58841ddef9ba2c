//! # playout-core
//!
//! Shared primitives for the playout schedule relay.
//!
//! This crate provides the capabilities the relay is built on:
//!
//! - **Blob Stores**: one gateway trait over object storage, with S3 and
//!   in-memory backends
//! - **Credential Brokers**: cross-account role assumption that yields a scoped
//!   blob store
//! - **Work-Order Reporting**: the status ledger interface and a best-effort
//!   reporting helper
//! - **Configuration**: environment-derived settings, loaded once at startup
//! - **Observability**: logging initialisation, spans and redaction
//!
//! ## Example
//!
//! ```rust
//! use playout_core::prelude::*;
//!
//! let store = MemoryBackend::new("archive");
//! assert_eq!(store.uri("a.json"), "memory://archive/a.json");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod observability;
pub mod s3;
pub mod storage;
pub mod work_order;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use playout_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::{PollDefaults, RelayConfig};
    pub use crate::credentials::{AssumeRoleConfig, CredentialBroker, StsCredentialBroker};
    pub use crate::error::{Error, Result};
    pub use crate::observability::{LogFormat, Redacted};
    pub use crate::s3::S3Backend;
    pub use crate::storage::{BlobStore, ListPage, MemoryBackend, ObjectAcl, ObjectMeta};
    pub use crate::work_order::{WorkOrderReporter, WorkOrderStatus};
}

pub use error::{Error, Result};
pub use storage::{BlobStore, MemoryBackend, ObjectAcl, ObjectMeta};
