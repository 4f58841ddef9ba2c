//! Shared test utilities for playout relay integration tests.
//!
//! This crate provides:
//! - [`RecordingStore`]: In-memory blob store with operation recording and fault injection
//! - [`RecordingReporter`] and [`StaticBroker`]: doubles for the external collaborators
//! - [`RelayHarness`]: a pipeline wired to the doubles
//!
//! # Example
//!
//! ```rust,ignore
//! use playout_test_utils::{RelayHarness, SCHEDULE_XML, event};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let harness = RelayHarness::new();
//!     harness.seed_source("SCH.xml", SCHEDULE_XML);
//!     // ... run the pipeline ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod doubles;
pub mod fixtures;
pub mod storage;

pub use doubles::*;
pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("playout=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
