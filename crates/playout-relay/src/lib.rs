//! # playout-relay
//!
//! Moves a schedule file from the ingest prefix into the archive and a
//! cross-account destination, then optionally confirms that the downstream
//! processor consumed it.
//!
//! ## Components
//!
//! - **Request**: payload parsing and validation in a fixed order
//! - **Identity**: every key an invocation touches, derived from the file name
//! - **Transform**: the seam to the schedule conversion, with an XML default
//! - **Pipeline**: fetch, check, transform, dual upload, confirm
//! - **Poller**: bounded listing loop that looks for the completion marker
//!
//! ## Example
//!
//! ```rust
//! use playout_relay::identity::{ArtifactIdentity, KeyLayout};
//!
//! let id = ArtifactIdentity::derive(&KeyLayout::default(), "SCH.xml", "ARQTV3", "ARQTV3")
//!     .expect("xml name");
//! assert_eq!(id.destination_key, "rt-demo/schedules/ARQTV3/SCH.json");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod cli;
pub mod context;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod pipeline;
pub mod poller;
pub mod request;
pub mod result;
pub mod transform;

pub use context::InvocationContext;
pub use error::{TransferError, UploadTarget};
pub use pipeline::TransferPipeline;
pub use poller::{AgeWindow, CompletionPoller, PollConfig, PollOutcome};
pub use request::{InvocationEvent, TransferRequest};
pub use result::{TransferResult, TransferStatus};
pub use transform::{ScheduleTransform, XmlDocumentTransform};
