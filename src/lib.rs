//! # qrport
//!
//! Encode content into QR code images and publish them to an object-storage bucket.
//!
//! `qrport` turns a content string into a QR Code Model 2 symbol, rasterizes it to a PNG in a
//! local scratch directory and uploads it as a public object, returning the object's URL. The
//! destination bucket is created on first use, and every remote step runs on a worker task
//! bounded by a deadline.
//!
//! ## Features
//!
//! - Encode text in numeric, alphanumeric or byte mode, versions 1 to 40.
//! - Four recovery levels, `L0` (most capacity) to `L3` (~30% of the symbol recoverable).
//! - Idempotent bucket provisioning: a bucket already owned by the caller is never an error.
//! - S3 and S3-compatible endpoints, plus an in-process store for offline runs.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Example
//!
//! Publish into an in-process account:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use qrport::director::{GenerationDirector, PublishSettings};
//! use qrport::orchestrator::PublishOrchestrator;
//! use qrport::request::GenerationRequest;
//! use qrport::session::Backend;
//! use qrport::store::MemoryStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), qrport::error::Error> {
//! let scratch = std::env::temp_dir().join("qrport-doc");
//! let settings = Arc::new(PublishSettings {
//!     backend: Backend::Memory(Arc::new(MemoryStore::new())),
//!     region: "local".into(),
//!     bucket: "qr-codes".into(),
//!     scratch_dir: scratch,
//!     orchestrator: PublishOrchestrator::default(),
//! });
//!
//! let request = GenerationRequest::new("doc-example", "https://example.com", 8, "L1")?;
//! let url = GenerationDirector::new(settings, request).generate(None).await?;
//! assert_eq!(url, "memory://qr-codes/doc-example");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`qrcode`]: Core QR code encoding functionality.
//! - [`helper`]: Rasterizing symbols and writing PNGs.
//! - [`request`], [`artifact`]: Validated requests and the local image they produce.
//! - [`session`], [`store`]: Credentials and the object-storage contract.
//! - [`orchestrator`], [`provision`], [`upload`]: Deadline-bounded remote actions.
//! - [`director`]: The single generate-and-publish entry point.

pub mod artifact;
pub mod config;
pub mod director;
pub mod error;
pub mod helper;
pub mod orchestrator;
pub mod provision;
pub mod qrcode;
pub mod request;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod upload;

pub use director::{GenerationDirector, PublishSettings};
pub use error::{Error, Result};
pub use request::{GenerationRequest, RecoveryLevel};
