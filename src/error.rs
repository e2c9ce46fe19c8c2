//! Error types for the generate-and-publish pipeline.

use std::path::PathBuf;

use crate::qrcode::DataTooLong;
use crate::store::StoreError;

/// Errors produced while generating or publishing a QR code.
///
/// Each variant names the operation it came from so the boundary can report it without
/// further context.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // -- Request --
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // -- Generation --
    #[error("encoding request {id}: {source}")]
    Encoding {
        id: String,
        #[source]
        source: DataTooLong,
    },

    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -- Session --
    #[error("credentials {}: {reason}", path.display())]
    Auth { path: PathBuf, reason: String },

    // -- Provisioning --
    #[error("listing buckets: {0}")]
    List(#[source] StoreError),

    #[error("creating bucket {bucket}: {source}")]
    Create {
        bucket: String,
        #[source]
        source: StoreError,
    },

    #[error("bucket {bucket} did not become visible before the deadline")]
    ProvisionTimeout { bucket: String },

    // -- Upload --
    #[error("uploading {bucket}/{key}: {source}")]
    Upload {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    // -- Orchestration --
    #[error("{action} exceeded its deadline")]
    DeadlineExceeded { action: String },

    #[error("{action} is not supported")]
    UnsupportedAction { action: String },

    #[error("worker for {action} exited without a result")]
    WorkerLost { action: String },
}

impl Error {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
