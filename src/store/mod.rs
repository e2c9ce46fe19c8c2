//! Object storage wire contract.
//!
//! - [`ObjectStore`] -- the operations publishing needs from a blob store
//! - [`S3Store`] -- S3 and S3-compatible endpoints through `rust-s3`
//! - [`MemoryStore`] -- an in-process account for offline runs and tests

pub mod aws;
pub mod memory;

use async_trait::async_trait;

pub use aws::S3Store;
pub use memory::MemoryStore;

/// Failures reported by a store, before the pipeline attaches its own context.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("bucket name {0} is taken by another account")]
    Conflict(String),

    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a bucket creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The caller already owns a bucket with this name.
    AlreadyOwned,
}

/// Canned ACL applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acl {
    Private,
    PublicRead,
}

impl Acl {
    pub fn as_header(self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
        }
    }
}

/// One object write.
#[derive(Debug, Clone)]
pub struct ObjectPut {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: Acl,
}

/// Blob store operations used by provisioning and upload.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of every bucket visible to the credentials.
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError>;

    async fn create_bucket(&self, bucket: &str) -> Result<CreateOutcome, StoreError>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    /// Writes the object, replacing any existing object under the same key.
    async fn put_object(&self, put: ObjectPut) -> Result<(), StoreError>;

    /// Public retrieval URL, derived without contacting the store.
    fn object_url(&self, bucket: &str, key: &str) -> String;
}
