//! Artifact upload.

use std::path::Path;

use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::store::{Acl, ObjectPut, ObjectStore, StoreError};

/// Content type of every uploaded artifact.
pub const CONTENT_TYPE: &str = "image/png";

/// Copies a local artifact into a bucket as a public-read object.
pub struct ObjectUploader<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> ObjectUploader<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Uploads `local_path` under `key` and returns the object's public URL.
    ///
    /// The file is read completely and closed before the write is sent. An existing object
    /// under `key` is replaced.
    #[instrument(name = "upload", skip(self, local_path))]
    pub async fn upload(&self, bucket: &str, key: &str, local_path: &Path) -> Result<String> {
        let upload_err = |source: StoreError| Error::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        };

        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| upload_err(e.into()))?;
        let bytes = body.len();

        self.store
            .put_object(ObjectPut {
                bucket: bucket.to_string(),
                key: key.to_string(),
                body,
                content_type: CONTENT_TYPE.to_string(),
                acl: Acl::PublicRead,
            })
            .await
            .map_err(upload_err)?;

        let url = self.store.object_url(bucket, key);
        info!(bucket, key, bytes, %url, "object uploaded");
        Ok(url)
    }
}
