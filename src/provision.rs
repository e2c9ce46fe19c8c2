//! Bucket provisioning.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::store::{CreateOutcome, ObjectStore};

/// Makes sure a bucket exists before anything is written to it.
///
/// Existence is read fresh from the store on every call. A creation that reports the bucket
/// as already ours counts as success, so two requests racing to create the same bucket both
/// proceed.
pub struct BucketProvisioner<'a> {
    store: &'a dyn ObjectStore,
    poll_interval: Duration,
}

impl<'a> BucketProvisioner<'a> {
    pub fn new(store: &'a dyn ObjectStore, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    /// Lists buckets, creates `bucket` when it is missing and waits until it is visible.
    ///
    /// At most one creation request is issued. The wait gives up with
    /// [`Error::ProvisionTimeout`] once the next poll would land past `deadline`.
    #[instrument(name = "provision", skip(self, deadline))]
    pub async fn ensure(&self, bucket: &str, deadline: Instant) -> Result<()> {
        let names = self.store.list_buckets().await.map_err(Error::List)?;
        if names.iter().any(|name| name == bucket) {
            debug!(bucket, "bucket present");
            return Ok(());
        }

        match self.store.create_bucket(bucket).await {
            Ok(CreateOutcome::Created) => info!(bucket, "bucket created"),
            Ok(CreateOutcome::AlreadyOwned) => info!(bucket, "bucket already owned, continuing"),
            Err(source) => {
                warn!(bucket, error = %source, "bucket creation failed");
                return Err(Error::Create {
                    bucket: bucket.to_string(),
                    source,
                });
            }
        }

        self.wait_until_exists(bucket, deadline).await
    }

    async fn wait_until_exists(&self, bucket: &str, deadline: Instant) -> Result<()> {
        let mut polls = 0u32;
        loop {
            polls += 1;
            let visible = self
                .store
                .bucket_exists(bucket)
                .await
                .map_err(|source| Error::Create {
                    bucket: bucket.to_string(),
                    source,
                })?;
            if visible {
                debug!(bucket, polls, "bucket visible");
                return Ok(());
            }

            let next = Instant::now() + self.poll_interval;
            if next >= deadline {
                warn!(bucket, polls, "bucket not visible before deadline");
                return Err(Error::ProvisionTimeout {
                    bucket: bucket.to_string(),
                });
            }
            sleep_until(next).await;
        }
    }
}
