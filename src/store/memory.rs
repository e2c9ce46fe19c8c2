//! In-process object store.
//!
//! Behaves like a single S3 account: buckets are owned by the account, objects are replaced
//! on rewrite. Knobs simulate the slow or surprising parts of a real provider (latency,
//! creation that takes a few polls to become visible, names owned elsewhere, refused writes),
//! and counters record how many calls of each kind were made.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Acl, CreateOutcome, ObjectPut, ObjectStore, StoreError};

/// An object held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: Acl,
}

#[derive(Default)]
struct State {
    buckets: HashSet<String>,
    /// Created buckets and the number of existence polls left before they show up.
    pending: HashMap<String, u32>,
    foreign: HashSet<String>,
    objects: HashMap<(String, String), StoredObject>,
}

#[derive(Default)]
struct Calls {
    list: AtomicUsize,
    create: AtomicUsize,
    exists: AtomicUsize,
    put: AtomicUsize,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    calls: Calls,
    latency: Option<Duration>,
    visibility_lag: u32,
    reject_uploads: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buckets the account already owns.
    pub fn with_buckets<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().buckets.extend(names.into_iter().map(Into::into));
        self
    }

    /// Delay added to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of `bucket_exists` polls a new bucket stays invisible for.
    pub fn with_visibility_lag(mut self, polls: u32) -> Self {
        self.visibility_lag = polls;
        self
    }

    /// A bucket name owned by another account; creating it conflicts.
    pub fn with_foreign_bucket(self, name: impl Into<String>) -> Self {
        self.state().foreign.insert(name.into());
        self
    }

    /// Refuse every object write.
    pub fn rejecting_uploads(mut self) -> Self {
        self.reject_uploads = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.calls.list.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.calls.create.load(Ordering::SeqCst)
    }

    pub fn exists_calls(&self) -> usize {
        self.calls.exists.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.calls.put.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        let mut names: Vec<String> = self.state().buckets.iter().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<CreateOutcome, StoreError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        let mut state = self.state();
        if state.foreign.contains(bucket) {
            return Err(StoreError::Conflict(bucket.to_string()));
        }
        if state.buckets.contains(bucket) || state.pending.contains_key(bucket) {
            return Ok(CreateOutcome::AlreadyOwned);
        }
        if self.visibility_lag == 0 {
            state.buckets.insert(bucket.to_string());
        } else {
            state.pending.insert(bucket.to_string(), self.visibility_lag);
        }
        Ok(CreateOutcome::Created)
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.calls.exists.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        let mut state = self.state();
        if let Some(left) = state.pending.get_mut(bucket) {
            *left = left.saturating_sub(1);
            if *left == 0 {
                state.pending.remove(bucket);
                state.buckets.insert(bucket.to_string());
            }
            return Ok(false);
        }
        Ok(state.buckets.contains(bucket))
    }

    async fn put_object(&self, put: ObjectPut) -> Result<(), StoreError> {
        self.calls.put.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if self.reject_uploads {
            return Err(StoreError::Rejected {
                status: 403,
                message: "AccessDenied".into(),
            });
        }
        let mut state = self.state();
        if !state.buckets.contains(&put.bucket) {
            return Err(StoreError::Rejected {
                status: 404,
                message: format!("NoSuchBucket: {}", put.bucket),
            });
        }
        state.objects.insert(
            (put.bucket, put.key),
            StoredObject {
                body: put.body,
                content_type: put.content_type,
                acl: put.acl,
            },
        );
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }
}
