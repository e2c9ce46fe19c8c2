//! Deadline-bounded remote actions.
//!
//! [`PublishOrchestrator::execute`] runs one [`Action`] on a spawned worker and waits for its
//! single result, or for the deadline, whichever comes first. The worker reports through a
//! oneshot channel: the send never blocks, so a worker that finishes after the caller gave up
//! simply drops its result and exits.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{Error, Result};
use crate::provision::BucketProvisioner;
use crate::session::Session;
use crate::upload::ObjectUploader;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    ObjectStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    List,
    Create,
    Read,
    Update,
    Delete,
    Upload,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::List => "LIST",
            Verb::Create => "CREATE",
            Verb::Read => "READ",
            Verb::Update => "UPDATE",
            Verb::Delete => "DELETE",
            Verb::Upload => "UPLOAD",
        };
        f.write_str(name)
    }
}

/// What an action operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Account,
    Bucket(String),
    Object {
        bucket: String,
        key: String,
        source: PathBuf,
    },
}

/// One remote operation. Carries no state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub service: Service,
    pub verb: Verb,
    pub target: Target,
}

impl Action {
    pub fn new(service: Service, verb: Verb, target: Target) -> Self {
        Self {
            service,
            verb,
            target,
        }
    }

    /// List every bucket visible to the session.
    pub fn list() -> Self {
        Self::new(Service::ObjectStorage, Verb::List, Target::Account)
    }

    /// Ensure `bucket` exists.
    pub fn create(bucket: impl Into<String>) -> Self {
        Self::new(
            Service::ObjectStorage,
            Verb::Create,
            Target::Bucket(bucket.into()),
        )
    }

    /// Ensure `bucket` exists, then upload `source` under `key`.
    pub fn upload(
        bucket: impl Into<String>,
        key: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            Service::ObjectStorage,
            Verb::Upload,
            Target::Object {
                bucket: bucket.into(),
                key: key.into(),
                source: source.into(),
            },
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb)?;
        match &self.target {
            Target::Account => Ok(()),
            Target::Bucket(bucket) => write!(f, " {bucket}"),
            Target::Object { bucket, key, .. } => write!(f, " {bucket}/{key}"),
        }
    }
}

/// What a successful action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutput {
    Buckets(Vec<String>),
    Provisioned,
    Uploaded { url: String },
}

/// The subset of actions a worker knows how to run.
enum Job {
    List,
    Provision { bucket: String },
    Upload {
        bucket: String,
        key: String,
        source: PathBuf,
    },
}

impl Job {
    fn for_action(action: &Action) -> Result<Self> {
        match (action.verb, &action.target) {
            (Verb::List, Target::Account) => Ok(Job::List),
            (Verb::Create, Target::Bucket(bucket)) => Ok(Job::Provision {
                bucket: bucket.clone(),
            }),
            (
                Verb::Upload,
                Target::Object {
                    bucket,
                    key,
                    source,
                },
            ) => Ok(Job::Upload {
                bucket: bucket.clone(),
                key: key.clone(),
                source: source.clone(),
            }),
            _ => Err(Error::UnsupportedAction {
                action: action.to_string(),
            }),
        }
    }

    async fn run(
        self,
        session: Session,
        deadline: Instant,
        poll_interval: Duration,
    ) -> Result<ActionOutput> {
        let store = session.store();
        match self {
            Job::List => store
                .list_buckets()
                .await
                .map(ActionOutput::Buckets)
                .map_err(Error::List),
            Job::Provision { bucket } => {
                BucketProvisioner::new(store, poll_interval)
                    .ensure(&bucket, deadline)
                    .await?;
                Ok(ActionOutput::Provisioned)
            }
            Job::Upload {
                bucket,
                key,
                source,
            } => {
                BucketProvisioner::new(store, poll_interval)
                    .ensure(&bucket, deadline)
                    .await?;
                let url = ObjectUploader::new(store)
                    .upload(&bucket, &key, &source)
                    .await?;
                Ok(ActionOutput::Uploaded { url })
            }
        }
    }
}

/// Runs actions on a worker task under a fixed timeout.
#[derive(Debug, Clone)]
pub struct PublishOrchestrator {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for PublishOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl PublishOrchestrator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Interval between bucket existence checks while waiting for a new bucket.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executes `action` and returns its single result.
    ///
    /// The effective deadline is the earlier of `deadline` and now plus the orchestrator
    /// timeout. When it passes, [`Error::DeadlineExceeded`] is returned at once; the worker is
    /// not interrupted and its eventual result is discarded. Unsupported actions fail with
    /// [`Error::UnsupportedAction`] before any worker is started.
    pub async fn execute(
        &self,
        session: &Session,
        action: Action,
        deadline: Option<Instant>,
    ) -> Result<ActionOutput> {
        let job = Job::for_action(&action)?;
        let own_deadline = Instant::now() + self.timeout;
        let deadline = deadline.map_or(own_deadline, |d| d.min(own_deadline));

        let (tx, rx) = oneshot::channel();
        let span = info_span!("publish_worker", action = %action, provider = %session.provider());
        let worker = job.run(session.clone(), deadline, self.poll_interval);
        tokio::spawn(
            async move {
                let result = worker.await;
                if tx.send(result).is_err() {
                    debug!("caller gone, result discarded");
                }
            }
            .instrument(span),
        );

        tokio::select! {
            received = rx => match received {
                Ok(result) => result,
                Err(_) => {
                    warn!(%action, "worker exited without a result");
                    Err(Error::WorkerLost { action: action.to_string() })
                }
            },
            _ = sleep_until(deadline) => {
                warn!(%action, "deadline exceeded");
                Err(Error::DeadlineExceeded { action: action.to_string() })
            }
        }
    }
}
