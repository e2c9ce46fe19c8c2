//! Single entry point: generate an artifact, then publish it.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, info_span, Instrument, Span};

use crate::artifact::ArtifactGenerator;
use crate::error::{Error, Result};
use crate::orchestrator::{Action, ActionOutput, PublishOrchestrator};
use crate::request::GenerationRequest;
use crate::session::{Backend, Session};

/// Where and how artifacts are published. Shared read-only by every request.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub backend: Backend,
    pub region: String,
    pub bucket: String,
    pub scratch_dir: PathBuf,
    pub orchestrator: PublishOrchestrator,
}

/// Handles exactly one request.
///
/// Built fresh per call and consumed by [`GenerationDirector::generate`], so there is no
/// setup state to check or reset between requests.
pub struct GenerationDirector {
    settings: Arc<PublishSettings>,
    request: GenerationRequest,
}

impl GenerationDirector {
    pub fn new(settings: Arc<PublishSettings>, request: GenerationRequest) -> Self {
        Self { settings, request }
    }

    /// Writes the QR code image locally, then provisions the bucket and uploads it.
    ///
    /// Returns the public URL of the uploaded object. Generation failures return before any
    /// remote call. Nothing is retried or rolled back: after a publish failure the local
    /// artifact stays on disk and a freshly created bucket stays in place.
    pub async fn generate(self, deadline: Option<Instant>) -> Result<String> {
        let span = info_span!("generate", id = self.request.id(), bucket = %self.settings.bucket);
        self.run(deadline).instrument(span).await
    }

    async fn run(self, deadline: Option<Instant>) -> Result<String> {
        let Self { settings, request } = self;

        // Encoding, rasterizing and the file write all block; keep them off the executor.
        let artifact = tokio::task::spawn_blocking({
            let generator = ArtifactGenerator::new(&settings.scratch_dir);
            let request = request.clone();
            let span = Span::current();
            move || span.in_scope(|| generator.generate(&request))
        })
        .await
        .map_err(|_| Error::WorkerLost {
            action: format!("GENERATE {}", request.id()),
        })??;
        info!(path = %artifact.local_path.display(), bytes = artifact.byte_size, "artifact ready");

        let session = Session::open(&settings.backend, &settings.region).await?;
        let action = Action::upload(&settings.bucket, &artifact.id, &artifact.local_path);
        let label = action.to_string();

        match settings.orchestrator.execute(&session, action, deadline).await? {
            ActionOutput::Uploaded { url } => {
                info!(%url, "published");
                Ok(url)
            }
            _ => Err(Error::WorkerLost { action: label }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::store::{Acl, MemoryStore, ObjectStore};

    const BUCKET: &str = "qr-codes";

    fn settings(store: &Arc<MemoryStore>, scratch: &tempfile::TempDir) -> Arc<PublishSettings> {
        Arc::new(PublishSettings {
            backend: Backend::Memory(store.clone()),
            region: "local".into(),
            bucket: BUCKET.into(),
            scratch_dir: scratch.path().to_path_buf(),
            orchestrator: PublishOrchestrator::default(),
        })
    }

    fn hello_request() -> GenerationRequest {
        GenerationRequest::new("abc123", "hello-world", 10, "L0").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_into_a_new_bucket() {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new().with_visibility_lag(1));

        let url = GenerationDirector::new(settings(&store, &scratch), hello_request())
            .generate(None)
            .await
            .unwrap();

        assert!(url.contains(BUCKET));
        assert!(url.ends_with("abc123"));
        assert_eq!(store.list_calls(), 1);
        assert_eq!(store.create_calls(), 1);
        assert!(store.exists_calls() >= 1);

        let object = store.object(BUCKET, "abc123").unwrap();
        assert_eq!(object.content_type, "image/png");
        assert_eq!(object.acl, Acl::PublicRead);
        assert_eq!(object.body, std::fs::read(scratch.path().join("abc123.png")).unwrap());
    }

    #[tokio::test]
    async fn existing_bucket_skips_creation() {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new().with_buckets([BUCKET]));

        let url = GenerationDirector::new(settings(&store, &scratch), hello_request())
            .generate(None)
            .await
            .unwrap();

        assert_eq!(url, format!("memory://{BUCKET}/abc123"));
        assert_eq!(store.create_calls(), 0);
        assert_eq!(store.put_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_publish_is_cut_off() {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryStore::new()
                .with_buckets([BUCKET])
                .with_latency(Duration::from_secs(10)),
        );
        let start = Instant::now();

        let err = GenerationDirector::new(settings(&store, &scratch), hello_request())
            .generate(None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DeadlineExceeded { .. }));
        assert!(start.elapsed() < Duration::from_secs(6));
        assert!(scratch.path().join("abc123.png").is_file());
    }

    #[tokio::test]
    async fn oversized_content_never_reaches_the_store() {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let request = GenerationRequest::new("big", "z".repeat(4000), 1, "L0").unwrap();

        let err = GenerationDirector::new(settings(&store, &scratch), request)
            .generate(None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Encoding { .. }));
        assert_eq!(store.list_calls(), 0);
        assert_eq!(store.create_calls(), 0);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn failed_upload_keeps_the_artifact() {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new().rejecting_uploads());

        let err = GenerationDirector::new(settings(&store, &scratch), hello_request())
            .generate(None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upload { .. }));
        assert!(scratch.path().join("abc123.png").is_file());
        // The bucket created on the way is not rolled back.
        assert_eq!(store.list_buckets().await.unwrap(), vec![BUCKET.to_string()]);
    }

    #[tokio::test]
    async fn bad_credentials_fail_after_generation() {
        let scratch = tempfile::tempdir().unwrap();
        let settings = Arc::new(PublishSettings {
            backend: Backend::Aws {
                credentials_path: scratch.path().join("no-such-credentials"),
                profile: "default".into(),
                endpoint: None,
            },
            region: "us-west-2".into(),
            bucket: BUCKET.into(),
            scratch_dir: scratch.path().to_path_buf(),
            orchestrator: PublishOrchestrator::default(),
        });

        let err = GenerationDirector::new(settings, hello_request())
            .generate(None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth { .. }));
        assert!(scratch.path().join("abc123.png").is_file());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn large_render_leaves_the_executor_free() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new().with_buckets([BUCKET]));
        let request = GenerationRequest::new("large", "x".repeat(2900), 32, "L0").unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let ticker = tokio::spawn({
            let done = done.clone();
            async move {
                let mut ticks = 0u32;
                let mut widest = Duration::ZERO;
                let mut last = std::time::Instant::now();
                while !done.load(Ordering::Relaxed) {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    let now = std::time::Instant::now();
                    widest = widest.max(now - last);
                    last = now;
                    ticks += 1;
                }
                (ticks, widest)
            }
        });

        let started = std::time::Instant::now();
        GenerationDirector::new(settings(&store, &scratch), request)
            .generate(None)
            .await
            .unwrap();
        let took = started.elapsed();
        done.store(true, Ordering::Relaxed);
        let (ticks, widest) = ticker.await.unwrap();

        assert!(store.object(BUCKET, "large").is_some());
        assert!(ticks > 1);
        // A render blocking the only worker thread would stall the ticker for all of it.
        if took > Duration::from_millis(100) {
            assert!(widest < took * 3 / 4, "ticker stalled {widest:?} of {took:?}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_publish_independently() {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let settings = settings(&store, &scratch);

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let request =
                    GenerationRequest::new(format!("req-{i}"), format!("content {i}"), 4, "L2")
                        .unwrap();
                let director = GenerationDirector::new(settings.clone(), request);
                tokio::spawn(director.generate(None))
            })
            .collect();

        let mut urls = Vec::new();
        for handle in handles {
            urls.push(handle.await.unwrap().unwrap());
        }

        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 6);
        for i in 0..6 {
            assert!(store.object(BUCKET, &format!("req-{i}")).is_some());
        }
        assert_eq!(store.list_buckets().await.unwrap(), vec![BUCKET.to_string()]);
    }
}
