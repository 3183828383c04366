//! Batch orchestrator that admits items to the fetcher under a concurrency
//! ceiling, routes finished downloads into post-processing, and tracks per-item
//! state until every item of a batch is terminal.

#![allow(clippy::redundant_pub_crate)]

mod actor;
mod record;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use tunequeue_config::SchedulerConfig;
use tunequeue_encode::EncodeService;
use tunequeue_events::{Event, EventBus};
use tunequeue_media_core::{BatchQueue, BatchSnapshot, MediaFetcher, QueueError};
use tunequeue_telemetry::Metrics;
use uuid::Uuid;

use self::actor::{ActorContext, BatchSettings, lock_record};
use self::record::BatchRecord;

type BatchHandle = Arc<Mutex<BatchRecord>>;

/// Coordinates fetch and post-processing for every submitted batch.
#[derive(Clone)]
pub struct BatchOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    context: ActorContext,
    retention: Option<Duration>,
    batches: Mutex<HashMap<Uuid, BatchHandle>>,
}

impl BatchOrchestrator {
    /// Construct an orchestrator over the shared fetcher, encoder, and event bus.
    ///
    /// `base_url` prefixes every retrieval link and is expected to end with `/`.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        encoder: EncodeService,
        events: EventBus,
        metrics: Metrics,
        scheduler: &SchedulerConfig,
        base_url: impl Into<String>,
    ) -> Self {
        let settings = BatchSettings {
            max_concurrent_items: scheduler.max_concurrent_items.max(1),
            dispatch_tick: scheduler.dispatch_tick,
            stall_timeout: scheduler.stall_timeout,
            base_url: base_url.into(),
        };
        Self {
            inner: Arc::new(OrchestratorInner {
                context: ActorContext {
                    fetcher,
                    encoder,
                    events,
                    metrics,
                    settings: Arc::new(settings),
                },
                retention: scheduler.batch_retention,
                batches: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a new batch and start working on it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidInput`] when `ids` is empty.
    pub fn submit_batch(&self, ids: Vec<String>) -> Result<Uuid, QueueError> {
        if ids.is_empty() {
            return Err(QueueError::InvalidInput {
                reason: "List of ids is empty",
            });
        }

        let batch_id = Uuid::new_v4();
        let item_count = ids.len();
        let record = Arc::new(Mutex::new(BatchRecord::new(ids)));
        self.lock_batches().insert(batch_id, Arc::clone(&record));

        let context = &self.inner.context;
        context.metrics.inc_batch_submitted();
        context.metrics.inc_event("batch_submitted");
        let _ = context.events.publish(Event::BatchSubmitted {
            batch_id,
            item_count,
        });
        info!(%batch_id, item_count, "batch accepted");

        actor::spawn(batch_id, record, context.clone());
        Ok(batch_id)
    }

    /// Point-in-time view of a batch, or `None` when the id is unknown.
    #[must_use]
    pub fn snapshot(&self, batch_id: Uuid) -> Option<BatchSnapshot> {
        let handle = self.lock_batches().get(&batch_id).cloned()?;
        let snapshot = lock_record(&handle).snapshot();
        Some(snapshot)
    }

    /// Number of batches currently held in the registry.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.lock_batches().len()
    }

    /// Drop settled batches whose retention window has elapsed at `now`.
    ///
    /// Returns the evicted batch ids. Nothing is ever evicted when retention is
    /// disabled.
    pub fn evict_expired(&self, now: Instant) -> Vec<Uuid> {
        let Some(retention) = self.inner.retention else {
            return Vec::new();
        };

        let evicted: Vec<Uuid> = {
            let mut batches = self.lock_batches();
            let expired: Vec<Uuid> = batches
                .iter()
                .filter(|(_, handle)| {
                    lock_record(handle)
                        .settled_at()
                        .is_some_and(|settled| now.saturating_duration_since(settled) >= retention)
                })
                .map(|(batch_id, _)| *batch_id)
                .collect();
            for batch_id in &expired {
                batches.remove(batch_id);
            }
            expired
        };

        let context = &self.inner.context;
        for batch_id in &evicted {
            debug!(batch_id = %batch_id, "batch evicted");
            context.metrics.inc_event("batch_evicted");
            let _ = context.events.publish(Event::BatchEvicted {
                batch_id: *batch_id,
            });
        }
        evicted
    }

    /// Periodically evict expired batches. Returns `None` when retention is disabled.
    #[must_use]
    pub fn spawn_sweeper(&self, interval: Duration) -> Option<JoinHandle<()>> {
        if self.inner.retention.is_none() {
            return None;
        }
        let orchestrator = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = orchestrator.evict_expired(Instant::now());
                if !evicted.is_empty() {
                    info!(count = evicted.len(), "evicted settled batches");
                }
            }
        }))
    }

    fn lock_batches(&self) -> MutexGuard<'_, HashMap<Uuid, BatchHandle>> {
        self.inner
            .batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BatchQueue for BatchOrchestrator {
    async fn submit(&self, ids: Vec<String>) -> Result<Uuid, QueueError> {
        self.submit_batch(ids)
    }

    async fn get(&self, batch_id: Uuid) -> Option<BatchSnapshot> {
        self.snapshot(batch_id)
    }

    async fn batch_count(&self) -> usize {
        self.lock_batches().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use tokio::time::{sleep, timeout};
    use tunequeue_encode::Transcoder;
    use tunequeue_events::ProgressMarker;
    use tunequeue_media_core::{FetchEventSink, FetchRequest, TrackMetadata};

    const BASE_URL: &str = "http://localhost:3000/";
    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct StubFetcher {
        sinks: Mutex<Vec<(String, FetchEventSink)>>,
        fail_ids: Vec<String>,
    }

    impl StubFetcher {
        fn failing(ids: &[&str]) -> Self {
            Self {
                sinks: Mutex::new(Vec::new()),
                fail_ids: ids.iter().map(|id| (*id).to_string()).collect(),
            }
        }

        fn fetched(&self) -> Vec<String> {
            self.lock().iter().map(|(id, _)| id.clone()).collect()
        }

        fn sink(&self, item_id: &str) -> Option<FetchEventSink> {
            self.lock()
                .iter()
                .find(|(id, _)| id == item_id)
                .map(|(_, sink)| sink.clone())
        }

        fn lock(&self) -> MutexGuard<'_, Vec<(String, FetchEventSink)>> {
            self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    #[async_trait]
    impl MediaFetcher for StubFetcher {
        async fn fetch(&self, request: FetchRequest, sink: FetchEventSink) -> anyhow::Result<()> {
            if self.fail_ids.contains(&request.item_id) {
                bail!("video unavailable");
            }
            self.lock().push((request.item_id, sink));
            Ok(())
        }
    }

    struct StubTranscoder {
        failure: Option<&'static str>,
    }

    #[async_trait]
    impl Transcoder for StubTranscoder {
        async fn transcode(&self, _source: &Path, destination: &Path) -> anyhow::Result<()> {
            if let Some(message) = self.failure {
                bail!(message);
            }
            fs::write(destination, b"mp3")?;
            Ok(())
        }
    }

    struct Harness {
        orchestrator: BatchOrchestrator,
        fetcher: Arc<StubFetcher>,
        events: EventBus,
        root: TempDir,
    }

    fn scheduler(retention: Option<Duration>) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent_items: 3,
            dispatch_tick: Duration::from_millis(100),
            stall_timeout: Duration::from_secs(10),
            batch_retention: retention,
            sweep_interval: Duration::from_secs(1),
        }
    }

    fn harness_with(
        fetcher: StubFetcher,
        transcode_failure: Option<&'static str>,
        retention: Option<Duration>,
    ) -> Result<Harness> {
        let root = TempDir::new()?;
        let events = EventBus::with_capacity(256);
        let metrics = Metrics::new()?;
        let encoder = EncodeService::new(
            events.clone(),
            metrics.clone(),
            Arc::new(StubTranscoder {
                failure: transcode_failure,
            }),
            root.path(),
        );
        let fetcher = Arc::new(fetcher);
        let orchestrator = BatchOrchestrator::new(
            fetcher.clone(),
            encoder,
            events.clone(),
            metrics,
            &scheduler(retention),
            BASE_URL,
        );
        Ok(Harness {
            orchestrator,
            fetcher,
            events,
            root,
        })
    }

    fn harness() -> Result<Harness> {
        harness_with(StubFetcher::default(), None, None)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    async fn wait_for_fetches(fetcher: &StubFetcher, count: usize) -> Result<()> {
        timeout(WAIT, async {
            while fetcher.fetched().len() < count {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        Ok(())
    }

    async fn wait_for_snapshot<F>(
        orchestrator: &BatchOrchestrator,
        batch_id: Uuid,
        predicate: F,
    ) -> Result<BatchSnapshot>
    where
        F: Fn(&BatchSnapshot) -> bool,
    {
        let snapshot = timeout(WAIT, async {
            loop {
                if let Some(snapshot) = orchestrator.snapshot(batch_id)
                    && predicate(&snapshot)
                {
                    return snapshot;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        Ok(snapshot)
    }

    fn raw_download(root: &Path, name: &str) -> Result<PathBuf> {
        let raw_dir = root.join(".raw");
        fs::create_dir_all(&raw_dir)?;
        let path = raw_dir.join(name);
        fs::write(&path, b"raw-audio")?;
        Ok(path)
    }

    #[tokio::test(start_paused = true)]
    async fn admission_respects_ceiling_and_backfills() -> Result<()> {
        let h = harness()?;
        let batch_id = h.orchestrator.submit_batch(ids(&["a", "b", "c", "d"]))?;
        wait_for_fetches(&h.fetcher, 3).await?;

        let snapshot = wait_for_snapshot(&h.orchestrator, batch_id, |s| s.queue.len() == 3).await?;
        assert_eq!(snapshot.queue, ids(&["a", "b", "c"]));
        assert_eq!(snapshot.remaining, ids(&["d"]));
        assert_eq!(h.fetcher.fetched(), ids(&["a", "b", "c"]));

        let Some(sink) = h.fetcher.sink("b") else {
            bail!("fetch for b was not started");
        };
        let _ = sink.error("b", "network unreachable");

        let snapshot = wait_for_snapshot(&h.orchestrator, batch_id, |s| {
            s.error.contains_key("b") && s.remaining.is_empty()
        })
        .await?;
        assert_eq!(
            snapshot.error.get("b").map(String::as_str),
            Some("network unreachable")
        );
        assert_eq!(snapshot.queue, ids(&["a", "c", "d"]));
        wait_for_fetches(&h.fetcher, 4).await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn silent_items_stall_and_free_their_slots() -> Result<()> {
        let h = harness()?;
        let batch_id = h.orchestrator.submit_batch(ids(&["a", "b", "c", "d"]))?;
        wait_for_fetches(&h.fetcher, 3).await?;

        let Some(sink) = h.fetcher.sink("a") else {
            bail!("fetch for a was not started");
        };
        let _ = sink.progress("a", 5.0);
        wait_for_snapshot(&h.orchestrator, batch_id, |s| s.progress.contains_key("a")).await?;

        sleep(Duration::from_secs(11)).await;

        let Some(snapshot) = h.orchestrator.snapshot(batch_id) else {
            bail!("batch disappeared");
        };
        assert_eq!(
            snapshot.error.get("b").map(String::as_str),
            Some("stall timeout")
        );
        assert_eq!(
            snapshot.error.get("c").map(String::as_str),
            Some("stall timeout")
        );
        assert!(!snapshot.error.contains_key("a"));
        assert_eq!(snapshot.queue, ids(&["a", "d"]));
        assert_eq!(snapshot.progress.get("a"), Some(&ProgressMarker::Percent(5)));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn finished_download_is_encoded_and_linked() -> Result<()> {
        let h = harness()?;
        let mut stream = h.events.subscribe(None);
        let batch_id = h.orchestrator.submit_batch(ids(&["a"]))?;
        wait_for_fetches(&h.fetcher, 1).await?;
        let Some(sink) = h.fetcher.sink("a") else {
            bail!("fetch for a was not started");
        };

        let _ = sink.progress("a", 100.0);
        wait_for_snapshot(&h.orchestrator, batch_id, |s| {
            s.progress.get("a") == Some(&ProgressMarker::Encoding)
        })
        .await?;

        let raw = raw_download(h.root.path(), "a.webm")?;
        let metadata = TrackMetadata {
            artist: Some("A".to_string()),
            title: Some("T".to_string()),
            video_title: "A - T (Official Video)".to_string(),
        };
        let _ = sink.finished("a", raw.clone(), metadata);

        let snapshot =
            wait_for_snapshot(&h.orchestrator, batch_id, |s| s.done.contains_key("a")).await?;
        let Some(entry) = snapshot.done.get("a") else {
            bail!("done entry missing");
        };
        assert_eq!(entry.name, "A - T");
        let Some(artifact) = entry.url.strip_prefix("http://localhost:3000/song/") else {
            bail!("unexpected url {}", entry.url);
        };
        assert!(h.root.path().join(format!("{artifact}.mp3")).is_file());
        assert!(!raw.exists(), "raw download should be removed");
        assert!(snapshot.progress.is_empty());
        assert!(snapshot.queue.is_empty());
        assert!(snapshot.is_settled());

        timeout(WAIT, async {
            while let Some(envelope) = stream.next().await {
                if envelope.event == (Event::BatchDrained { batch_id }) {
                    return Ok(());
                }
            }
            bail!("event stream closed before drain");
        })
        .await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn encode_failure_marks_item_errored() -> Result<()> {
        let h = harness_with(StubFetcher::default(), Some("ffmpeg exited with status 1"), None)?;
        let batch_id = h.orchestrator.submit_batch(ids(&["a"]))?;
        wait_for_fetches(&h.fetcher, 1).await?;
        let Some(sink) = h.fetcher.sink("a") else {
            bail!("fetch for a was not started");
        };

        let raw = raw_download(h.root.path(), "a.webm")?;
        let _ = sink.finished("a", raw.clone(), TrackMetadata::default());

        let snapshot =
            wait_for_snapshot(&h.orchestrator, batch_id, |s| s.error.contains_key("a")).await?;
        let Some(reason) = snapshot.error.get("a") else {
            bail!("error entry missing");
        };
        assert!(reason.starts_with("Cant increase bitrate: "), "{reason}");
        assert!(snapshot.done.is_empty());
        assert!(snapshot.progress.is_empty());
        assert!(raw.exists(), "raw download is kept when transcoding fails");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fetcher_errors_are_recorded() -> Result<()> {
        let h = harness_with(StubFetcher::failing(&["bad"]), None, None)?;
        let batch_id = h.orchestrator.submit_batch(ids(&["bad", "good"]))?;

        let snapshot =
            wait_for_snapshot(&h.orchestrator, batch_id, |s| s.error.contains_key("bad")).await?;
        assert_eq!(
            snapshot.error.get("bad").map(String::as_str),
            Some("video unavailable")
        );
        assert_eq!(snapshot.queue, ids(&["good"]));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ids_are_fetched_once() -> Result<()> {
        let h = harness()?;
        let batch_id = h.orchestrator.submit_batch(ids(&["a", "a", "b"]))?;
        wait_for_fetches(&h.fetcher, 2).await?;
        sleep(Duration::from_millis(500)).await;

        assert_eq!(h.fetcher.fetched(), ids(&["a", "b"]));
        let Some(snapshot) = h.orchestrator.snapshot(batch_id) else {
            bail!("batch disappeared");
        };
        assert_eq!(snapshot.ids, ids(&["a", "a", "b"]));
        assert!(snapshot.remaining.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn empty_batches_are_rejected() -> Result<()> {
        let h = harness()?;
        let result = h.orchestrator.submit(Vec::new()).await;
        assert_eq!(
            result,
            Err(QueueError::InvalidInput {
                reason: "List of ids is empty"
            })
        );
        assert_eq!(h.orchestrator.batch_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_batches_have_no_snapshot() -> Result<()> {
        let h = harness()?;
        assert!(h.orchestrator.get(Uuid::new_v4()).await.is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn settled_batches_are_evicted_after_retention() -> Result<()> {
        let h = harness_with(
            StubFetcher::failing(&["a"]),
            None,
            Some(Duration::from_secs(60)),
        )?;
        let mut stream = h.events.subscribe(None);
        let batch_id = h.orchestrator.submit_batch(ids(&["a"]))?;

        timeout(WAIT, async {
            while let Some(envelope) = stream.next().await {
                if envelope.event == (Event::BatchDrained { batch_id }) {
                    return Ok(());
                }
            }
            bail!("event stream closed before drain");
        })
        .await??;

        assert!(h.orchestrator.evict_expired(Instant::now()).is_empty());
        assert!(h.orchestrator.snapshot(batch_id).is_some());

        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(h.orchestrator.evict_expired(later), vec![batch_id]);
        assert!(h.orchestrator.snapshot(batch_id).is_none());
        assert_eq!(h.orchestrator.batch_count(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_in_the_background() -> Result<()> {
        let h = harness_with(
            StubFetcher::failing(&["a"]),
            None,
            Some(Duration::from_secs(2)),
        )?;
        let Some(sweeper) = h.orchestrator.spawn_sweeper(Duration::from_secs(1)) else {
            bail!("sweeper should run when retention is enabled");
        };
        let batch_id = h.orchestrator.submit_batch(ids(&["a"]))?;
        wait_for_snapshot(&h.orchestrator, batch_id, |s| s.error.contains_key("a")).await?;

        sleep(Duration::from_secs(5)).await;
        assert!(h.orchestrator.snapshot(batch_id).is_none());
        sweeper.abort();
        Ok(())
    }

    #[tokio::test]
    async fn sweeper_is_disabled_without_retention() -> Result<()> {
        let h = harness()?;
        assert!(h.orchestrator.spawn_sweeper(Duration::from_secs(1)).is_none());
        assert!(h.orchestrator.evict_expired(Instant::now()).is_empty());
        Ok(())
    }
}
