//! Step pipeline turning a raw download into a retrievable artifact.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tunequeue_events::{Event, EventBus};
use tunequeue_telemetry::Metrics;
use uuid::Uuid;

use crate::error::{EncodeError, EncodeResult};
use crate::transcoder::Transcoder;

/// File extension of generated artifacts.
pub const ARTIFACT_EXTENSION: &str = "mp3";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepKind {
    LocateSource,
    PrepareStorage,
    Transcode,
    Cleanup,
}

impl StepKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::LocateSource => "locate_source",
            Self::PrepareStorage => "prepare_storage",
            Self::Transcode => "transcode",
            Self::Cleanup => "cleanup",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepStatus {
    Started,
    Completed,
    Failed,
}

impl StepStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Inputs for post-processing one raw download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    /// Item the raw file belongs to.
    pub item_id: String,
    /// Intermediate file produced by the fetcher.
    pub source_path: PathBuf,
}

/// Encoded output stored under the public storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Generated file stem used in retrieval links.
    pub name: String,
    /// Absolute or root-relative location of the file.
    pub path: PathBuf,
}

/// Service responsible for executing post-processing after a raw fetch completes.
#[derive(Clone)]
pub struct EncodeService {
    events: EventBus,
    metrics: Metrics,
    transcoder: Arc<dyn Transcoder>,
    storage_root: PathBuf,
}

impl EncodeService {
    /// Construct a new post-processing service writing artifacts under `storage_root`.
    #[must_use]
    pub fn new(
        events: EventBus,
        metrics: Metrics,
        transcoder: Arc<dyn Transcoder>,
        storage_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            events,
            metrics,
            transcoder,
            storage_root: storage_root.into(),
        }
    }

    /// Storage root receiving artifacts.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Re-encode the raw file, delete it, and return the resulting artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The intermediate file is kept when
    /// the transcode fails, and partial artifacts are removed.
    pub async fn process(&self, request: EncodeRequest) -> EncodeResult<Artifact> {
        self.publish_event(Event::EncodeStarted {
            item_id: request.item_id.clone(),
        });

        match self.execute_pipeline(&request).await {
            Ok(artifact) => {
                info!(
                    item_id = %request.item_id,
                    artifact = %artifact.name,
                    "post-processing completed"
                );
                self.publish_event(Event::EncodeCompleted {
                    item_id: request.item_id.clone(),
                    artifact: artifact.name.clone(),
                });
                Ok(artifact)
            }
            Err(error) => {
                let detail = error.detail();
                warn!(item_id = %request.item_id, error = %detail, "post-processing failed");
                self.publish_event(Event::EncodeFailed {
                    item_id: request.item_id.clone(),
                    message: detail,
                });
                Err(error)
            }
        }
    }

    async fn execute_pipeline(&self, request: &EncodeRequest) -> EncodeResult<Artifact> {
        let item_id = request.item_id.as_str();

        self.execute_step(item_id, StepKind::LocateSource, || {
            locate_source(&request.source_path)
        })?;
        self.execute_step(item_id, StepKind::PrepareStorage, || {
            fs::create_dir_all(&self.storage_root).map_err(|source| {
                EncodeError::io("prepare_storage.create_root", &self.storage_root, source)
            })
        })?;

        let artifact = self.allocate_artifact();
        self.run_transcode(item_id, &request.source_path, &artifact)
            .await?;

        self.execute_step(item_id, StepKind::Cleanup, || {
            fs::remove_file(&request.source_path).map_err(|source| {
                remove_partial(&artifact.path);
                EncodeError::io("cleanup.remove_source", &request.source_path, source)
            })
        })?;

        Ok(artifact)
    }

    async fn run_transcode(
        &self,
        item_id: &str,
        source: &Path,
        artifact: &Artifact,
    ) -> EncodeResult<()> {
        self.record_step(item_id, StepKind::Transcode, StepStatus::Started, None);
        match self.transcoder.transcode(source, &artifact.path).await {
            Ok(()) => {
                self.record_step(item_id, StepKind::Transcode, StepStatus::Completed, None);
                Ok(())
            }
            Err(err) => {
                remove_partial(&artifact.path);
                let error = EncodeError::Transcode {
                    path: source.to_path_buf(),
                    source: err.into(),
                };
                self.record_step(
                    item_id,
                    StepKind::Transcode,
                    StepStatus::Failed,
                    Some(&error.detail()),
                );
                Err(error)
            }
        }
    }

    fn execute_step<T, F>(&self, item_id: &str, step: StepKind, op: F) -> EncodeResult<T>
    where
        F: FnOnce() -> EncodeResult<T>,
    {
        self.record_step(item_id, step, StepStatus::Started, None);
        match op() {
            Ok(value) => {
                self.record_step(item_id, step, StepStatus::Completed, None);
                Ok(value)
            }
            Err(err) => {
                self.record_step(item_id, step, StepStatus::Failed, Some(&err.detail()));
                Err(err)
            }
        }
    }

    fn record_step(&self, item_id: &str, step: StepKind, status: StepStatus, detail: Option<&str>) {
        self.metrics.inc_encode_step(step.as_str(), status.as_str());
        if status == StepStatus::Failed {
            error!(
                item_id,
                step = step.as_str(),
                detail = detail.unwrap_or_default(),
                "encode step failed"
            );
        } else {
            debug!(item_id, step = step.as_str(), status = status.as_str(), "encode step");
        }
    }

    fn allocate_artifact(&self) -> Artifact {
        let name = Uuid::new_v4().to_string();
        let path = self
            .storage_root
            .join(format!("{name}.{ARTIFACT_EXTENSION}"));
        Artifact { name, path }
    }

    fn publish_event(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        let _ = self.events.publish(event);
    }
}

fn locate_source(path: &Path) -> EncodeResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(EncodeError::InvalidInput {
            field: "source_path",
            reason: "missing",
            value: Some(path.display().to_string()),
        })
    }
}

fn remove_partial(path: &Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %err, "failed to remove partial artifact");
    }
}
