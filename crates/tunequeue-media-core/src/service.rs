//! Fetch, resolve, and queue traits implemented by adapters and the orchestrator.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::QueueError;
use crate::model::{BatchSnapshot, FetchEventSink, FetchRequest};

/// Downloader seam implemented by adapters (e.g. yt-dlp).
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Start fetching one item. Progress, completion, and failure are reported
    /// through `sink`; the returned future may resolve before the fetch ends.
    async fn fetch(&self, request: FetchRequest, sink: FetchEventSink) -> anyhow::Result<()>;
}

/// Resolver turning a playlist reference into ordered item URLs.
#[async_trait]
pub trait PlaylistResolver: Send + Sync {
    /// Resolve the playlist into its ordered list of item URLs.
    async fn resolve(&self, playlist_id: &str) -> anyhow::Result<Vec<String>>;
}

/// Batch admission and inspection façade exposed to the API layer.
#[async_trait]
pub trait BatchQueue: Send + Sync {
    /// Register a batch and start dispatching it; returns without waiting on any fetch.
    async fn submit(&self, ids: Vec<String>) -> Result<Uuid, QueueError>;

    /// Snapshot of a registered batch.
    async fn get(&self, batch_id: Uuid) -> Option<BatchSnapshot>;

    /// Number of batches currently retained.
    async fn batch_count(&self) -> usize {
        0
    }
}
