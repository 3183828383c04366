//! Core media domain types and DTOs shared across the workspace.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tunequeue_events::ProgressMarker;
use uuid::Uuid;

/// Identifier of a single media item (an 11-character video id in practice).
pub type ItemId = String;

/// Target quality requested from the fetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchQuality {
    /// Smallest available audio stream.
    #[default]
    Lowest,
    /// Best available audio stream.
    Highest,
}

impl FetchQuality {
    /// Parse the configuration spelling (`lowest` / `highest`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lowest" => Some(Self::Lowest),
            "highest" => Some(Self::Highest),
            _ => None,
        }
    }

    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lowest => "lowest",
            Self::Highest => "highest",
        }
    }
}

/// Request payload for fetching one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Batch the item was admitted for.
    pub batch_id: Uuid,
    /// Item to fetch.
    pub item_id: ItemId,
    /// Unique per request; keeps intermediate files of concurrent fetches apart.
    pub fetch_id: Uuid,
}

impl FetchRequest {
    /// Request with a freshly generated `fetch_id`.
    #[must_use]
    pub fn new(batch_id: Uuid, item_id: impl Into<ItemId>) -> Self {
        Self {
            batch_id,
            item_id: item_id.into(),
            fetch_id: Uuid::new_v4(),
        }
    }
}

/// Descriptive metadata reported by the fetcher for a finished item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Performing artist, when the source exposes one.
    pub artist: Option<String>,
    /// Track title, when the source exposes one.
    pub title: Option<String>,
    /// Raw title of the source video.
    pub video_title: String,
}

impl TrackMetadata {
    /// Display name: `"{artist} - {title}"` when both are present, otherwise the video title.
    #[must_use]
    pub fn display_name(&self) -> String {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        match (present(&self.artist), present(&self.title)) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            _ => self.video_title.clone(),
        }
    }
}

/// Events emitted by a fetcher while working on one item.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// Raw download progress in percent (`0.0..=100.0`).
    Progress {
        /// Item the progress belongs to.
        item_id: ItemId,
        /// Reported percentage.
        percentage: f64,
    },
    /// Raw download finished; the intermediate file is ready for post-processing.
    Finished {
        /// Item that finished.
        item_id: ItemId,
        /// Location of the intermediate file.
        file: PathBuf,
        /// Metadata used to derive the display name.
        metadata: TrackMetadata,
    },
    /// The fetch failed.
    Error {
        /// Item that failed.
        item_id: ItemId,
        /// Failure message reported by the fetcher.
        message: String,
    },
}

impl FetchEvent {
    /// Item the event refers to.
    #[must_use]
    pub fn item_id(&self) -> &str {
        match self {
            Self::Progress { item_id, .. }
            | Self::Finished { item_id, .. }
            | Self::Error { item_id, .. } => item_id,
        }
    }
}

/// Per-batch channel handle through which a fetcher reports [`FetchEvent`]s.
#[derive(Debug, Clone)]
pub struct FetchEventSink {
    sender: mpsc::UnboundedSender<FetchEvent>,
}

impl FetchEventSink {
    /// Create a sink together with the receiving half consumed by the batch tracker.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FetchEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Deliver an event. Returns `false` when the batch is no longer listening.
    pub fn emit(&self, event: FetchEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Report download progress.
    pub fn progress(&self, item_id: &str, percentage: f64) -> bool {
        self.emit(FetchEvent::Progress {
            item_id: item_id.to_string(),
            percentage,
        })
    }

    /// Report a finished raw download.
    pub fn finished(&self, item_id: &str, file: PathBuf, metadata: TrackMetadata) -> bool {
        self.emit(FetchEvent::Finished {
            item_id: item_id.to_string(),
            file,
            metadata,
        })
    }

    /// Report a failed fetch.
    pub fn error(&self, item_id: &str, message: impl Into<String>) -> bool {
        self.emit(FetchEvent::Error {
            item_id: item_id.to_string(),
            message: message.into(),
        })
    }

    /// Whether the receiving batch has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Completed item entry exposed in progress snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneEntry {
    /// Display name of the track.
    pub name: String,
    /// Retrieval URL of the artifact.
    pub url: String,
}

/// Read-only view of a batch used to answer progress queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    /// Requested ids in submission order.
    pub ids: Vec<ItemId>,
    /// Ids not yet dispatched, front first.
    pub remaining: Vec<ItemId>,
    /// Ids currently in flight.
    pub queue: Vec<ItemId>,
    /// Failure reason per item.
    pub error: BTreeMap<ItemId, String>,
    /// Progress marker per item.
    pub progress: BTreeMap<ItemId, ProgressMarker>,
    /// Completed items.
    pub done: BTreeMap<ItemId, DoneEntry>,
}

impl BatchSnapshot {
    /// Whether nothing is left to dispatch or waiting on a result.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.remaining.is_empty() && self.queue.is_empty()
    }
}
