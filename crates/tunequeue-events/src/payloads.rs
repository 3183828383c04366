//! Event payload types carried across the service.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identifier assigned to each event emitted by the service.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

const ENCODING_LABEL: &str = "encoding";

/// Progress marker reported for an in-flight item.
///
/// Serialises as a bare integer percentage (`0..=99`) or the literal string
/// `"encoding"` once the raw download has finished and transcoding is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMarker {
    /// Download percentage, floored.
    Percent(u8),
    /// Raw download complete; waiting on post-processing.
    Encoding,
}

impl ProgressMarker {
    /// Map a raw downloader percentage onto a marker.
    ///
    /// A value of `100` means the raw fetch finished and the encoder has not
    /// reported yet; anything else is floored and clamped to `0..=99`.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 100.0 {
            return Self::Encoding;
        }
        let floored = percentage.floor().clamp(0.0, 99.0);
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "value is clamped to 0..=99 before conversion"
        )]
        let percent = floored as u8;
        Self::Percent(percent)
    }
}

impl Display for ProgressMarker {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(value) => write!(formatter, "{value}"),
            Self::Encoding => formatter.write_str(ENCODING_LABEL),
        }
    }
}

impl Serialize for ProgressMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Percent(value) => serializer.serialize_u8(*value),
            Self::Encoding => serializer.serialize_str(ENCODING_LABEL),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawProgressMarker {
    Percent(u8),
    Label(String),
}

impl<'de> Deserialize<'de> for ProgressMarker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawProgressMarker::deserialize(deserializer)? {
            RawProgressMarker::Percent(value) => Ok(Self::Percent(value)),
            RawProgressMarker::Label(label) if label == ENCODING_LABEL => Ok(Self::Encoding),
            RawProgressMarker::Label(label) => Err(serde::de::Error::custom(format!(
                "unknown progress marker '{label}'"
            ))),
        }
    }
}

/// Typed domain events surfaced across the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch of item identifiers was accepted.
    BatchSubmitted {
        /// Identifier for the accepted batch.
        batch_id: Uuid,
        /// Number of identifiers submitted, duplicates included.
        item_count: usize,
    },
    /// An item left the pending queue and was handed to the fetcher.
    ItemAdmitted {
        /// Batch that owns the item.
        batch_id: Uuid,
        /// Media identifier.
        item_id: String,
    },
    /// Download progress changed for an in-flight item.
    ItemProgress {
        /// Batch that owns the item.
        batch_id: Uuid,
        /// Media identifier.
        item_id: String,
        /// Latest progress marker.
        progress: ProgressMarker,
    },
    /// Item finished post-processing and its artifact is retrievable.
    ItemCompleted {
        /// Batch that owns the item.
        batch_id: Uuid,
        /// Media identifier.
        item_id: String,
        /// Display name derived from track metadata.
        name: String,
        /// Retrieval URL for the artifact.
        url: String,
    },
    /// Item reached the errored state.
    ItemFailed {
        /// Batch that owns the item.
        batch_id: Uuid,
        /// Media identifier.
        item_id: String,
        /// Human-readable failure reason.
        reason: String,
    },
    /// Post-processing started for a raw download.
    EncodeStarted {
        /// Media identifier.
        item_id: String,
    },
    /// Post-processing produced an artifact.
    EncodeCompleted {
        /// Media identifier.
        item_id: String,
        /// Generated artifact name.
        artifact: String,
    },
    /// Post-processing failed.
    EncodeFailed {
        /// Media identifier.
        item_id: String,
        /// Human-readable error detail.
        message: String,
    },
    /// Every item of a batch reached a terminal state.
    BatchDrained {
        /// Identifier of the drained batch.
        batch_id: Uuid,
    },
    /// A settled batch was evicted from the registry.
    BatchEvicted {
        /// Identifier of the evicted batch.
        batch_id: Uuid,
    },
}

impl Event {
    /// Machine-friendly discriminator for SSE consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BatchSubmitted { .. } => "batch_submitted",
            Self::ItemAdmitted { .. } => "item_admitted",
            Self::ItemProgress { .. } => "item_progress",
            Self::ItemCompleted { .. } => "item_completed",
            Self::ItemFailed { .. } => "item_failed",
            Self::EncodeStarted { .. } => "encode_started",
            Self::EncodeCompleted { .. } => "encode_completed",
            Self::EncodeFailed { .. } => "encode_failed",
            Self::BatchDrained { .. } => "batch_drained",
            Self::BatchEvicted { .. } => "batch_evicted",
        }
    }

    /// Batch identifier carried by the event, when it is batch-scoped.
    #[must_use]
    pub const fn batch_id(&self) -> Option<Uuid> {
        match self {
            Self::BatchSubmitted { batch_id, .. }
            | Self::ItemAdmitted { batch_id, .. }
            | Self::ItemProgress { batch_id, .. }
            | Self::ItemCompleted { batch_id, .. }
            | Self::ItemFailed { batch_id, .. }
            | Self::BatchDrained { batch_id }
            | Self::BatchEvicted { batch_id } => Some(*batch_id),
            Self::EncodeStarted { .. }
            | Self::EncodeCompleted { .. }
            | Self::EncodeFailed { .. } => None,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_marker_maps_raw_percentages() {
        assert_eq!(ProgressMarker::from_percentage(0.0), ProgressMarker::Percent(0));
        assert_eq!(
            ProgressMarker::from_percentage(42.9),
            ProgressMarker::Percent(42)
        );
        assert_eq!(
            ProgressMarker::from_percentage(99.99),
            ProgressMarker::Percent(99)
        );
        assert_eq!(
            ProgressMarker::from_percentage(100.0),
            ProgressMarker::Encoding
        );
        assert_eq!(
            ProgressMarker::from_percentage(-3.0),
            ProgressMarker::Percent(0)
        );
    }

    #[test]
    fn progress_marker_serialises_as_number_or_label() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&ProgressMarker::Percent(37))?, "37");
        assert_eq!(
            serde_json::to_string(&ProgressMarker::Encoding)?,
            "\"encoding\""
        );
        let parsed: ProgressMarker = serde_json::from_str("\"encoding\"")?;
        assert_eq!(parsed, ProgressMarker::Encoding);
        assert!(serde_json::from_str::<ProgressMarker>("\"seeding\"").is_err());
        Ok(())
    }

    #[test]
    fn batch_scoped_events_expose_batch_id() {
        let id = Uuid::new_v4();
        assert_eq!(
            Event::ItemAdmitted {
                batch_id: id,
                item_id: "dQw4w9WgXcQ".into(),
            }
            .batch_id(),
            Some(id)
        );
        assert_eq!(
            Event::EncodeStarted {
                item_id: "dQw4w9WgXcQ".into(),
            }
            .batch_id(),
            None
        );
    }
}
