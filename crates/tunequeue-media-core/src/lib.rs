#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Engine-agnostic media interfaces and DTOs.
//!
//! Adapters (yt-dlp, stubs in tests) implement the fetch and resolve seams;
//! the orchestrator implements [`BatchQueue`] for the API layer.

pub mod error;
pub mod extract;
pub mod model;
pub mod service;

pub use error::{MediaError, MediaResult, QueueError};
pub use extract::{extract_video_id, playlist_url, watch_url};
pub use model::{
    BatchSnapshot, DoneEntry, FetchEvent, FetchEventSink, FetchQuality, FetchRequest, ItemId,
    TrackMetadata,
};
pub use service::{BatchQueue, MediaFetcher, PlaylistResolver};
pub use tunequeue_events::ProgressMarker;
