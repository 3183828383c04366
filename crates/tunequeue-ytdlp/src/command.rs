#![allow(clippy::redundant_pub_crate)]

use tunequeue_media_core::{FetchEventSink, FetchRequest};

/// Work items accepted by the fetch worker.
#[derive(Debug)]
pub(crate) enum FetchCommand {
    /// Download one item and report through the sink.
    Fetch {
        /// Item to download.
        request: FetchRequest,
        /// Per-batch event channel.
        sink: FetchEventSink,
    },
}
