//! Shared state handed to every handler.

#![allow(clippy::redundant_pub_crate)]

use std::path::PathBuf;
use std::sync::Arc;

use tunequeue_events::EventBus;
use tunequeue_media_core::{BatchQueue, PlaylistResolver};
use tunequeue_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) queue: Arc<dyn BatchQueue>,
    pub(crate) resolver: Arc<dyn PlaylistResolver>,
    pub(crate) events: EventBus,
    pub(crate) telemetry: Metrics,
    pub(crate) storage_root: PathBuf,
}

impl ApiState {
    pub(crate) const fn new(
        queue: Arc<dyn BatchQueue>,
        resolver: Arc<dyn PlaylistResolver>,
        events: EventBus,
        telemetry: Metrics,
        storage_root: PathBuf,
    ) -> Self {
        Self {
            queue,
            resolver,
            events,
            telemetry,
            storage_root,
        }
    }
}
