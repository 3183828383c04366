//! Single-writer task driving one batch from admission to drain.

#![allow(clippy::redundant_pub_crate)]

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tunequeue_encode::{Artifact, EncodeRequest, EncodeService};
use tunequeue_events::{Event, EventBus};
use tunequeue_media_core::{
    DoneEntry, FetchEvent, FetchEventSink, FetchRequest, ItemId, MediaError, MediaFetcher,
};
use tunequeue_telemetry::Metrics;
use uuid::Uuid;

use super::record::{BatchRecord, STALL_REASON};

/// Prefix of the failure reason recorded when post-processing fails.
const ENCODE_FAILURE_PREFIX: &str = "Cant increase bitrate";

/// Scheduling knobs shared by every batch actor.
#[derive(Debug, Clone)]
pub(crate) struct BatchSettings {
    pub(crate) max_concurrent_items: usize,
    pub(crate) dispatch_tick: Duration,
    pub(crate) stall_timeout: Duration,
    pub(crate) base_url: String,
}

/// Shared collaborators handed to each actor.
#[derive(Clone)]
pub(crate) struct ActorContext {
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    pub(crate) encoder: EncodeService,
    pub(crate) events: EventBus,
    pub(crate) metrics: Metrics,
    pub(crate) settings: Arc<BatchSettings>,
}

enum ActorMessage {
    Encoded {
        item_id: ItemId,
        name: String,
        result: Result<Artifact, String>,
    },
    StallElapsed {
        item_id: ItemId,
    },
}

pub(crate) fn lock_record(record: &Mutex<BatchRecord>) -> MutexGuard<'_, BatchRecord> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spawn the actor for a freshly registered batch.
pub(crate) fn spawn(batch_id: Uuid, record: Arc<Mutex<BatchRecord>>, context: ActorContext) {
    let (sink, fetch_events) = FetchEventSink::channel();
    let (messages_tx, messages) = mpsc::unbounded_channel();
    let actor = BatchActor {
        batch_id,
        record,
        context,
        sink,
        fetch_events,
        messages_tx,
        messages,
    };
    tokio::spawn(actor.run());
}

struct BatchActor {
    batch_id: Uuid,
    record: Arc<Mutex<BatchRecord>>,
    context: ActorContext,
    sink: FetchEventSink,
    fetch_events: mpsc::UnboundedReceiver<FetchEvent>,
    messages_tx: mpsc::UnboundedSender<ActorMessage>,
    messages: mpsc::UnboundedReceiver<ActorMessage>,
}

impl BatchActor {
    async fn run(mut self) {
        let mut tick = tokio::time::interval(self.context.settings.dispatch_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.dispatch();
        while !lock_record(&self.record).is_drained() {
            tokio::select! {
                Some(event) = self.fetch_events.recv() => self.handle_fetch_event(event),
                Some(message) = self.messages.recv() => self.handle_message(message),
                _ = tick.tick() => {}
            }
            self.dispatch();
        }

        lock_record(&self.record).settle(Instant::now());
        info!(batch_id = %self.batch_id, "batch drained");
        self.publish(Event::BatchDrained {
            batch_id: self.batch_id,
        });
    }

    fn dispatch(&self) {
        let admitted = lock_record(&self.record).admit(self.context.settings.max_concurrent_items);
        for item_id in admitted {
            self.context.metrics.inc_items_in_flight();
            debug!(batch_id = %self.batch_id, item_id = %item_id, "item admitted");
            self.publish(Event::ItemAdmitted {
                batch_id: self.batch_id,
                item_id: item_id.clone(),
            });
            self.start_fetch(item_id.clone());
            self.arm_stall_timer(item_id);
        }
    }

    fn start_fetch(&self, item_id: ItemId) {
        let fetcher = Arc::clone(&self.context.fetcher);
        let sink = self.sink.clone();
        let request = FetchRequest::new(self.batch_id, item_id.clone());
        tokio::spawn(async move {
            if let Err(err) = fetcher
                .fetch(request, sink.clone())
                .await
            {
                let message = err
                    .downcast_ref::<MediaError>()
                    .map_or_else(|| err.to_string(), MediaError::detail);
                let _ = sink.error(&item_id, message);
            }
        });
    }

    fn arm_stall_timer(&self, item_id: ItemId) {
        let messages = self.messages_tx.clone();
        let timeout = self.context.settings.stall_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = messages.send(ActorMessage::StallElapsed { item_id });
        });
    }

    fn handle_fetch_event(&self, event: FetchEvent) {
        match event {
            FetchEvent::Progress {
                item_id,
                percentage,
            } => {
                let marker = lock_record(&self.record).apply_progress(&item_id, percentage);
                if let Some(progress) = marker {
                    self.publish(Event::ItemProgress {
                        batch_id: self.batch_id,
                        item_id,
                        progress,
                    });
                }
            }
            FetchEvent::Error { item_id, message } => self.fail_item(&item_id, message),
            FetchEvent::Finished {
                item_id,
                file,
                metadata,
            } => {
                if !lock_record(&self.record).begin_encoding(&item_id) {
                    debug!(
                        batch_id = %self.batch_id,
                        item_id = %item_id,
                        "ignoring finished download for settled item"
                    );
                    discard_file(&file);
                    return;
                }
                self.start_encode(item_id, file, metadata.display_name());
            }
        }
    }

    fn start_encode(&self, item_id: ItemId, source_path: PathBuf, name: String) {
        let encoder = self.context.encoder.clone();
        let messages = self.messages_tx.clone();
        tokio::spawn(async move {
            let result = encoder
                .process(EncodeRequest {
                    item_id: item_id.clone(),
                    source_path,
                })
                .await
                .map_err(|err| err.detail());
            let sent = messages.send(ActorMessage::Encoded {
                item_id,
                name,
                result,
            });
            if let Err(mpsc::error::SendError(ActorMessage::Encoded {
                result: Ok(artifact),
                ..
            })) = sent
            {
                discard_file(&artifact.path);
            }
        });
    }

    fn handle_message(&self, message: ActorMessage) {
        match message {
            ActorMessage::Encoded {
                item_id,
                name,
                result: Ok(artifact),
            } => self.complete_item(&item_id, name, &artifact),
            ActorMessage::Encoded {
                item_id,
                result: Err(detail),
                ..
            } => self.fail_item(&item_id, format!("{ENCODE_FAILURE_PREFIX}: {detail}")),
            ActorMessage::StallElapsed { item_id } => {
                if lock_record(&self.record).apply_stall(&item_id) {
                    warn!(batch_id = %self.batch_id, item_id = %item_id, "item stalled");
                    self.on_failed(item_id, STALL_REASON.to_string());
                }
            }
        }
    }

    fn complete_item(&self, item_id: &str, name: String, artifact: &Artifact) {
        let entry = DoneEntry {
            name,
            url: format!("{}song/{}", self.context.settings.base_url, artifact.name),
        };
        if !lock_record(&self.record).apply_done(item_id, entry.clone()) {
            debug!(
                batch_id = %self.batch_id,
                item_id,
                "discarding artifact for settled item"
            );
            discard_file(&artifact.path);
            return;
        }
        self.context.metrics.dec_items_in_flight();
        info!(batch_id = %self.batch_id, item_id, name = %entry.name, "item completed");
        self.publish(Event::ItemCompleted {
            batch_id: self.batch_id,
            item_id: item_id.to_string(),
            name: entry.name,
            url: entry.url,
        });
    }

    fn fail_item(&self, item_id: &str, reason: String) {
        if lock_record(&self.record).apply_error(item_id, reason.clone()) {
            warn!(batch_id = %self.batch_id, item_id, reason = %reason, "item failed");
            self.on_failed(item_id.to_string(), reason);
        }
    }

    fn on_failed(&self, item_id: ItemId, reason: String) {
        self.context.metrics.dec_items_in_flight();
        self.context.metrics.inc_item_failed();
        self.publish(Event::ItemFailed {
            batch_id: self.batch_id,
            item_id,
            reason,
        });
    }

    fn publish(&self, event: Event) {
        self.context.metrics.inc_event(event.kind());
        let _ = self.context.events.publish(event);
    }
}

/// Remove a file produced for an item whose outcome was already recorded.
fn discard_file(path: &Path) {
    if let Err(err) = std::fs::remove_file(path)
        && err.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %err, "failed to remove orphaned file");
    }
}
