//! Fan-out of envelopes to live subscribers with a bounded replay log.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast::{self, Receiver, Sender, error::RecvError};

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Most recent envelopes, oldest first.
struct ReplayLog {
    entries: VecDeque<EventEnvelope>,
    capacity: usize,
}

impl ReplayLog {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, envelope: EventEnvelope) {
        if self.entries.len() == self.capacity {
            let _ = self.entries.pop_front();
        }
        self.entries.push_back(envelope);
    }

    fn after(&self, id: EventId) -> VecDeque<EventEnvelope> {
        let start = self.entries.partition_point(|envelope| envelope.id <= id);
        self.entries.range(start..).cloned().collect()
    }

    fn last_id(&self) -> Option<EventId> {
        self.entries.back().map(|envelope| envelope.id)
    }
}

/// Cloneable handle to the process-wide event bus.
///
/// Ids are assigned in publish order starting at 1. The broadcast channel and
/// the replay log share one capacity; a zero capacity is raised to one.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    log: Arc<Mutex<ReplayLog>>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Build a bus retaining up to `capacity` envelopes for replay.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            log: Arc::new(Mutex::new(ReplayLog::new(capacity))),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build a bus with [`DEFAULT_REPLAY_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Stamp `event` and deliver it to every subscriber. Never blocks on slow readers.
    pub fn publish(&self, event: Event) -> EventId {
        // Id assignment and logging happen under one lock so the log stays ordered.
        let mut log = self.lock_log();
        let envelope = EventEnvelope {
            id: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: Utc::now(),
            event,
        };
        let id = envelope.id;
        log.record(envelope.clone());
        let _ = self.sender.send(envelope);
        drop(log);
        id
    }

    /// Open a stream of envelopes. With `since`, retained envelopes newer than
    /// that id are yielded first.
    #[must_use]
    pub fn subscribe(&self, since: Option<EventId>) -> EventStream {
        let log = self.lock_log();
        let receiver = self.sender.subscribe();
        let backlog = since.map_or_else(VecDeque::new, |id| log.after(id));
        let floor = log.last_id().unwrap_or(0);
        drop(log);
        EventStream {
            backlog,
            receiver,
            floor,
        }
    }

    /// Id of the newest retained envelope.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_log().last_id()
    }

    /// Retained envelopes with an id greater than `id`.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        self.lock_log().after(id).into()
    }

    fn lock_log(&self) -> MutexGuard<'_, ReplayLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber side of [`EventBus`].
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    floor: EventId,
}

impl EventStream {
    /// Next envelope in id order.
    ///
    /// A subscriber that falls behind the channel skips what it missed.
    /// Returns `None` once every bus handle has been dropped.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(envelope) = self.backlog.pop_front() {
            return Some(envelope);
        }
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.id > self.floor => return Some(envelope),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::ProgressMarker;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    fn admitted(batch_id: Uuid, item: &str) -> Event {
        Event::ItemAdmitted {
            batch_id,
            item_id: item.to_string(),
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let bus = EventBus::with_capacity(8);
        assert_eq!(bus.last_event_id(), None);
        let batch_id = Uuid::new_v4();
        let first = bus.publish(Event::BatchSubmitted {
            batch_id,
            item_count: 2,
        });
        let second = bus.publish(admitted(batch_id, "a"));
        assert_eq!((first, second), (1, 2));
        assert_eq!(bus.last_event_id(), Some(2));
    }

    #[test]
    fn replay_log_keeps_only_the_newest_envelopes() {
        let bus = EventBus::with_capacity(2);
        let batch_id = Uuid::new_v4();
        for item in ["a", "b", "c", "d"] {
            let _ = bus.publish(admitted(batch_id, item));
        }
        let ids: Vec<_> = bus.backlog_since(0).iter().map(|env| env.id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(bus.backlog_since(4).is_empty());
    }

    #[test]
    fn zero_capacity_still_retains_latest() {
        let bus = EventBus::with_capacity(0);
        let _ = bus.publish(Event::BatchDrained {
            batch_id: Uuid::new_v4(),
        });
        assert_eq!(bus.backlog_since(0).len(), 1);
    }

    #[tokio::test]
    async fn reconnecting_subscriber_resumes_after_last_seen_id() {
        let bus = EventBus::with_capacity(16);
        let batch_id = Uuid::new_v4();
        for item in ["a", "b", "c"] {
            let _ = bus.publish(admitted(batch_id, item));
        }

        let mut stream = bus.subscribe(Some(1));
        let live = bus.publish(Event::ItemProgress {
            batch_id,
            item_id: "a".to_string(),
            progress: ProgressMarker::Percent(40),
        });

        let mut seen = Vec::new();
        for _ in 0..3 {
            let envelope = timeout(Duration::from_secs(1), stream.next()).await;
            if let Ok(Some(envelope)) = envelope {
                seen.push(envelope.id);
            }
        }
        assert_eq!(seen, vec![2, 3, live]);
    }

    #[tokio::test]
    async fn fresh_subscriber_sees_only_new_events() {
        let bus = EventBus::with_capacity(16);
        let batch_id = Uuid::new_v4();
        let _ = bus.publish(admitted(batch_id, "old"));

        let mut stream = bus.subscribe(None);
        let _ = bus.publish(Event::BatchDrained { batch_id });

        let envelope = timeout(Duration::from_secs(1), stream.next()).await;
        assert!(matches!(
            envelope,
            Ok(Some(EventEnvelope {
                id: 2,
                event: Event::BatchDrained { .. },
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn stream_ends_when_bus_is_dropped() {
        let bus = EventBus::with_capacity(4);
        let mut stream = bus.subscribe(None);
        drop(bus);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn many_publishes_reach_a_live_subscriber() {
        let bus = EventBus::with_capacity(512);
        let mut stream = bus.subscribe(None);
        let batch_id = Uuid::new_v4();
        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move {
                for index in 0..300 {
                    let _ = bus.publish(admitted(batch_id, &format!("item-{index}")));
                }
            })
        };

        let mut count = 0;
        while count < 300 {
            match timeout(Duration::from_secs(1), stream.next()).await {
                Ok(Some(_)) => count += 1,
                _ => break,
            }
        }
        assert!(publisher.await.is_ok());
        assert_eq!(count, 300);
    }
}
