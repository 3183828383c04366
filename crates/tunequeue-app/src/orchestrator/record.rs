//! Per-batch item state tracking.
//!
//! Every transition is synchronous so callers can hold the record lock for the
//! whole check-then-act sequence.

#![allow(clippy::redundant_pub_crate)]

use std::collections::{BTreeMap, VecDeque};

use tokio::time::Instant;
use tunequeue_events::ProgressMarker;
use tunequeue_media_core::{BatchSnapshot, DoneEntry, ItemId};

/// Failure reason recorded when an admitted item stays silent for too long.
pub(crate) const STALL_REASON: &str = "stall timeout";

/// Mutable state of one submitted batch.
#[derive(Debug)]
pub(crate) struct BatchRecord {
    ids: Vec<ItemId>,
    remaining: VecDeque<ItemId>,
    in_flight: Vec<ItemId>,
    errors: BTreeMap<ItemId, String>,
    progress: BTreeMap<ItemId, ProgressMarker>,
    done: BTreeMap<ItemId, DoneEntry>,
    settled_at: Option<Instant>,
}

impl BatchRecord {
    pub(crate) fn new(ids: Vec<ItemId>) -> Self {
        let remaining = ids.iter().cloned().collect();
        Self {
            ids,
            remaining,
            in_flight: Vec::new(),
            errors: BTreeMap::new(),
            progress: BTreeMap::new(),
            done: BTreeMap::new(),
            settled_at: None,
        }
    }

    /// Move ids from the front of `remaining` into flight until the ceiling is reached.
    ///
    /// Duplicates of ids that are already in flight or terminal are dropped
    /// without being admitted a second time.
    pub(crate) fn admit(&mut self, ceiling: usize) -> Vec<ItemId> {
        let mut admitted = Vec::new();
        while self.in_flight.len() < ceiling {
            let Some(item_id) = self.remaining.pop_front() else {
                break;
            };
            if self.is_in_flight(&item_id) || self.is_terminal(&item_id) {
                continue;
            }
            self.in_flight.push(item_id.clone());
            admitted.push(item_id);
        }
        admitted
    }

    /// Record a download percentage; returns the new marker when it changed.
    pub(crate) fn apply_progress(&mut self, item_id: &str, percentage: f64) -> Option<ProgressMarker> {
        if !self.is_in_flight(item_id) || self.is_terminal(item_id) {
            return None;
        }
        let marker = ProgressMarker::from_percentage(percentage);
        let previous = self.progress.insert(item_id.to_string(), marker);
        (previous != Some(marker)).then_some(marker)
    }

    /// Flag a finished raw download as awaiting post-processing.
    ///
    /// Returns `false` when the item already left flight, in which case no
    /// post-processing should start.
    pub(crate) fn begin_encoding(&mut self, item_id: &str) -> bool {
        if !self.is_in_flight(item_id) || self.is_terminal(item_id) {
            return false;
        }
        self.progress
            .insert(item_id.to_string(), ProgressMarker::Encoding);
        true
    }

    /// Record a failure for an in-flight item and free its slot.
    pub(crate) fn apply_error(&mut self, item_id: &str, reason: impl Into<String>) -> bool {
        if !self.is_in_flight(item_id) || self.is_terminal(item_id) {
            return false;
        }
        self.progress.remove(item_id);
        self.errors.insert(item_id.to_string(), reason.into());
        self.release(item_id);
        true
    }

    /// Record a completed item and free its slot.
    pub(crate) fn apply_done(&mut self, item_id: &str, entry: DoneEntry) -> bool {
        if !self.is_in_flight(item_id) || self.is_terminal(item_id) {
            return false;
        }
        self.progress.remove(item_id);
        self.done.insert(item_id.to_string(), entry);
        self.release(item_id);
        true
    }

    /// Fail an item that produced no observable event since admission.
    pub(crate) fn apply_stall(&mut self, item_id: &str) -> bool {
        if self.progress.contains_key(item_id) {
            return false;
        }
        self.apply_error(item_id, STALL_REASON)
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.remaining.is_empty() && self.in_flight.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn settle(&mut self, now: Instant) {
        if self.settled_at.is_none() {
            self.settled_at = Some(now);
        }
    }

    pub(crate) const fn settled_at(&self) -> Option<Instant> {
        self.settled_at
    }

    pub(crate) fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            ids: self.ids.clone(),
            remaining: self.remaining.iter().cloned().collect(),
            queue: self.in_flight.clone(),
            error: self.errors.clone(),
            progress: self.progress.clone(),
            done: self.done.clone(),
        }
    }

    fn is_in_flight(&self, item_id: &str) -> bool {
        self.in_flight.iter().any(|id| id == item_id)
    }

    fn is_terminal(&self, item_id: &str) -> bool {
        self.done.contains_key(item_id) || self.errors.contains_key(item_id)
    }

    fn release(&mut self, item_id: &str) {
        self.in_flight.retain(|id| id != item_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<ItemId> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    fn entry(name: &str) -> DoneEntry {
        DoneEntry {
            name: name.to_string(),
            url: format!("http://localhost/song/{name}"),
        }
    }

    #[test]
    fn admission_is_fifo_and_bounded() {
        let mut record = BatchRecord::new(ids(&["a", "b", "c", "d"]));
        assert_eq!(record.admit(3), ids(&["a", "b", "c"]));
        assert!(record.admit(3).is_empty());
        assert_eq!(record.snapshot().remaining, ids(&["d"]));

        assert!(record.apply_error("b", "boom"));
        assert_eq!(record.admit(3), ids(&["d"]));
        assert_eq!(record.snapshot().queue, ids(&["a", "c", "d"]));
        assert_eq!(record.in_flight_len(), 3);
    }

    #[test]
    fn duplicates_are_admitted_once() {
        let mut record = BatchRecord::new(ids(&["a", "a", "b"]));
        assert_eq!(record.admit(3), ids(&["a", "b"]));
        assert_eq!(record.snapshot().ids, ids(&["a", "a", "b"]));
        assert!(record.snapshot().remaining.is_empty());
    }

    #[test]
    fn progress_maps_hundred_to_encoding() {
        let mut record = BatchRecord::new(ids(&["a"]));
        let _ = record.admit(3);
        assert_eq!(record.apply_progress("a", 41.9), Some(ProgressMarker::Percent(41)));
        assert_eq!(record.apply_progress("a", 41.2), None);
        assert_eq!(record.apply_progress("a", 100.0), Some(ProgressMarker::Encoding));
        let snapshot = record.snapshot();
        assert_eq!(snapshot.progress.get("a"), Some(&ProgressMarker::Encoding));
        assert!(snapshot.done.is_empty());
    }

    #[test]
    fn done_clears_progress_and_frees_slot() {
        let mut record = BatchRecord::new(ids(&["a"]));
        let _ = record.admit(1);
        assert!(record.begin_encoding("a"));
        assert!(record.apply_done("a", entry("A - T")));

        let snapshot = record.snapshot();
        assert!(snapshot.progress.is_empty());
        assert_eq!(snapshot.done.get("a"), Some(&entry("A - T")));
        assert!(snapshot.queue.is_empty());
        assert!(record.is_drained());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut record = BatchRecord::new(ids(&["a", "b"]));
        let _ = record.admit(2);

        assert!(record.apply_done("a", entry("A")));
        assert!(!record.apply_error("a", "late failure"));
        assert_eq!(record.apply_progress("a", 10.0), None);

        let _ = record.apply_progress("b", 100.0);
        assert!(record.apply_error("b", "network"));
        assert!(!record.apply_done("b", entry("B")));
        assert!(!record.begin_encoding("b"));

        let snapshot = record.snapshot();
        assert!(snapshot.progress.is_empty());
        assert_eq!(snapshot.error.get("b").map(String::as_str), Some("network"));
        assert!(!snapshot.done.contains_key("b"));
    }

    #[test]
    fn stall_only_applies_to_silent_items() {
        let mut record = BatchRecord::new(ids(&["a", "b"]));
        let _ = record.admit(2);
        let _ = record.apply_progress("a", 0.0);

        assert!(!record.apply_stall("a"));
        assert!(record.apply_stall("b"));
        assert!(!record.apply_stall("b"));

        let snapshot = record.snapshot();
        assert_eq!(snapshot.error.get("b").map(String::as_str), Some(STALL_REASON));
        assert_eq!(snapshot.queue, ids(&["a"]));
    }

    #[test]
    fn settle_keeps_first_timestamp() {
        let mut record = BatchRecord::new(ids(&["a"]));
        assert_eq!(record.settled_at(), None);
        let first = Instant::now();
        record.settle(first);
        record.settle(first + std::time::Duration::from_secs(5));
        assert_eq!(record.settled_at(), Some(first));
    }
}
