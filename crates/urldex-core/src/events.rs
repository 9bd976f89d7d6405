//! # Event Log
//!
//! Append-only record of node mutations.
//!
//! Events receive globally monotonic ids in commit order; an event is
//! immutable once written except for its delivery status (pending →
//! processed). Events outlive their nodes: a deleted node's history stays
//! queryable, which is why the per-node index is keyed by `NodeRef` rather
//! than by a live node lookup.

use crate::types::{Event, EventId, EventStatus, NodeRef};
use std::collections::BTreeMap;

/// Per-status counts reported by the server stats surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventStats {
    pub total: usize,
    pub pending: usize,
    pub processed: usize,
}

/// The append-only event table with its per-node index.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: BTreeMap<EventId, Event>,
    /// node -> event ids touching it, oldest first
    by_node: BTreeMap<NodeRef, Vec<EventId>>,
    /// Next id to issue. Events are never deleted, so this is also
    /// max-key + 1.
    next_id: u64,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            by_node: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// The id the next appended event will receive.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Look up an event by id.
    #[must_use]
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    /// Total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events touching a node, oldest first. Returns history even for
    /// nodes that no longer exist.
    #[must_use]
    pub fn node_events(&self, node: &NodeRef) -> Vec<Event> {
        self.by_node
            .get(node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.events.get(id))
            .cloned()
            .collect()
    }

    /// Up to `limit` pending events in id (commit) order.
    #[must_use]
    pub fn pending(&self, limit: usize) -> Vec<Event> {
        self.events
            .values()
            .filter(|e| e.status == EventStatus::Pending)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Per-status counts.
    #[must_use]
    pub fn stats(&self) -> EventStats {
        let pending = self
            .events
            .values()
            .filter(|e| e.status == EventStatus::Pending)
            .count();
        EventStats {
            total: self.events.len(),
            pending,
            processed: self.events.len() - pending,
        }
    }

    /// Iterate every event in id order, for snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    // =========================================================================
    // APPLY (crate-internal: called when committing a ChangeSet)
    // =========================================================================

    pub(crate) fn apply_append(&mut self, event: Event) {
        if event.id.0 >= self.next_id {
            self.next_id = event.id.0.saturating_add(1);
        }
        self.by_node
            .entry(event.node.clone())
            .or_default()
            .push(event.id);
        self.events.insert(event.id, event);
    }

    pub(crate) fn apply_set_status(&mut self, id: EventId, status: EventStatus) {
        if let Some(event) = self.events.get_mut(&id) {
            event.status = status;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, Timestamp};

    fn event(id: u64, local_id: u64, event_type: EventType) -> Event {
        Event {
            id: EventId(id),
            node: NodeRef::new("bookmarks", local_id),
            event_type,
            attribute: None,
            before: None,
            after: None,
            status: EventStatus::Pending,
            created_at: Timestamp(0),
        }
    }

    #[test]
    fn ids_advance_monotonically() {
        let mut log = EventLog::new();
        assert_eq!(log.next_id(), 1);
        log.apply_append(event(1, 1, EventType::NodeCreated));
        log.apply_append(event(2, 1, EventType::NodeUpdated));
        assert_eq!(log.next_id(), 3);
    }

    #[test]
    fn node_history_survives_and_orders_oldest_first() {
        let mut log = EventLog::new();
        log.apply_append(event(1, 1, EventType::NodeCreated));
        log.apply_append(event(2, 2, EventType::NodeCreated));
        log.apply_append(event(3, 1, EventType::NodeDeleted));

        let history = log.node_events(&NodeRef::new("bookmarks", 1));
        let types: Vec<_> = history.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::NodeCreated, EventType::NodeDeleted]);
    }

    #[test]
    fn pending_respects_limit_and_order() {
        let mut log = EventLog::new();
        for id in 1..=5 {
            log.apply_append(event(id, 1, EventType::NodeUpdated));
        }
        log.apply_set_status(EventId(2), EventStatus::Processed);

        let pending = log.pending(2);
        let ids: Vec<_> = pending.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn stats_count_by_status() {
        let mut log = EventLog::new();
        log.apply_append(event(1, 1, EventType::NodeCreated));
        log.apply_append(event(2, 1, EventType::NodeUpdated));
        log.apply_set_status(EventId(1), EventStatus::Processed);

        let stats = log.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processed, 1);
    }

    #[test]
    fn set_status_is_idempotent() {
        let mut log = EventLog::new();
        log.apply_append(event(1, 1, EventType::NodeCreated));
        log.apply_set_status(EventId(1), EventStatus::Processed);
        log.apply_set_status(EventId(1), EventStatus::Processed);
        assert_eq!(
            log.get(EventId(1)).map(|e| e.status),
            Some(EventStatus::Processed)
        );
    }
}
