//! # Subscription Registry
//!
//! Registered interests in node events. The registry only records and
//! matches; delivery is the caller's concern. Subscription lifecycle is
//! independent of node lifecycle, so deleting a node leaves its
//! subscriptions in place (they simply never match again).

use crate::types::{Event, NodeRef, Subscription, SubscriptionId};
use std::collections::BTreeMap;

/// The subscription table.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    subs: BTreeMap<SubscriptionId, Subscription>,
    /// Next id to issue. Ids are never reused after deletion.
    next_id: u64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subs: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// The id the next registered subscription will receive.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Look up a subscription by id.
    #[must_use]
    pub fn get(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.subs.get(&id)
    }

    /// All subscriptions, in id order.
    #[must_use]
    pub fn list(&self) -> Vec<Subscription> {
        self.subs.values().cloned().collect()
    }

    /// All subscriptions targeting one node, in id order.
    #[must_use]
    pub fn node_subscriptions(&self, node: &NodeRef) -> Vec<Subscription> {
        self.subs
            .values()
            .filter(|s| &s.node == node)
            .cloned()
            .collect()
    }

    /// Subscriptions that match an event (same node, subscribed type).
    #[must_use]
    pub fn matching(&self, event: &Event) -> Vec<Subscription> {
        self.subs
            .values()
            .filter(|s| s.matches(event))
            .cloned()
            .collect()
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subs.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Iterate every subscription in id order, for snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subs.values()
    }

    // =========================================================================
    // APPLY (crate-internal: called when committing a ChangeSet)
    // =========================================================================

    pub(crate) fn apply_put(&mut self, sub: Subscription) {
        if sub.id.0 >= self.next_id {
            self.next_id = sub.id.0.saturating_add(1);
        }
        self.subs.insert(sub.id, sub);
    }

    pub(crate) fn apply_delete(&mut self, id: SubscriptionId) {
        self.subs.remove(&id);
    }

    pub(crate) fn apply_set_counter(&mut self, value: u64) {
        self.next_id = value;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, EventStatus, EventType, Timestamp};

    fn sub(id: u64, local_id: u64, types: &[EventType]) -> Subscription {
        Subscription {
            id: SubscriptionId(id),
            node: NodeRef::new("bookmarks", local_id),
            subscriber_service: "indexer".to_string(),
            subscriber_endpoint: None,
            event_types: types.iter().copied().collect(),
            created_at: Timestamp(0),
        }
    }

    fn event(local_id: u64, event_type: EventType) -> Event {
        Event {
            id: EventId(1),
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
    fn ids_never_reused_after_delete() {
        let mut registry = SubscriptionRegistry::new();
        registry.apply_put(sub(1, 1, &[EventType::NodeUpdated]));
        assert_eq!(registry.next_id(), 2);
        registry.apply_delete(SubscriptionId(1));
        assert_eq!(registry.next_id(), 2);
    }

    #[test]
    fn matching_requires_node_and_type() {
        let mut registry = SubscriptionRegistry::new();
        registry.apply_put(sub(1, 1, &[EventType::NodeUpdated]));
        registry.apply_put(sub(2, 1, &[EventType::NodeDeleted]));
        registry.apply_put(sub(3, 2, &[EventType::NodeUpdated]));

        let hits = registry.matching(&event(1, EventType::NodeUpdated));
        let ids: Vec<_> = hits.iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn node_subscriptions_filters_by_node() {
        let mut registry = SubscriptionRegistry::new();
        registry.apply_put(sub(1, 1, &[EventType::NodeUpdated]));
        registry.apply_put(sub(2, 2, &[EventType::NodeUpdated]));

        let for_node = registry.node_subscriptions(&NodeRef::new("bookmarks", 2));
        assert_eq!(for_node.len(), 1);
        assert_eq!(for_node[0].id.0, 2);
    }
}
