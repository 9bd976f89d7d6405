//! # Mutation Primitives
//!
//! The atomic unit of catalog change.
//!
//! Every public catalog operation validates against the current immutable
//! state, then assembles a [`ChangeSet`] of [`Mutation`] ops. The change
//! set is committed to the storage backend in one write transaction and
//! only then applied to the in-memory tables, where application is
//! infallible. This keeps the durable state and the in-memory state in
//! lockstep: a storage failure leaves both untouched.

use crate::types::{
    AttributeDef, AttributeValue, Dependency, DependencyKind, Domain, Event, EventId, EventStatus,
    Node, NodeRef, Subscription, SubscriptionId,
};

/// One primitive state change.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert or replace a domain record.
    PutDomain(Domain),
    /// Insert or replace an attribute definition.
    PutAttributeDef(AttributeDef),
    /// Remove an attribute definition.
    DeleteAttributeDef { domain: String, name: String },
    /// Remove every value of one attribute across a domain's nodes.
    DeleteDomainValues { domain: String, name: String },
    /// Insert or replace a node record.
    PutNode(Node),
    /// Remove a node and its URL index entry.
    DeleteNode(NodeRef),
    /// Replace the values of one named attribute on a node.
    PutValues {
        node: NodeRef,
        name: String,
        values: Vec<AttributeValue>,
    },
    /// Remove one named attribute's values, or all values when `name` is
    /// `None`.
    DeleteValues {
        node: NodeRef,
        name: Option<String>,
    },
    /// Insert a dependency edge.
    PutDependency(Dependency),
    /// Remove one dependency edge by its identifying triple.
    DeleteDependency {
        source: NodeRef,
        target: NodeRef,
        kind: DependencyKind,
    },
    /// Remove every edge touching a node, in either direction.
    DeleteNodeEdges(NodeRef),
    /// Append an event to the log.
    AppendEvent(Event),
    /// Transition an event's delivery status.
    SetEventStatus { id: EventId, status: EventStatus },
    /// Insert a subscription.
    PutSubscription(Subscription),
    /// Remove a subscription.
    DeleteSubscription(SubscriptionId),
    /// Persist a domain's next-local-id counter.
    SetNodeCounter { domain: String, value: u64 },
    /// Persist the global attribute-id counter.
    SetAttributeCounter { value: u64 },
    /// Persist the subscription-id counter.
    SetSubscriptionCounter { value: u64 },
}

/// An ordered batch of mutations committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    ops: Vec<Mutation>,
}

impl ChangeSet {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one mutation.
    pub fn push(&mut self, op: Mutation) {
        self.ops.push(op);
    }

    /// The mutations in application order.
    #[must_use]
    pub fn ops(&self) -> &[Mutation] {
        &self.ops
    }

    /// Number of mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the change set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    #[test]
    fn change_set_preserves_order() {
        let mut cs = ChangeSet::new();
        cs.push(Mutation::PutDomain(Domain {
            name: "a".to_string(),
            description: String::new(),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }));
        cs.push(Mutation::SetNodeCounter {
            domain: "a".to_string(),
            value: 2,
        });

        assert_eq!(cs.len(), 2);
        assert!(matches!(cs.ops()[0], Mutation::PutDomain(_)));
        assert!(matches!(cs.ops()[1], Mutation::SetNodeCounter { .. }));
    }
}
