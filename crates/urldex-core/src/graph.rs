//! # Dependency Graph
//!
//! Directed, typed dependency edges between nodes, with forward and
//! reverse adjacency and cascade-delete closure computation.
//!
//! Edges are identified by the `(source, target, kind)` triple; two nodes
//! may be connected by several edges of different kinds. Cycles are
//! permitted, so the cascade walk tracks visited nodes.

use crate::types::{Dependency, DependencyKind, NodeRef};
use std::collections::{BTreeMap, BTreeSet};

/// Forward and reverse adjacency over dependency edges.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// source -> edges leaving it, in insertion order
    outgoing: BTreeMap<NodeRef, Vec<Dependency>>,
    /// target -> edges arriving at it, in insertion order
    incoming: BTreeMap<NodeRef, Vec<Dependency>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an edge with this exact triple exists.
    #[must_use]
    pub fn edge_exists(&self, source: &NodeRef, target: &NodeRef, kind: DependencyKind) -> bool {
        self.outgoing
            .get(source)
            .is_some_and(|edges| edges.iter().any(|e| &e.target == target && e.kind == kind))
    }

    /// Edges leaving `source` (what this node depends on).
    #[must_use]
    pub fn dependencies(&self, source: &NodeRef) -> Vec<Dependency> {
        self.outgoing.get(source).cloned().unwrap_or_default()
    }

    /// Edges arriving at `target` (what depends on this node).
    #[must_use]
    pub fn dependents(&self, target: &NodeRef) -> Vec<Dependency> {
        self.incoming.get(target).cloned().unwrap_or_default()
    }

    /// Total edge count.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    /// Iterate every edge, for snapshots.
    pub fn iter_edges(&self) -> impl Iterator<Item = &Dependency> {
        self.outgoing.values().flatten()
    }

    /// The set of nodes deleted when `start` is deleted: `start` itself
    /// plus everything reachable through `cascade_delete` edges, in
    /// discovery order with `start` first.
    ///
    /// Iterative depth-first walk with a visited set, so cycles and
    /// diamonds each delete every member exactly once.
    #[must_use]
    pub fn cascade_set(&self, start: &NodeRef) -> Vec<NodeRef> {
        let mut visited: BTreeSet<NodeRef> = BTreeSet::new();
        let mut order: Vec<NodeRef> = Vec::new();
        let mut stack: Vec<NodeRef> = vec![start.clone()];

        while let Some(node) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            order.push(node.clone());

            if let Some(edges) = self.outgoing.get(&node) {
                // Reverse push so targets are visited in edge order.
                for edge in edges.iter().rev() {
                    if edge.cascade_delete && !visited.contains(&edge.target) {
                        stack.push(edge.target.clone());
                    }
                }
            }
        }

        order
    }

    // =========================================================================
    // APPLY (crate-internal: called when committing a ChangeSet)
    // =========================================================================

    pub(crate) fn apply_insert(&mut self, edge: Dependency) {
        self.outgoing
            .entry(edge.source.clone())
            .or_default()
            .push(edge.clone());
        self.incoming.entry(edge.target.clone()).or_default().push(edge);
    }

    pub(crate) fn apply_remove_edge(
        &mut self,
        source: &NodeRef,
        target: &NodeRef,
        kind: DependencyKind,
    ) {
        if let Some(edges) = self.outgoing.get_mut(source) {
            edges.retain(|e| !(&e.target == target && e.kind == kind));
        }
        if let Some(edges) = self.incoming.get_mut(target) {
            edges.retain(|e| !(&e.source == source && e.kind == kind));
        }
    }

    /// Remove every edge touching `node`, in either direction.
    pub(crate) fn apply_remove_node_edges(&mut self, node: &NodeRef) {
        if let Some(edges) = self.outgoing.remove(node) {
            for edge in edges {
                if let Some(back) = self.incoming.get_mut(&edge.target) {
                    back.retain(|e| &e.source != node);
                }
            }
        }
        if let Some(edges) = self.incoming.remove(node) {
            for edge in edges {
                if let Some(fwd) = self.outgoing.get_mut(&edge.source) {
                    fwd.retain(|e| &e.target != node);
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
