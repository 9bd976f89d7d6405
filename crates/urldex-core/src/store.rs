//! # Node Store
//!
//! In-memory tables for domains, nodes, per-node attribute values, and the
//! per-domain URL uniqueness index.
//!
//! The store is a pure data structure: all reads are free of side effects
//! and all writes go through the crate-internal `apply_*` methods, which
//! the catalog facade calls only after a `ChangeSet` has been durably
//! committed. Every table is a `BTreeMap`, so listings iterate in a stable
//! order without sorting.

use crate::primitives::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::types::{AttributeValue, CatalogError, Domain, Node, NodeRef};
use std::collections::BTreeMap;

// =============================================================================
// PAGINATION
// =============================================================================

/// A normalized page request: 1-indexed page, size clamped to the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    /// Normalize raw caller input. Page defaults to 1, size to
    /// [`DEFAULT_PAGE_SIZE`], and the size is clamped to
    /// `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn normalize(page: Option<usize>, size: Option<usize>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let size = size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Self { page, size }
    }

    /// Number of pages needed to hold `total` items (at least the math;
    /// zero items is zero pages).
    #[must_use]
    pub fn total_pages(self, total: usize) -> usize {
        total.div_ceil(self.size)
    }
}

/// One page of nodes plus the totals the tool surface reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePage {
    pub nodes: Vec<Node>,
    pub total_count: usize,
    pub total_pages: usize,
    pub page: usize,
    pub size: usize,
}

// =============================================================================
// STORE
// =============================================================================

/// The catalog's record tables.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    /// domain name -> domain record
    domains: BTreeMap<String, Domain>,
    /// domain name -> local id -> node
    nodes: BTreeMap<String, BTreeMap<u64, Node>>,
    /// domain name -> url -> local id (uniqueness index)
    url_index: BTreeMap<String, BTreeMap<String, u64>>,
    /// node -> attribute name -> values
    values: BTreeMap<NodeRef, BTreeMap<String, Vec<AttributeValue>>>,
    /// domain name -> next local id to issue (ids are never reused)
    next_local_id: BTreeMap<String, u64>,
}

impl NodeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // DOMAIN READS
    // =========================================================================

    /// Look up a domain by name.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.get(name)
    }

    /// Whether a domain exists.
    #[must_use]
    pub fn has_domain(&self, name: &str) -> bool {
        self.domains.contains_key(name)
    }

    /// All domains, sorted by name.
    #[must_use]
    pub fn list_domains(&self) -> Vec<Domain> {
        self.domains.values().cloned().collect()
    }

    /// Number of domains.
    #[must_use]
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// The local id the next node in `domain` will receive.
    #[must_use]
    pub fn next_local_id(&self, domain: &str) -> u64 {
        self.next_local_id.get(domain).copied().unwrap_or(1)
    }

    /// Iterate all domain counters, for snapshots.
    pub fn local_id_counters(&self) -> impl Iterator<Item = (&String, u64)> {
        self.next_local_id.iter().map(|(d, v)| (d, *v))
    }

    // =========================================================================
    // NODE READS
    // =========================================================================

    /// Look up a node by its internal address.
    #[must_use]
    pub fn node(&self, node: &NodeRef) -> Option<&Node> {
        self.nodes.get(&node.domain)?.get(&node.local_id)
    }

    /// Whether a node exists.
    #[must_use]
    pub fn has_node(&self, node: &NodeRef) -> bool {
        self.node(node).is_some()
    }

    /// Look up a node by `(domain, url)` through the uniqueness index.
    #[must_use]
    pub fn node_by_url(&self, domain: &str, url: &str) -> Option<&Node> {
        let local_id = *self.url_index.get(domain)?.get(url)?;
        self.nodes.get(domain)?.get(&local_id)
    }

    /// Total node count across all domains.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.values().map(BTreeMap::len).sum()
    }

    /// Node count within one domain.
    #[must_use]
    pub fn domain_node_count(&self, domain: &str) -> usize {
        self.nodes.get(domain).map_or(0, BTreeMap::len)
    }

    /// Iterate every node in a domain in ascending local-id order.
    pub fn domain_nodes(&self, domain: &str) -> impl Iterator<Item = &Node> {
        self.nodes.get(domain).into_iter().flat_map(BTreeMap::values)
    }

    /// Iterate every node in the store, for snapshots.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().flat_map(BTreeMap::values)
    }

    /// List a page of a domain's nodes, optionally filtered by a
    /// case-insensitive substring match over title and URL.
    ///
    /// Fails with `DomainNotFound` if the domain does not exist; an empty
    /// domain lists as an empty first page.
    pub fn list_nodes(
        &self,
        domain: &str,
        search: Option<&str>,
        request: PageRequest,
    ) -> Result<NodePage, CatalogError> {
        if !self.has_domain(domain) {
            return Err(CatalogError::DomainNotFound(domain.to_string()));
        }

        let needle = search.map(str::to_lowercase);
        let matching: Vec<&Node> = self
            .domain_nodes(domain)
            .filter(|node| match &needle {
                Some(n) => {
                    node.title.to_lowercase().contains(n) || node.url.to_lowercase().contains(n)
                }
                None => true,
            })
            .collect();

        let total_count = matching.len();
        let total_pages = request.total_pages(total_count);
        let start = request.page.saturating_sub(1).saturating_mul(request.size);
        let nodes = matching
            .into_iter()
            .skip(start)
            .take(request.size)
            .cloned()
            .collect();

        Ok(NodePage {
            nodes,
            total_count,
            total_pages,
            page: request.page,
            size: request.size,
        })
    }

    // =========================================================================
    // VALUE READS
    // =========================================================================

    /// All attribute values on a node, ordered by attribute name.
    #[must_use]
    pub fn node_values(&self, node: &NodeRef) -> Vec<AttributeValue> {
        self.values
            .get(node)
            .map(|per_name| per_name.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Values of one named attribute on a node.
    #[must_use]
    pub fn named_values(&self, node: &NodeRef, name: &str) -> &[AttributeValue] {
        self.values
            .get(node)
            .and_then(|per_name| per_name.get(name))
            .map_or(&[], Vec::as_slice)
    }

    /// Iterate all `(node, name, values)` triples, for snapshots.
    pub fn iter_values(
        &self,
    ) -> impl Iterator<Item = (&NodeRef, &String, &Vec<AttributeValue>)> {
        self.values
            .iter()
            .flat_map(|(node, per_name)| per_name.iter().map(move |(n, v)| (node, n, v)))
    }

    // =========================================================================
    // APPLY (crate-internal: called when committing a ChangeSet)
    // =========================================================================

    pub(crate) fn apply_put_domain(&mut self, domain: Domain) {
        self.domains.insert(domain.name.clone(), domain);
    }

    pub(crate) fn apply_put_node(&mut self, node: Node) {
        let per_domain = self.nodes.entry(node.domain.clone()).or_default();
        let index = self.url_index.entry(node.domain.clone()).or_default();

        // A URL change must drop the old index entry.
        if let Some(previous) = per_domain.get(&node.local_id)
            && previous.url != node.url
        {
            index.remove(&previous.url);
        }
        index.insert(node.url.clone(), node.local_id);

        let counter = self.next_local_id.entry(node.domain.clone()).or_insert(1);
        if node.local_id >= *counter {
            *counter = node.local_id.saturating_add(1);
        }
        per_domain.insert(node.local_id, node);
    }

    pub(crate) fn apply_delete_node(&mut self, node: &NodeRef) {
        if let Some(per_domain) = self.nodes.get_mut(&node.domain)
            && let Some(removed) = per_domain.remove(&node.local_id)
            && let Some(index) = self.url_index.get_mut(&node.domain)
        {
            index.remove(&removed.url);
        }
        self.values.remove(node);
    }

    pub(crate) fn apply_put_values(
        &mut self,
        node: NodeRef,
        name: String,
        values: Vec<AttributeValue>,
    ) {
        self.values.entry(node).or_default().insert(name, values);
    }

    pub(crate) fn apply_delete_values(&mut self, node: &NodeRef, name: Option<&str>) {
        match name {
            Some(name) => {
                if let Some(per_name) = self.values.get_mut(node) {
                    per_name.remove(name);
                }
            }
            None => {
                self.values.remove(node);
            }
        }
    }

    /// Drop every value of `name` across all nodes of `domain`. Used when
    /// an attribute definition is deleted.
    pub(crate) fn apply_delete_domain_values(&mut self, domain: &str, name: &str) {
        for (node, per_name) in &mut self.values {
            if node.domain == domain {
                per_name.remove(name);
            }
        }
    }

    /// Nodes in `domain` that currently carry a value of `name`.
    #[must_use]
    pub fn nodes_with_value(&self, domain: &str, name: &str) -> Vec<NodeRef> {
        self.values
            .iter()
            .filter(|(node, per_name)| node.domain == domain && per_name.contains_key(name))
            .map(|(node, _)| node.clone())
            .collect()
    }

    pub(crate) fn apply_set_counter(&mut self, domain: &str, value: u64) {
        self.next_local_id.insert(domain.to_string(), value);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn domain(name: &str) -> Domain {
        Domain {
            name: name.to_string(),
            description: String::new(),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    fn node(domain: &str, local_id: u64, url: &str, title: &str) -> Node {
        Node {
            domain: domain.to_string(),
            local_id,
            url: url.to_string(),
            title: title.to_string(),
            description: String::new(),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    fn seeded() -> NodeStore {
        let mut store = NodeStore::new();
        store.apply_put_domain(domain("bookmarks"));
        store.apply_put_node(node("bookmarks", 1, "https://a.example", "Alpha"));
        store.apply_put_node(node("bookmarks", 2, "https://b.example", "Beta"));
        store.apply_put_node(node("bookmarks", 3, "https://c.example", "Gamma"));
        store
    }

    #[test]
    fn url_index_follows_url_changes() {
        let mut store = seeded();
        assert!(store.node_by_url("bookmarks", "https://a.example").is_some());

        let mut updated = node("bookmarks", 1, "https://a2.example", "Alpha");
        updated.updated_at = Timestamp(5);
        store.apply_put_node(updated);

        assert!(store.node_by_url("bookmarks", "https://a.example").is_none());
        assert_eq!(
            store
                .node_by_url("bookmarks", "https://a2.example")
                .map(|n| n.local_id),
            Some(1)
        );
    }

    #[test]
    fn local_ids_never_reused_after_delete() {
        let mut store = seeded();
        assert_eq!(store.next_local_id("bookmarks"), 4);
        store.apply_delete_node(&NodeRef::new("bookmarks", 3));
        assert_eq!(store.next_local_id("bookmarks"), 4);
    }

    #[test]
    fn delete_clears_url_index_and_values() {
        let mut store = seeded();
        let target = NodeRef::new("bookmarks", 2);
        store.apply_put_values(
            target.clone(),
            "tags".to_string(),
            vec![AttributeValue::new("tags", "rust")],
        );

        store.apply_delete_node(&target);
        assert!(store.node_by_url("bookmarks", "https://b.example").is_none());
        assert!(store.node_values(&target).is_empty());
    }

    #[test]
    fn list_nodes_unknown_domain_fails() {
        let store = seeded();
        assert!(matches!(
            store.list_nodes("missing", None, PageRequest::normalize(None, None)),
            Err(CatalogError::DomainNotFound(_))
        ));
    }

    #[test]
    fn list_nodes_paginates_in_id_order() {
        let store = seeded();
        let page = store
            .list_nodes("bookmarks", None, PageRequest { page: 2, size: 2 })
            .expect("list");
        assert_eq!(page.total_count, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.nodes.len(), 1);
        assert_eq!(page.nodes[0].local_id, 3);
    }

    #[test]
    fn list_nodes_search_is_case_insensitive() {
        let store = seeded();
        let page = store
            .list_nodes("bookmarks", Some("ALPHA"), PageRequest::normalize(None, None))
            .expect("list");
        assert_eq!(page.total_count, 1);
        assert_eq!(page.nodes[0].title, "Alpha");

        let by_url = store
            .list_nodes("bookmarks", Some("b.example"), PageRequest::normalize(None, None))
            .expect("list");
        assert_eq!(by_url.total_count, 1);
        assert_eq!(by_url.nodes[0].local_id, 2);
    }

    #[test]
    fn page_request_normalization() {
        let defaulted = PageRequest::normalize(None, None);
        assert_eq!(defaulted, PageRequest { page: 1, size: DEFAULT_PAGE_SIZE });

        let clamped = PageRequest::normalize(Some(0), Some(10_000));
        assert_eq!(clamped, PageRequest { page: 1, size: MAX_PAGE_SIZE });

        assert_eq!(PageRequest { page: 1, size: 20 }.total_pages(0), 0);
        assert_eq!(PageRequest { page: 1, size: 20 }.total_pages(41), 3);
    }

    #[test]
    fn delete_domain_values_only_touches_that_domain() {
        let mut store = seeded();
        store.apply_put_domain(domain("reading"));
        store.apply_put_node(node("reading", 1, "https://r.example", "Reading"));

        store.apply_put_values(
            NodeRef::new("bookmarks", 1),
            "tags".to_string(),
            vec![AttributeValue::new("tags", "rust")],
        );
        store.apply_put_values(
            NodeRef::new("reading", 1),
            "tags".to_string(),
            vec![AttributeValue::new("tags", "later")],
        );

        store.apply_delete_domain_values("bookmarks", "tags");
        assert!(store.node_values(&NodeRef::new("bookmarks", 1)).is_empty());
        assert_eq!(store.node_values(&NodeRef::new("reading", 1)).len(), 1);
    }
}
