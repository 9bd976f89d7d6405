//! # Query Engine
//!
//! Attribute-based filtering over a domain's nodes.
//!
//! A query is a conjunction of per-attribute filters (AND semantics). A
//! node matches a filter when ANY of its values for that attribute
//! satisfies the operator. Filters referencing attributes not defined in
//! the domain schema simply match nothing; filtering is a pure read and
//! never validates values against the schema.

use crate::primitives::MAX_FILTERS;
use crate::store::{NodeStore, PageRequest};
use crate::types::{CatalogError, Node};

/// Comparison operator of one attribute filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Exact value equality.
    Equals,
    /// Case-sensitive substring containment.
    Contains,
}

impl FilterOp {
    /// Wire name of the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
        }
    }

    /// Parse a wire name. Absent or empty means equality.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "equals" => Some(Self::Equals),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }
}

/// One conjunct of a filter query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub name: String,
    pub value: String,
    pub op: FilterOp,
}

impl AttributeFilter {
    /// Build an equality filter.
    #[must_use]
    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            op: FilterOp::Equals,
        }
    }

    /// Build a containment filter.
    #[must_use]
    pub fn contains(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            op: FilterOp::Contains,
        }
    }

    fn accepts(&self, candidate: &str) -> bool {
        match self.op {
            FilterOp::Equals => candidate == self.value,
            FilterOp::Contains => candidate.contains(&self.value),
        }
    }
}

/// One page of filter results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredPage {
    pub nodes: Vec<Node>,
    pub total_count: usize,
    pub total_pages: usize,
    pub page: usize,
    pub size: usize,
}

/// Run a conjunctive attribute filter over a domain's nodes.
///
/// Results come back in ascending local-id order. An empty filter list
/// matches every node in the domain.
pub fn filter_nodes(
    store: &NodeStore,
    domain: &str,
    filters: &[AttributeFilter],
    request: PageRequest,
) -> Result<FilteredPage, CatalogError> {
    if !store.has_domain(domain) {
        return Err(CatalogError::DomainNotFound(domain.to_string()));
    }
    if filters.len() > MAX_FILTERS {
        return Err(CatalogError::InvalidFilter(format!(
            "at most {MAX_FILTERS} filters per query, got {}",
            filters.len()
        )));
    }
    for filter in filters {
        if filter.name.is_empty() {
            return Err(CatalogError::InvalidFilter(
                "filter attribute name is empty".to_string(),
            ));
        }
    }

    let matching: Vec<&Node> = store
        .domain_nodes(domain)
        .filter(|node| {
            let node_ref = node.node_ref();
            filters.iter().all(|filter| {
                store
                    .named_values(&node_ref, &filter.name)
                    .iter()
                    .any(|v| filter.accepts(&v.value))
            })
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

    Ok(FilteredPage {
        nodes,
        total_count,
        total_pages,
        page: request.page,
        size: request.size,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeValue, Domain, NodeRef, Timestamp};

    fn seeded() -> NodeStore {
        let mut store = NodeStore::new();
        store.apply_put_domain(Domain {
            name: "bookmarks".to_string(),
            description: String::new(),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        });
        for (id, url) in [(1, "https://a.example"), (2, "https://b.example"), (3, "https://c.example")] {
            store.apply_put_node(Node {
                domain: "bookmarks".to_string(),
                local_id: id,
                url: url.to_string(),
                title: format!("Node {id}"),
                description: String::new(),
                created_at: Timestamp(0),
                updated_at: Timestamp(0),
            });
        }
        store.apply_put_values(
            NodeRef::new("bookmarks", 1),
            "tags".to_string(),
            vec![
                AttributeValue::new("tags", "rust"),
                AttributeValue::new("tags", "database"),
            ],
        );
        store.apply_put_values(
            NodeRef::new("bookmarks", 1),
            "priority".to_string(),
            vec![AttributeValue::new("priority", "5")],
        );
        store.apply_put_values(
            NodeRef::new("bookmarks", 2),
            "tags".to_string(),
            vec![AttributeValue::new("tags", "rustlings")],
        );
        store
    }

    fn all(store: &NodeStore, filters: &[AttributeFilter]) -> Vec<u64> {
        filter_nodes(store, "bookmarks", filters, PageRequest::normalize(None, None))
            .expect("filter")
            .nodes
            .into_iter()
            .map(|n| n.local_id)
            .collect()
    }

    #[test]
    fn equals_matches_any_value_of_the_attribute() {
        let store = seeded();
        assert_eq!(all(&store, &[AttributeFilter::equals("tags", "rust")]), vec![1]);
        assert_eq!(
            all(&store, &[AttributeFilter::equals("tags", "database")]),
            vec![1]
        );
    }

    #[test]
    fn contains_is_substring_match() {
        let store = seeded();
        assert_eq!(
            all(&store, &[AttributeFilter::contains("tags", "rust")]),
            vec![1, 2]
        );
    }

    #[test]
    fn conjunction_requires_all_filters() {
        let store = seeded();
        assert_eq!(
            all(
                &store,
                &[
                    AttributeFilter::contains("tags", "rust"),
                    AttributeFilter::equals("priority", "5"),
                ]
            ),
            vec![1]
        );
    }

    #[test]
    fn empty_filter_list_matches_all() {
        let store = seeded();
        assert_eq!(all(&store, &[]), vec![1, 2, 3]);
    }

    #[test]
    fn unknown_attribute_matches_nothing() {
        let store = seeded();
        assert!(all(&store, &[AttributeFilter::equals("missing", "x")]).is_empty());
    }

    #[test]
    fn unknown_domain_fails() {
        let store = seeded();
        assert!(matches!(
            filter_nodes(&store, "nope", &[], PageRequest::normalize(None, None)),
            Err(CatalogError::DomainNotFound(_))
        ));
    }

    #[test]
    fn too_many_filters_rejected() {
        let store = seeded();
        let filters: Vec<_> = (0..=MAX_FILTERS)
            .map(|i| AttributeFilter::equals(format!("f{i}"), "x"))
            .collect();
        assert!(matches!(
            filter_nodes(&store, "bookmarks", &filters, PageRequest::normalize(None, None)),
            Err(CatalogError::InvalidFilter(_))
        ));
    }

    #[test]
    fn results_paginate_with_totals() {
        let store = seeded();
        let page = filter_nodes(
            &store,
            "bookmarks",
            &[AttributeFilter::contains("tags", "rust")],
            PageRequest { page: 2, size: 1 },
        )
        .expect("filter");
        assert_eq!(page.total_count, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.nodes.len(), 1);
        assert_eq!(page.nodes[0].local_id, 2);
    }
}
