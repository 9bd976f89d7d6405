//! # Property-Based Tests
//!
//! Proptest coverage for the determinism and key-discipline invariants of
//! the catalog engine.

use proptest::collection::vec;
use proptest::prelude::*;
use urldex_core::{
    AttributeKind, AttributeValue, Catalog, CompositeKey, KeyKind, PageRequest,
};

fn domain_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,20}"
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// A formatted key always parses back to itself.
    #[test]
    fn composite_key_roundtrip(
        namespace in "[a-z]{1,10}",
        domain in domain_name(),
        id in 1u64..1_000_000,
        is_attr in any::<bool>()
    ) {
        let key = if is_attr {
            CompositeKey::attribute(&namespace, &domain, id).expect("build")
        } else {
            CompositeKey::node(&namespace, &domain, id).expect("build")
        };
        let parsed = CompositeKey::parse(&key.format()).expect("parse");
        prop_assert_eq!(parsed, key);
    }

    /// Local ids are issued densely from 1 in creation order.
    #[test]
    fn local_ids_dense_and_monotonic(urls in vec("[a-z]{1,12}", 1..30)) {
        let mut catalog = Catalog::new();
        let mut expected = 1u64;
        for url in urls {
            let full = format!("https://{url}.example");
            if let Ok(node) = catalog.create_node("bookmarks", &full, "", "") {
                prop_assert_eq!(node.local_id, expected);
                expected += 1;
            }
        }
    }

    /// The same operation sequence against two catalogs yields identical
    /// state.
    #[test]
    fn identical_input_identical_state(urls in vec("[a-z]{1,12}", 1..20)) {
        let mut a = Catalog::new();
        let mut b = Catalog::new();
        a.set_clock(|| urldex_core::Timestamp(7));
        b.set_clock(|| urldex_core::Timestamp(7));

        for url in &urls {
            let full = format!("https://{url}.example");
            let ra = a.create_node("d", &full, url, "");
            let rb = b.create_node("d", &full, url, "");
            prop_assert_eq!(ra.is_ok(), rb.is_ok());
        }

        prop_assert_eq!(a.stats(), b.stats());
        let pa = a.list_nodes("d", None, None, None).expect("list");
        let pb = b.list_nodes("d", None, None, None).expect("list");
        prop_assert_eq!(pa.nodes, pb.nodes);
    }

    /// Page math: every item appears on exactly one page.
    #[test]
    fn pagination_covers_each_node_once(count in 1usize..60, size in 1usize..25) {
        let mut catalog = Catalog::new();
        for i in 0..count {
            catalog
                .create_node("d", &format!("https://n{i}.example"), "", "")
                .expect("create");
        }

        let request = PageRequest::normalize(None, Some(size));
        let first = catalog.list_nodes("d", None, Some(1), Some(size)).expect("list");
        prop_assert_eq!(first.total_count, count);
        prop_assert_eq!(first.total_pages, request.total_pages(count));

        let mut seen = Vec::new();
        for page in 1..=first.total_pages {
            let result = catalog
                .list_nodes("d", None, Some(page), Some(size))
                .expect("list");
            seen.extend(result.nodes.into_iter().map(|n| n.local_id));
        }
        let expected: Vec<u64> = (1..=count as u64).collect();
        prop_assert_eq!(seen, expected);
    }

    /// Snapshot export/import is lossless for arbitrary small catalogs.
    #[test]
    fn snapshot_roundtrip(urls in vec("[a-z]{1,10}", 1..15), tags in vec("[a-z]{1,8}", 0..5)) {
        let mut catalog = Catalog::new();
        catalog.set_clock(|| urldex_core::Timestamp(1));
        for url in &urls {
            let _ = catalog.create_node("d", &format!("https://{url}.example"), url, "");
        }
        if !tags.is_empty() {
            catalog
                .define_attribute("d", "tags", AttributeKind::Tag, "")
                .expect("define");
            let entries: Vec<_> = tags.iter().map(|t| AttributeValue::new("tags", t)).collect();
            catalog
                .set_attributes("urldex:d:1", entries)
                .expect("set");
        }

        let bytes = urldex_core::catalog_to_bytes(&catalog).expect("serialize");
        let restored = urldex_core::catalog_from_bytes(&bytes).expect("deserialize");
        prop_assert_eq!(restored.stats(), catalog.stats());
        prop_assert_eq!(
            restored.get_attributes("urldex:d:1").expect("values"),
            catalog.get_attributes("urldex:d:1").expect("values")
        );
    }

    /// Keys with garbage in any segment never parse as node keys.
    #[test]
    fn malformed_keys_never_parse(raw in "[a-z0-9:]{0,20}") {
        if let Ok(key) = CompositeKey::parse(&raw) {
            // Anything that parses must re-format to the input and carry
            // a positive id.
            prop_assert_eq!(key.format(), raw);
            prop_assert!(key.id >= 1);
            prop_assert!(matches!(key.kind, KeyKind::Node | KeyKind::Attribute));
        }
    }
}
