//! # Catalog Integration Tests
//!
//! End-to-end scenarios exercising the full facade: cataloging, schema,
//! filtering, cascades, the event pipeline, and subscriptions together.

use std::collections::BTreeMap;
use urldex_core::{
    AttributeFilter, AttributeKind, AttributeValue, Catalog, CatalogError, DependencyKind,
    EventStatus, EventType, Timestamp, UpdateNodeRequest,
};

fn catalog() -> Catalog {
    let mut c = Catalog::new();
    c.set_clock(|| Timestamp(1_700_000_000_000));
    c
}

// =============================================================================
// SCENARIO: BOOKMARK MANAGER
// =============================================================================

#[test]
fn bookmark_manager_full_workflow() {
    let mut c = catalog();

    // Explicit domain with a schema.
    c.create_domain("bookmarks", "Personal reading list")
        .expect("domain");
    c.define_attribute("bookmarks", "tags", AttributeKind::Tag, "topic labels")
        .expect("tags");
    c.define_attribute("bookmarks", "priority", AttributeKind::Number, "1-10")
        .expect("priority");
    c.define_attribute("bookmarks", "notes", AttributeKind::Markdown, "")
        .expect("notes");

    // Catalog some URLs.
    let rust = c
        .create_node("bookmarks", "https://rust-lang.org", "Rust", "")
        .expect("rust");
    let redb = c
        .create_node("bookmarks", "https://redb.org", "redb", "")
        .expect("redb");
    let rust_key = c.compose_node_key(&rust);
    let redb_key = c.compose_node_key(&redb);

    c.set_attributes(
        &rust_key,
        vec![
            AttributeValue::new("tags", "language"),
            AttributeValue::new("tags", "systems"),
            AttributeValue::new("priority", "9"),
        ],
    )
    .expect("set rust");
    c.set_attributes(
        &redb_key,
        vec![
            AttributeValue::new("tags", "database"),
            AttributeValue::new("tags", "systems"),
            AttributeValue::new("priority", "7"),
        ],
    )
    .expect("set redb");

    // Filter: conjunction narrows.
    let systems = c
        .filter_nodes(
            "bookmarks",
            &[AttributeFilter::equals("tags", "systems")],
            None,
            None,
        )
        .expect("filter");
    assert_eq!(systems.total_count, 2);

    let systems_db = c
        .filter_nodes(
            "bookmarks",
            &[
                AttributeFilter::equals("tags", "systems"),
                AttributeFilter::equals("tags", "database"),
            ],
            None,
            None,
        )
        .expect("filter");
    assert_eq!(systems_db.total_count, 1);
    assert_eq!(systems_db.nodes[0].url, "https://redb.org");

    // URL lookup and search agree.
    assert_eq!(
        c.find_node_by_url("bookmarks", "https://redb.org")
            .expect("find")
            .local_id,
        redb.local_id
    );
    let searched = c
        .list_nodes("bookmarks", Some("RUST"), None, None)
        .expect("search");
    assert_eq!(searched.total_count, 1);
}

// =============================================================================
// SCENARIO: CASCADE CHAIN
// =============================================================================

#[test]
fn cascade_chain_deletes_and_logs_each_member() {
    let mut c = catalog();
    let project = c
        .create_node("projects", "https://p.example", "Project", "")
        .expect("project");
    let doc = c
        .create_node("projects", "https://p.example/doc", "Doc", "")
        .expect("doc");
    let asset = c
        .create_node("projects", "https://p.example/asset", "Asset", "")
        .expect("asset");
    let shared = c
        .create_node("projects", "https://shared.example", "Shared", "")
        .expect("shared");

    let kp = c.compose_node_key(&project);
    let kd = c.compose_node_key(&doc);
    let ka = c.compose_node_key(&asset);
    let ks = c.compose_node_key(&shared);

    c.create_dependency(&kp, &kd, DependencyKind::Hard, true, false, "", BTreeMap::new())
        .expect("p->d");
    c.create_dependency(&kd, &ka, DependencyKind::Hard, true, false, "", BTreeMap::new())
        .expect("d->a");
    c.create_dependency(&kp, &ks, DependencyKind::Reference, false, false, "", BTreeMap::new())
        .expect("p->s");

    let deleted = c.delete_node(&kp).expect("cascade");
    assert_eq!(deleted.len(), 3);

    // The reference-only target survives with no dangling edges.
    assert!(c.get_node(&ks).is_ok());
    assert!(c.list_dependents(&ks).expect("deps").is_empty());

    // Each victim logged its own deletion, all in one commit.
    for key in [&kp, &kd, &ka] {
        let events = c.node_events(key).expect("events");
        assert!(
            events
                .iter()
                .any(|e| e.event_type == EventType::NodeDeleted),
            "missing deletion event for {key}"
        );
    }
}

// =============================================================================
// SCENARIO: EVENT PIPELINE WITH SUBSCRIBERS
// =============================================================================

#[test]
fn event_pipeline_drains_in_order_and_matches_subscribers() {
    let mut c = catalog();
    let node = c
        .create_node("feeds", "https://f.example", "Feed", "")
        .expect("node");
    let key = c.compose_node_key(&node);

    c.create_subscription(
        &key,
        "indexer",
        Some("https://indexer.internal/hook".to_string()),
        [EventType::NodeUpdated, EventType::NodeDeleted].into(),
    )
    .expect("subscribe");

    c.update_node(
        &key,
        UpdateNodeRequest {
            title: Some("Feed v2".to_string()),
            ..UpdateNodeRequest::default()
        },
    )
    .expect("update");

    // Pending events drain oldest-first; creation precedes update.
    let pending = c.pending_events(10);
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].event_type, EventType::NodeCreated);
    assert_eq!(pending[1].event_type, EventType::NodeUpdated);

    // The subscription only matches the update.
    assert!(c.subscriptions().matching(&pending[0]).is_empty());
    assert_eq!(c.subscriptions().matching(&pending[1]).len(), 1);

    // Drain the queue.
    for event in pending {
        let processed = c.process_event(event.id.0).expect("process");
        assert_eq!(processed.status, EventStatus::Processed);
    }
    assert!(c.pending_events(10).is_empty());
    assert_eq!(c.events().stats().processed, 2);
}

// =============================================================================
// SCENARIO: SCHEMA EVOLUTION
// =============================================================================

#[test]
fn schema_evolution_keeps_keys_and_drops_orphans() {
    let mut c = catalog();
    let node = c
        .create_node("docs", "https://d.example", "", "")
        .expect("node");
    let node_key = c.compose_node_key(&node);

    let tags = c
        .define_attribute("docs", "tags", AttributeKind::Tag, "v1")
        .expect("tags");
    let tags_key = c.compose_attribute_key(&tags);

    c.set_attributes(&node_key, vec![AttributeValue::new("tags", "draft")])
        .expect("set");

    // Description edits keep the key stable.
    let updated = c.update_attribute(&tags_key, "v2").expect("update");
    assert_eq!(c.compose_attribute_key(&updated), tags_key);
    assert_eq!(updated.description, "v2");

    // Deleting the definition strips values; a new definition with the
    // same name gets a fresh id.
    c.delete_attribute(&tags_key).expect("delete");
    assert!(c.get_attributes(&node_key).expect("values").is_empty());

    let reborn = c
        .define_attribute("docs", "tags", AttributeKind::Tag, "v3")
        .expect("redefine");
    assert!(reborn.id > tags.id);
    assert_ne!(c.compose_attribute_key(&reborn), tags_key);

    // The old key is now dangling.
    assert!(matches!(
        c.get_attribute(&tags_key),
        Err(CatalogError::AttributeNotFound(_))
    ));
}

// =============================================================================
// SCENARIO: CROSS-DOMAIN EDGES
// =============================================================================

#[test]
fn dependencies_may_cross_domains() {
    let mut c = catalog();
    let article = c
        .create_node("articles", "https://a.example", "", "")
        .expect("article");
    let image = c
        .create_node("media", "https://img.example", "", "")
        .expect("image");
    let (ka, ki) = (c.compose_node_key(&article), c.compose_node_key(&image));

    c.create_dependency(&ka, &ki, DependencyKind::Hard, true, false, "embeds", BTreeMap::new())
        .expect("edge");

    let deleted = c.delete_node(&ka).expect("cascade");
    assert_eq!(deleted.len(), 2);
    assert!(c.get_node(&ki).is_err());
    // The media domain itself survives.
    assert!(c.get_domain("media").is_ok());
}
