//! # Snapshot Format
//!
//! Whole-catalog snapshots for export and import.
//!
//! Layout: 4 magic bytes (`UDEX`), 1 version byte, then the postcard
//! payload. The payload size is checked against a hard cap before
//! deserialization so a hostile file cannot force a huge allocation.

use crate::catalog::Catalog;
use crate::mutation::{ChangeSet, Mutation};
use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_SNAPSHOT_PAYLOAD_SIZE};
use crate::types::{
    AttributeDef, AttributeValue, CatalogError, Dependency, Domain, Event, Node, NodeRef,
    Subscription,
};
use serde::{Deserialize, Serialize};

const HEADER_LEN: usize = MAGIC_BYTES.len() + 1;

/// Flat, order-stable representation of every catalog table.
#[derive(Debug, Serialize, Deserialize)]
struct SerializableCatalog {
    namespace: String,
    domains: Vec<Domain>,
    attributes: Vec<AttributeDef>,
    attr_next: u64,
    nodes: Vec<Node>,
    values: Vec<(NodeRef, String, Vec<AttributeValue>)>,
    dependencies: Vec<Dependency>,
    events: Vec<Event>,
    subscriptions: Vec<Subscription>,
    sub_next: u64,
    node_counters: Vec<(String, u64)>,
}

impl SerializableCatalog {
    fn capture(catalog: &Catalog) -> Self {
        Self {
            namespace: catalog.namespace().to_string(),
            domains: catalog.store().list_domains(),
            attributes: catalog.schema().iter().cloned().collect(),
            attr_next: catalog.schema().next_id(),
            nodes: catalog.store().iter_nodes().cloned().collect(),
            values: catalog
                .store()
                .iter_values()
                .map(|(node, name, values)| (node.clone(), name.clone(), values.clone()))
                .collect(),
            dependencies: catalog.graph().iter_edges().cloned().collect(),
            events: catalog.events().iter().cloned().collect(),
            subscriptions: catalog.subscriptions().iter().cloned().collect(),
            sub_next: catalog.subscriptions().next_id(),
            node_counters: catalog
                .store()
                .local_id_counters()
                .map(|(domain, value)| (domain.clone(), value))
                .collect(),
        }
    }

    fn restore(self) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog::with_namespace(self.namespace)?;
        let mut cs = ChangeSet::new();

        for domain in self.domains {
            cs.push(Mutation::PutDomain(domain));
        }
        for def in self.attributes {
            cs.push(Mutation::PutAttributeDef(def));
        }
        for node in self.nodes {
            cs.push(Mutation::PutNode(node));
        }
        for (node, name, values) in self.values {
            cs.push(Mutation::PutValues { node, name, values });
        }
        for edge in self.dependencies {
            cs.push(Mutation::PutDependency(edge));
        }
        for event in self.events {
            cs.push(Mutation::AppendEvent(event));
        }
        for sub in self.subscriptions {
            cs.push(Mutation::PutSubscription(sub));
        }
        // Counters last: they must win over whatever the record puts
        // advanced them to.
        for (domain, value) in self.node_counters {
            cs.push(Mutation::SetNodeCounter { domain, value });
        }
        cs.push(Mutation::SetAttributeCounter {
            value: self.attr_next,
        });
        cs.push(Mutation::SetSubscriptionCounter {
            value: self.sub_next,
        });

        catalog.apply_local(&cs);
        Ok(catalog)
    }
}

/// Serialize a catalog to the snapshot wire format.
pub fn catalog_to_bytes(catalog: &Catalog) -> Result<Vec<u8>, CatalogError> {
    let payload = postcard::to_allocvec(&SerializableCatalog::capture(catalog))
        .map_err(|e| CatalogError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC_BYTES);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a snapshot into a fresh in-memory catalog.
pub fn catalog_from_bytes(bytes: &[u8]) -> Result<Catalog, CatalogError> {
    if bytes.len() < HEADER_LEN {
        return Err(CatalogError::Serialization(
            "snapshot shorter than its header".to_string(),
        ));
    }
    if &bytes[..MAGIC_BYTES.len()] != MAGIC_BYTES {
        return Err(CatalogError::Serialization(
            "bad magic bytes, not a urldex snapshot".to_string(),
        ));
    }
    let version = bytes[MAGIC_BYTES.len()];
    if version != FORMAT_VERSION {
        return Err(CatalogError::Serialization(format!(
            "unsupported snapshot version {version}, expected {FORMAT_VERSION}"
        )));
    }
    let payload = &bytes[HEADER_LEN..];
    if payload.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(CatalogError::Serialization(format!(
            "snapshot payload of {} bytes exceeds the {MAX_SNAPSHOT_PAYLOAD_SIZE} byte cap",
            payload.len()
        )));
    }

    let snapshot: SerializableCatalog = postcard::from_bytes(payload)
        .map_err(|e| CatalogError::Serialization(e.to_string()))?;
    snapshot.restore()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeKind, DependencyKind, EventType};
    use std::collections::BTreeMap;

    fn populated() -> Catalog {
        let mut c = Catalog::new();
        let a = c.create_node("bookmarks", "https://a.example", "Alpha", "").expect("a");
        let b = c.create_node("bookmarks", "https://b.example", "Beta", "").expect("b");
        c.define_attribute("bookmarks", "tags", AttributeKind::Tag, "topic labels")
            .expect("define");
        let (ka, kb) = (c.compose_node_key(&a), c.compose_node_key(&b));
        c.set_attributes(&ka, vec![AttributeValue::new("tags", "rust")])
            .expect("set");
        c.create_dependency(&ka, &kb, DependencyKind::Soft, false, false, "", BTreeMap::new())
            .expect("edge");
        c.create_subscription(&ka, "svc", None, [EventType::NodeUpdated].into())
            .expect("subscribe");
        c
    }

    #[test]
    fn snapshot_roundtrip_preserves_everything() {
        let original = populated();
        let bytes = catalog_to_bytes(&original).expect("serialize");
        let restored = catalog_from_bytes(&bytes).expect("deserialize");

        assert_eq!(restored.namespace(), original.namespace());
        assert_eq!(restored.stats(), original.stats());
        assert_eq!(
            restored.get_attributes("urldex:bookmarks:1").expect("values"),
            original.get_attributes("urldex:bookmarks:1").expect("values")
        );
    }

    #[test]
    fn restored_catalog_continues_id_sequences() {
        let bytes = catalog_to_bytes(&populated()).expect("serialize");
        let mut restored = catalog_from_bytes(&bytes).expect("deserialize");

        let next = restored
            .create_node("bookmarks", "https://c.example", "", "")
            .expect("create");
        assert_eq!(next.local_id, 3);

        let def = restored
            .define_attribute("bookmarks", "rating", AttributeKind::Number, "")
            .expect("define");
        assert_eq!(def.id, 2);
    }

    #[test]
    fn bad_headers_rejected() {
        assert!(catalog_from_bytes(b"UD").is_err());
        assert!(catalog_from_bytes(b"NOPE\x01").is_err());

        let mut wrong_version = catalog_to_bytes(&Catalog::new()).expect("serialize");
        wrong_version[MAGIC_BYTES.len()] = FORMAT_VERSION + 1;
        assert!(catalog_from_bytes(&wrong_version).is_err());
    }

    #[test]
    fn truncated_payload_rejected() {
        let bytes = catalog_to_bytes(&populated()).expect("serialize");
        assert!(catalog_from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
