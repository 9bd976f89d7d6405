//! # Redb Catalog Store
//!
//! One redb database holding every catalog table, with postcard-encoded
//! records. Composite-keyed tables (nodes, values, dependencies) encode
//! their key tuples with postcard as well; key ordering inside redb is
//! irrelevant because the whole database is replayed into the in-memory
//! tables on open.
//!
//! [`RedbCatalog::apply`] maps a [`ChangeSet`] onto exactly one write
//! transaction, so a crash mid-commit leaves the previous state intact.

use crate::mutation::{ChangeSet, Mutation};
use crate::types::{
    AttributeDef, AttributeValue, CatalogError, Dependency, DependencyKind, Domain, Event, Node,
    NodeRef, Subscription,
};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

// =============================================================================
// TABLES
// =============================================================================

/// domain name -> postcard(Domain)
const DOMAINS: TableDefinition<&str, &[u8]> = TableDefinition::new("domains");
/// postcard((domain, name)) -> postcard(AttributeDef)
const ATTRIBUTES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("attributes");
/// postcard(NodeRef) -> postcard(Node)
const NODES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("nodes");
/// postcard((NodeRef, name)) -> postcard(Vec<AttributeValue>)
const VALUES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("values");
/// postcard((source, target, kind)) -> postcard(Dependency)
const DEPENDENCIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("dependencies");
/// event id -> postcard(Event)
const EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("events");
/// subscription id -> postcard(Subscription)
const SUBSCRIPTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("subscriptions");
/// "node_next:<domain>" | "attr_next" | "sub_next" -> next id
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const ATTR_COUNTER_KEY: &str = "attr_next";
const SUB_COUNTER_KEY: &str = "sub_next";
const NODE_COUNTER_PREFIX: &str = "node_next:";

// =============================================================================
// CODEC
// =============================================================================

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CatalogError> {
    postcard::to_allocvec(value).map_err(|e| CatalogError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CatalogError> {
    postcard::from_bytes(bytes).map_err(|e| CatalogError::Serialization(e.to_string()))
}

fn storage_err(e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Storage(e.to_string())
}

// =============================================================================
// STORE
// =============================================================================

/// Handle to the on-disk catalog.
#[derive(Debug)]
pub struct RedbCatalog {
    db: Database,
}

impl RedbCatalog {
    /// Open (or create) the database at `path` and make sure every table
    /// exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let db = Database::create(path).map_err(storage_err)?;
        let txn = db.begin_write().map_err(storage_err)?;
        {
            txn.open_table(DOMAINS).map_err(storage_err)?;
            txn.open_table(ATTRIBUTES).map_err(storage_err)?;
            txn.open_table(NODES).map_err(storage_err)?;
            txn.open_table(VALUES).map_err(storage_err)?;
            txn.open_table(DEPENDENCIES).map_err(storage_err)?;
            txn.open_table(EVENTS).map_err(storage_err)?;
            txn.open_table(SUBSCRIPTIONS).map_err(storage_err)?;
            txn.open_table(COUNTERS).map_err(storage_err)?;
        }
        txn.commit().map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Read the entire database back as a replayable [`ChangeSet`].
    ///
    /// Counters come last so they override whatever the record puts
    /// advanced them to; this preserves never-reuse-ids across deletes.
    pub fn load(&self) -> Result<ChangeSet, CatalogError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let mut cs = ChangeSet::new();

        let domains = txn.open_table(DOMAINS).map_err(storage_err)?;
        for entry in domains.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            cs.push(Mutation::PutDomain(decode::<Domain>(value.value())?));
        }

        let attributes = txn.open_table(ATTRIBUTES).map_err(storage_err)?;
        for entry in attributes.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            cs.push(Mutation::PutAttributeDef(decode::<AttributeDef>(
                value.value(),
            )?));
        }

        let nodes = txn.open_table(NODES).map_err(storage_err)?;
        for entry in nodes.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            cs.push(Mutation::PutNode(decode::<Node>(value.value())?));
        }

        let values = txn.open_table(VALUES).map_err(storage_err)?;
        for entry in values.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let (node, name): (NodeRef, String) = decode(key.value())?;
            cs.push(Mutation::PutValues {
                node,
                name,
                values: decode::<Vec<AttributeValue>>(value.value())?,
            });
        }

        let dependencies = txn.open_table(DEPENDENCIES).map_err(storage_err)?;
        for entry in dependencies.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            cs.push(Mutation::PutDependency(decode::<Dependency>(
                value.value(),
            )?));
        }

        let events = txn.open_table(EVENTS).map_err(storage_err)?;
        for entry in events.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            cs.push(Mutation::AppendEvent(decode::<Event>(value.value())?));
        }

        let subscriptions = txn.open_table(SUBSCRIPTIONS).map_err(storage_err)?;
        for entry in subscriptions.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            cs.push(Mutation::PutSubscription(decode::<Subscription>(
                value.value(),
            )?));
        }

        let counters = txn.open_table(COUNTERS).map_err(storage_err)?;
        for entry in counters.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let (name, value) = (key.value().to_string(), value.value());
            if let Some(domain) = name.strip_prefix(NODE_COUNTER_PREFIX) {
                cs.push(Mutation::SetNodeCounter {
                    domain: domain.to_string(),
                    value,
                });
            } else if name == ATTR_COUNTER_KEY {
                cs.push(Mutation::SetAttributeCounter { value });
            } else if name == SUB_COUNTER_KEY {
                cs.push(Mutation::SetSubscriptionCounter { value });
            }
        }

        Ok(cs)
    }

    /// Commit a change set as one write transaction.
    pub fn apply(&mut self, change_set: &ChangeSet) -> Result<(), CatalogError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut domains = txn.open_table(DOMAINS).map_err(storage_err)?;
            let mut attributes = txn.open_table(ATTRIBUTES).map_err(storage_err)?;
            let mut nodes = txn.open_table(NODES).map_err(storage_err)?;
            let mut values = txn.open_table(VALUES).map_err(storage_err)?;
            let mut dependencies = txn.open_table(DEPENDENCIES).map_err(storage_err)?;
            let mut events = txn.open_table(EVENTS).map_err(storage_err)?;
            let mut subscriptions = txn.open_table(SUBSCRIPTIONS).map_err(storage_err)?;
            let mut counters = txn.open_table(COUNTERS).map_err(storage_err)?;

            for op in change_set.ops() {
                match op {
                    Mutation::PutDomain(domain) => {
                        domains
                            .insert(domain.name.as_str(), encode(domain)?.as_slice())
                            .map_err(storage_err)?;
                    }
                    Mutation::PutAttributeDef(def) => {
                        let key = encode(&(&def.domain, &def.name))?;
                        attributes
                            .insert(key.as_slice(), encode(def)?.as_slice())
                            .map_err(storage_err)?;
                    }
                    Mutation::DeleteAttributeDef { domain, name } => {
                        let key = encode(&(domain, name))?;
                        attributes.remove(key.as_slice()).map_err(storage_err)?;
                    }
                    Mutation::DeleteDomainValues { domain, name } => {
                        let doomed = scan_keys(&values, |(node, value_name): &(NodeRef, String)| {
                            &node.domain == domain && value_name == name
                        })?;
                        for key in doomed {
                            values.remove(key.as_slice()).map_err(storage_err)?;
                        }
                    }
                    Mutation::PutNode(node) => {
                        let key = encode(&node.node_ref())?;
                        // A URL change needs no index maintenance here;
                        // the uniqueness index is memory-only.
                        nodes
                            .insert(key.as_slice(), encode(node)?.as_slice())
                            .map_err(storage_err)?;
                    }
                    Mutation::DeleteNode(node_ref) => {
                        let key = encode(node_ref)?;
                        nodes.remove(key.as_slice()).map_err(storage_err)?;
                    }
                    Mutation::PutValues {
                        node,
                        name,
                        values: entry_values,
                    } => {
                        let key = encode(&(node, name))?;
                        values
                            .insert(key.as_slice(), encode(entry_values)?.as_slice())
                            .map_err(storage_err)?;
                    }
                    Mutation::DeleteValues { node, name } => match name {
                        Some(name) => {
                            let key = encode(&(node, name))?;
                            values.remove(key.as_slice()).map_err(storage_err)?;
                        }
                        None => {
                            let doomed =
                                scan_keys(&values, |(owner, _): &(NodeRef, String)| owner == node)?;
                            for key in doomed {
                                values.remove(key.as_slice()).map_err(storage_err)?;
                            }
                        }
                    },
                    Mutation::PutDependency(edge) => {
                        let key = encode(&(&edge.source, &edge.target, edge.kind))?;
                        dependencies
                            .insert(key.as_slice(), encode(edge)?.as_slice())
                            .map_err(storage_err)?;
                    }
                    Mutation::DeleteDependency {
                        source,
                        target,
                        kind,
                    } => {
                        let key = encode(&(source, target, *kind))?;
                        dependencies.remove(key.as_slice()).map_err(storage_err)?;
                    }
                    Mutation::DeleteNodeEdges(node) => {
                        let doomed = scan_keys(
                            &dependencies,
                            |(source, target, _): &(NodeRef, NodeRef, DependencyKind)| {
                                source == node || target == node
                            },
                        )?;
                        for key in doomed {
                            dependencies.remove(key.as_slice()).map_err(storage_err)?;
                        }
                    }
                    Mutation::AppendEvent(event) => {
                        events
                            .insert(event.id.0, encode(event)?.as_slice())
                            .map_err(storage_err)?;
                    }
                    Mutation::SetEventStatus { id, status } => {
                        let stored = events
                            .get(id.0)
                            .map_err(storage_err)?
                            .map(|v| decode::<Event>(v.value()))
                            .transpose()?;
                        if let Some(mut event) = stored {
                            event.status = *status;
                            events
                                .insert(id.0, encode(&event)?.as_slice())
                                .map_err(storage_err)?;
                        }
                    }
                    Mutation::PutSubscription(sub) => {
                        subscriptions
                            .insert(sub.id.0, encode(sub)?.as_slice())
                            .map_err(storage_err)?;
                    }
                    Mutation::DeleteSubscription(id) => {
                        subscriptions.remove(id.0).map_err(storage_err)?;
                    }
                    Mutation::SetNodeCounter { domain, value } => {
                        let key = format!("{NODE_COUNTER_PREFIX}{domain}");
                        counters
                            .insert(key.as_str(), *value)
                            .map_err(storage_err)?;
                    }
                    Mutation::SetAttributeCounter { value } => {
                        counters
                            .insert(ATTR_COUNTER_KEY, *value)
                            .map_err(storage_err)?;
                    }
                    Mutation::SetSubscriptionCounter { value } => {
                        counters
                            .insert(SUB_COUNTER_KEY, *value)
                            .map_err(storage_err)?;
                    }
                }
            }
        }
        txn.commit().map_err(storage_err)?;
        Ok(())
    }
}

/// Collect the raw keys of every entry whose decoded key matches the
/// predicate. Collected first because redb tables cannot be mutated while
/// iterated.
fn scan_keys<K, T>(
    table: &T,
    predicate: impl Fn(&K) -> bool,
) -> Result<Vec<Vec<u8>>, CatalogError>
where
    K: DeserializeOwned,
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut matches = Vec::new();
    for entry in table.iter().map_err(storage_err)? {
        let (key, _) = entry.map_err(storage_err)?;
        let decoded: K = decode(key.value())?;
        if predicate(&decoded) {
            matches.push(key.value().to_vec());
        }
    }
    Ok(matches)
}

// =============================================================================
// TESTS
// =============================================================================
