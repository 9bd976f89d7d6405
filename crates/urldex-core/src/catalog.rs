//! # Catalog Facade
//!
//! The single mutation surface of the engine.
//!
//! Every operation follows the same shape: parse and validate inputs
//! against the current immutable state, assemble a [`ChangeSet`], commit
//! it to the storage backend (one write transaction), then apply it to the
//! in-memory tables. Application is infallible, so a storage failure
//! leaves both durable and in-memory state untouched.
//!
//! External callers address nodes and attribute definitions exclusively by
//! composite-key strings (`namespace:domain:id`, `namespace:domain:attr-<id>`);
//! the raw `NodeRef` never crosses the tool boundary.

use crate::events::{EventLog, EventStats};
use crate::graph::DependencyGraph;
use crate::key::{CompositeKey, KeyKind};
use crate::mutation::{ChangeSet, Mutation};
use crate::primitives::{
    DEFAULT_NAMESPACE, MAX_ATTRIBUTE_BATCH, MAX_ATTRIBUTE_NAME_LENGTH, MAX_DESCRIPTION_LENGTH,
    MAX_DOMAIN_NAME_LENGTH, MAX_TITLE_LENGTH, MAX_URL_LENGTH,
};
use crate::query::{self, AttributeFilter, FilteredPage};
use crate::schema::{SchemaRegistry, is_http_url};
use crate::storage::redb_catalog::RedbCatalog;
use crate::store::{NodePage, NodeStore, PageRequest};
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{
    AttributeDef, AttributeKind, AttributeValue, CatalogError, Dependency, DependencyKind, Domain,
    Event, EventId, EventStatus, EventType, Node, NodeRef, Subscription, SubscriptionId,
    Timestamp,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// =============================================================================
// BACKEND & REQUESTS
// =============================================================================

/// Where committed change sets go before the in-memory apply.
#[derive(Debug)]
enum StorageBackend {
    /// No durability; everything lives in the tables.
    InMemory,
    /// Every change set is one redb write transaction.
    Persistent(RedbCatalog),
}

/// Partial update of a node's mutable fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct UpdateNodeRequest {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Counters reported by the server-info surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogStats {
    pub domains: usize,
    pub nodes: usize,
    pub attribute_defs: usize,
    pub dependencies: usize,
    pub subscriptions: usize,
    pub events: EventStats,
}

fn system_millis() -> Timestamp {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
    Timestamp(millis)
}

// =============================================================================
// CATALOG
// =============================================================================

/// The urldex catalog engine.
#[derive(Debug)]
pub struct Catalog {
    namespace: String,
    store: NodeStore,
    schema: SchemaRegistry,
    graph: DependencyGraph,
    events: EventLog,
    subscriptions: SubscriptionRegistry,
    backend: StorageBackend,
    clock: fn() -> Timestamp,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty in-memory catalog with the default namespace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            store: NodeStore::new(),
            schema: SchemaRegistry::new(),
            graph: DependencyGraph::new(),
            events: EventLog::new(),
            subscriptions: SubscriptionRegistry::new(),
            backend: StorageBackend::InMemory,
            clock: system_millis,
        }
    }

    /// Create an empty in-memory catalog with a custom namespace.
    pub fn with_namespace(namespace: impl Into<String>) -> Result<Self, CatalogError> {
        let namespace = namespace.into();
        if namespace.is_empty() || namespace.contains(crate::key::KEY_SEPARATOR) {
            return Err(CatalogError::Validation {
                field: "namespace",
                message: "must be non-empty and must not contain ':'".to_string(),
            });
        }
        Ok(Self {
            namespace,
            ..Self::new()
        })
    }

    /// Open (or create) a redb-backed catalog at `path`, replaying the
    /// stored state into memory.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let db = RedbCatalog::open(path)?;
        let replay = db.load()?;
        let mut catalog = Self::new();
        catalog.apply_local(&replay);
        catalog.backend = StorageBackend::Persistent(db);
        Ok(catalog)
    }

    /// Attach a fresh redb database and persist the entire current state
    /// into it as one transaction. Refuses a database that already holds
    /// data, so an import cannot silently merge into existing state.
    pub fn attach_redb(&mut self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let mut db = RedbCatalog::open(path)?;
        if !db.load()?.is_empty() {
            return Err(CatalogError::Storage(
                "target database is not empty".to_string(),
            ));
        }
        db.apply(&self.full_change_set())?;
        self.backend = StorageBackend::Persistent(db);
        Ok(())
    }

    /// The entire current state as one replayable change set.
    fn full_change_set(&self) -> ChangeSet {
        let mut cs = ChangeSet::new();
        for domain in self.store.list_domains() {
            cs.push(Mutation::PutDomain(domain));
        }
        for def in self.schema.iter() {
            cs.push(Mutation::PutAttributeDef(def.clone()));
        }
        for node in self.store.iter_nodes() {
            cs.push(Mutation::PutNode(node.clone()));
        }
        for (node, name, values) in self.store.iter_values() {
            cs.push(Mutation::PutValues {
                node: node.clone(),
                name: name.clone(),
                values: values.clone(),
            });
        }
        for edge in self.graph.iter_edges() {
            cs.push(Mutation::PutDependency(edge.clone()));
        }
        for event in self.events.iter() {
            cs.push(Mutation::AppendEvent(event.clone()));
        }
        for sub in self.subscriptions.iter() {
            cs.push(Mutation::PutSubscription(sub.clone()));
        }
        for (domain, value) in self.store.local_id_counters() {
            cs.push(Mutation::SetNodeCounter {
                domain: domain.clone(),
                value,
            });
        }
        cs.push(Mutation::SetAttributeCounter {
            value: self.schema.next_id(),
        });
        cs.push(Mutation::SetSubscriptionCounter {
            value: self.subscriptions.next_id(),
        });
        cs
    }

    /// Replace the clock. Tests inject deterministic timestamps here.
    pub fn set_clock(&mut self, clock: fn() -> Timestamp) {
        self.clock = clock;
    }

    /// The namespace embedded in every key this catalog issues.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Read access to the record tables.
    #[must_use]
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Read access to the attribute schema.
    #[must_use]
    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Read access to the dependency graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Read access to the event log.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Read access to the subscription registry.
    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Aggregate counters for the server-info surface.
    #[must_use]
    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            domains: self.store.domain_count(),
            nodes: self.store.node_count(),
            attribute_defs: self.schema.len(),
            dependencies: self.graph.edge_count(),
            subscriptions: self.subscriptions.len(),
            events: self.events.stats(),
        }
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    fn commit(&mut self, change_set: ChangeSet) -> Result<(), CatalogError> {
        if let StorageBackend::Persistent(db) = &mut self.backend {
            db.apply(&change_set)?;
        }
        self.apply_local(&change_set);
        Ok(())
    }

    /// Apply a committed change set to the in-memory tables. Infallible:
    /// every op was validated before commit.
    pub(crate) fn apply_local(&mut self, change_set: &ChangeSet) {
        for op in change_set.ops() {
            match op.clone() {
                Mutation::PutDomain(domain) => self.store.apply_put_domain(domain),
                Mutation::PutAttributeDef(def) => self.schema.apply_put(def),
                Mutation::DeleteAttributeDef { domain, name } => {
                    self.schema.apply_delete(&domain, &name);
                }
                Mutation::DeleteDomainValues { domain, name } => {
                    self.store.apply_delete_domain_values(&domain, &name);
                }
                Mutation::PutNode(node) => self.store.apply_put_node(node),
                Mutation::DeleteNode(node) => self.store.apply_delete_node(&node),
                Mutation::PutValues { node, name, values } => {
                    self.store.apply_put_values(node, name, values);
                }
                Mutation::DeleteValues { node, name } => {
                    self.store.apply_delete_values(&node, name.as_deref());
                }
                Mutation::PutDependency(edge) => self.graph.apply_insert(edge),
                Mutation::DeleteDependency {
                    source,
                    target,
                    kind,
                } => self.graph.apply_remove_edge(&source, &target, kind),
                Mutation::DeleteNodeEdges(node) => self.graph.apply_remove_node_edges(&node),
                Mutation::AppendEvent(event) => self.events.apply_append(event),
                Mutation::SetEventStatus { id, status } => {
                    self.events.apply_set_status(id, status);
                }
                Mutation::PutSubscription(sub) => self.subscriptions.apply_put(sub),
                Mutation::DeleteSubscription(id) => self.subscriptions.apply_delete(id),
                Mutation::SetNodeCounter { domain, value } => {
                    self.store.apply_set_counter(&domain, value);
                }
                Mutation::SetAttributeCounter { value } => {
                    self.schema.apply_set_counter(value);
                }
                Mutation::SetSubscriptionCounter { value } => {
                    self.subscriptions.apply_set_counter(value);
                }
            }
        }
    }

    // =========================================================================
    // KEYS
    // =========================================================================

    /// Composite key of a node.
    #[must_use]
    pub fn compose_node_key(&self, node: &Node) -> String {
        CompositeKey {
            namespace: self.namespace.clone(),
            domain: node.domain.clone(),
            kind: KeyKind::Node,
            id: node.local_id,
        }
        .format()
    }

    /// Composite key of an attribute definition.
    #[must_use]
    pub fn compose_attribute_key(&self, def: &AttributeDef) -> String {
        CompositeKey {
            namespace: self.namespace.clone(),
            domain: def.domain.clone(),
            kind: KeyKind::Attribute,
            id: def.id,
        }
        .format()
    }

    fn parse_key(&self, raw: &str, kind: KeyKind) -> Result<CompositeKey, CatalogError> {
        let key = CompositeKey::parse(raw)?;
        if key.namespace != self.namespace {
            return Err(CatalogError::InvalidKey(format!(
                "key belongs to namespace {}, this catalog is {}: {raw}",
                key.namespace, self.namespace
            )));
        }
        if key.kind != kind {
            let expected = match kind {
                KeyKind::Node => "a node key",
                KeyKind::Attribute => "an attribute key",
            };
            return Err(CatalogError::InvalidKey(format!(
                "expected {expected}: {raw}"
            )));
        }
        Ok(key)
    }

    fn parse_node_key(&self, raw: &str) -> Result<NodeRef, CatalogError> {
        let key = self.parse_key(raw, KeyKind::Node)?;
        Ok(NodeRef::new(key.domain, key.id))
    }

    fn resolve_node(&self, raw: &str) -> Result<Node, CatalogError> {
        let node_ref = self.parse_node_key(raw)?;
        self.store
            .node(&node_ref)
            .cloned()
            .ok_or_else(|| CatalogError::NodeNotFound(raw.to_string()))
    }

    fn resolve_attribute(&self, raw: &str) -> Result<AttributeDef, CatalogError> {
        let key = self.parse_key(raw, KeyKind::Attribute)?;
        match self.schema.get_by_id(key.id) {
            Some(def) if def.domain == key.domain => Ok(def.clone()),
            _ => Err(CatalogError::AttributeNotFound(raw.to_string())),
        }
    }

    // =========================================================================
    // DOMAINS
    // =========================================================================

    /// Create a domain. Names are immutable once chosen.
    pub fn create_domain(
        &mut self,
        name: &str,
        description: &str,
    ) -> Result<Domain, CatalogError> {
        validate_domain_name(name)?;
        validate_length("description", description, MAX_DESCRIPTION_LENGTH)?;
        if self.store.has_domain(name) {
            return Err(CatalogError::DuplicateDomain(name.to_string()));
        }

        let now = self.now();
        let domain = Domain {
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut cs = ChangeSet::new();
        cs.push(Mutation::PutDomain(domain.clone()));
        self.commit(cs)?;
        Ok(domain)
    }

    /// All domains, sorted by name.
    #[must_use]
    pub fn list_domains(&self) -> Vec<Domain> {
        self.store.list_domains()
    }

    /// Look up one domain.
    pub fn get_domain(&self, name: &str) -> Result<Domain, CatalogError> {
        self.store
            .domain(name)
            .cloned()
            .ok_or_else(|| CatalogError::DomainNotFound(name.to_string()))
    }

    // =========================================================================
    // NODES
    // =========================================================================

    /// Catalog a URL in a domain, creating the domain on first use.
    ///
    /// URLs are unique per domain. Emits a `node.created` event.
    pub fn create_node(
        &mut self,
        domain: &str,
        url: &str,
        title: &str,
        description: &str,
    ) -> Result<Node, CatalogError> {
        validate_domain_name(domain)?;
        validate_url(url)?;
        validate_length("title", title, MAX_TITLE_LENGTH)?;
        validate_length("description", description, MAX_DESCRIPTION_LENGTH)?;

        if self.store.node_by_url(domain, url).is_some() {
            return Err(CatalogError::DuplicateUrl {
                domain: domain.to_string(),
                url: url.to_string(),
            });
        }

        let now = self.now();
        let mut cs = ChangeSet::new();

        if !self.store.has_domain(domain) {
            cs.push(Mutation::PutDomain(Domain {
                name: domain.to_string(),
                description: format!("Auto-created domain for {domain}"),
                created_at: now,
                updated_at: now,
            }));
        }

        let local_id = self.store.next_local_id(domain);
        let node = Node {
            domain: domain.to_string(),
            local_id,
            url: url.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };

        cs.push(Mutation::PutNode(node.clone()));
        cs.push(Mutation::SetNodeCounter {
            domain: domain.to_string(),
            value: local_id.saturating_add(1),
        });
        cs.push(Mutation::AppendEvent(Event {
            id: EventId(self.events.next_id()),
            node: node.node_ref(),
            event_type: EventType::NodeCreated,
            attribute: None,
            before: None,
            after: Some(node.snapshot()),
            status: EventStatus::Pending,
            created_at: now,
        }));

        self.commit(cs)?;
        Ok(node)
    }

    /// Look up a node by composite key.
    pub fn get_node(&self, key: &str) -> Result<Node, CatalogError> {
        self.resolve_node(key)
    }

    /// Look up a node by `(domain, url)`.
    pub fn find_node_by_url(&self, domain: &str, url: &str) -> Result<Node, CatalogError> {
        if !self.store.has_domain(domain) {
            return Err(CatalogError::DomainNotFound(domain.to_string()));
        }
        self.store
            .node_by_url(domain, url)
            .cloned()
            .ok_or_else(|| CatalogError::NodeNotFound(format!("{domain} {url}")))
    }

    /// Update a node's mutable fields. Emits a `node.updated` event with
    /// before and after snapshots.
    pub fn update_node(
        &mut self,
        key: &str,
        request: UpdateNodeRequest,
    ) -> Result<Node, CatalogError> {
        let current = self.resolve_node(key)?;
        let before = current.snapshot();

        let mut updated = current.clone();
        if let Some(url) = request.url {
            validate_url(&url)?;
            if url != current.url
                && self.store.node_by_url(&current.domain, &url).is_some()
            {
                return Err(CatalogError::DuplicateUrl {
                    domain: current.domain.clone(),
                    url,
                });
            }
            updated.url = url;
        }
        if let Some(title) = request.title {
            validate_length("title", &title, MAX_TITLE_LENGTH)?;
            updated.title = title;
        }
        if let Some(description) = request.description {
            validate_length("description", &description, MAX_DESCRIPTION_LENGTH)?;
            updated.description = description;
        }
        updated.updated_at = self.now();

        let mut cs = ChangeSet::new();
        cs.push(Mutation::PutNode(updated.clone()));
        cs.push(Mutation::AppendEvent(Event {
            id: EventId(self.events.next_id()),
            node: updated.node_ref(),
            event_type: EventType::NodeUpdated,
            attribute: None,
            before: Some(before),
            after: Some(updated.snapshot()),
            status: EventStatus::Pending,
            created_at: updated.updated_at,
        }));

        self.commit(cs)?;
        Ok(updated)
    }

    /// Delete a node plus everything reachable through `cascade_delete`
    /// edges. Every deleted node gets its own `node.deleted` event in the
    /// same commit. Returns the deleted set, target first.
    ///
    /// Subscriptions on deleted nodes are retained; they simply never
    /// match again.
    pub fn delete_node(&mut self, key: &str) -> Result<Vec<NodeRef>, CatalogError> {
        let target = self.resolve_node(key)?;
        let victims = self.graph.cascade_set(&target.node_ref());

        let now = self.now();
        let mut cs = ChangeSet::new();
        let mut next_event = self.events.next_id();

        for victim in &victims {
            // Cascade targets may already be gone if the graph held an
            // edge to a node deleted out of band; skip silently.
            let Some(node) = self.store.node(victim) else {
                continue;
            };
            let before = node.snapshot();

            cs.push(Mutation::DeleteValues {
                node: victim.clone(),
                name: None,
            });
            cs.push(Mutation::DeleteNodeEdges(victim.clone()));
            cs.push(Mutation::DeleteNode(victim.clone()));
            cs.push(Mutation::AppendEvent(Event {
                id: EventId(next_event),
                node: victim.clone(),
                event_type: EventType::NodeDeleted,
                attribute: None,
                before: Some(before),
                after: None,
                status: EventStatus::Pending,
                created_at: now,
            }));
            next_event = next_event.saturating_add(1);
        }

        self.commit(cs)?;
        Ok(victims)
    }

    /// List a page of a domain's nodes, optionally filtered by a
    /// case-insensitive substring over title and URL.
    pub fn list_nodes(
        &self,
        domain: &str,
        search: Option<&str>,
        page: Option<usize>,
        size: Option<usize>,
    ) -> Result<NodePage, CatalogError> {
        self.store
            .list_nodes(domain, search, PageRequest::normalize(page, size))
    }

    // =========================================================================
    // ATTRIBUTE SCHEMA
    // =========================================================================

    /// Define an attribute in a domain's schema. The kind is immutable
    /// post-creation.
    pub fn define_attribute(
        &mut self,
        domain: &str,
        name: &str,
        kind: AttributeKind,
        description: &str,
    ) -> Result<AttributeDef, CatalogError> {
        if !self.store.has_domain(domain) {
            return Err(CatalogError::DomainNotFound(domain.to_string()));
        }
        validate_attribute_name(name)?;
        validate_length("description", description, MAX_DESCRIPTION_LENGTH)?;
        if self.schema.contains(domain, name) {
            return Err(CatalogError::DuplicateAttribute {
                domain: domain.to_string(),
                name: name.to_string(),
            });
        }

        let now = self.now();
        let id = self.schema.next_id();
        let def = AttributeDef {
            id,
            domain: domain.to_string(),
            name: name.to_string(),
            kind,
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut cs = ChangeSet::new();
        cs.push(Mutation::PutAttributeDef(def.clone()));
        cs.push(Mutation::SetAttributeCounter {
            value: id.saturating_add(1),
        });
        self.commit(cs)?;
        Ok(def)
    }

    /// A domain's attribute definitions, sorted by name.
    pub fn list_attributes(&self, domain: &str) -> Result<Vec<AttributeDef>, CatalogError> {
        if !self.store.has_domain(domain) {
            return Err(CatalogError::DomainNotFound(domain.to_string()));
        }
        Ok(self.schema.list(domain))
    }

    /// Look up an attribute definition by composite key.
    pub fn get_attribute(&self, key: &str) -> Result<AttributeDef, CatalogError> {
        self.resolve_attribute(key)
    }

    /// Update an attribute's description. Name and kind are immutable.
    pub fn update_attribute(
        &mut self,
        key: &str,
        description: &str,
    ) -> Result<AttributeDef, CatalogError> {
        validate_length("description", description, MAX_DESCRIPTION_LENGTH)?;
        let mut def = self.resolve_attribute(key)?;
        def.description = description.to_string();
        def.updated_at = self.now();

        let mut cs = ChangeSet::new();
        cs.push(Mutation::PutAttributeDef(def.clone()));
        self.commit(cs)?;
        Ok(def)
    }

    /// Delete an attribute definition and strip its values from every
    /// node in the domain. Emits no node events.
    pub fn delete_attribute(&mut self, key: &str) -> Result<(), CatalogError> {
        let def = self.resolve_attribute(key)?;

        let mut cs = ChangeSet::new();
        cs.push(Mutation::DeleteDomainValues {
            domain: def.domain.clone(),
            name: def.name.clone(),
        });
        cs.push(Mutation::DeleteAttributeDef {
            domain: def.domain,
            name: def.name,
        });
        self.commit(cs)
    }

    // =========================================================================
    // NODE ATTRIBUTE VALUES
    // =========================================================================

    /// Set attribute values on a node, all-or-nothing.
    ///
    /// Every entry is validated against the domain schema before anything
    /// is written. The batch replaces values per attribute name: names
    /// mentioned in the batch get exactly the batch's values (last entry
    /// wins for single-valued kinds), names not mentioned are untouched.
    /// One `attribute_changed` event is emitted per distinct name.
    ///
    /// Returns the node's full value list after the write.
    pub fn set_attributes(
        &mut self,
        key: &str,
        entries: Vec<AttributeValue>,
    ) -> Result<Vec<AttributeValue>, CatalogError> {
        let node = self.resolve_node(key)?;
        let node_ref = node.node_ref();

        if entries.len() > MAX_ATTRIBUTE_BATCH {
            return Err(CatalogError::Validation {
                field: "attributes",
                message: format!(
                    "at most {MAX_ATTRIBUTE_BATCH} entries per call, got {}",
                    entries.len()
                ),
            });
        }
        for entry in &entries {
            self.schema.validate_entry(&node.domain, entry)?;
        }

        // Group by name in batch order; single-valued kinds keep only the
        // last entry for the name.
        let mut grouped: BTreeMap<String, Vec<AttributeValue>> = BTreeMap::new();
        for entry in entries {
            let multi = self
                .schema
                .get(&node.domain, &entry.name)
                .is_some_and(|def| def.kind.is_multi_valued());
            let bucket = grouped.entry(entry.name.clone()).or_default();
            if !multi {
                bucket.clear();
            }
            bucket.push(entry);
        }

        let now = self.now();
        let mut cs = ChangeSet::new();
        let mut next_event = self.events.next_id();

        for (name, values) in &grouped {
            cs.push(Mutation::PutValues {
                node: node_ref.clone(),
                name: name.clone(),
                values: values.clone(),
            });
            cs.push(Mutation::AppendEvent(Event {
                id: EventId(next_event),
                node: node_ref.clone(),
                event_type: EventType::AttributeChanged,
                attribute: Some(name.clone()),
                before: None,
                after: None,
                status: EventStatus::Pending,
                created_at: now,
            }));
            next_event = next_event.saturating_add(1);
        }

        self.commit(cs)?;
        Ok(self.store.node_values(&node_ref))
    }

    /// All attribute values on a node, ordered by attribute name.
    pub fn get_attributes(&self, key: &str) -> Result<Vec<AttributeValue>, CatalogError> {
        let node = self.resolve_node(key)?;
        Ok(self.store.node_values(&node.node_ref()))
    }

    // =========================================================================
    // DEPENDENCIES
    // =========================================================================

    /// Create a typed dependency edge from `source_key` to `target_key`.
    ///
    /// At most one edge per `(source, target, kind)` triple. Cycles are
    /// permitted. Emits no node events.
    #[allow(clippy::too_many_arguments)]
    pub fn create_dependency(
        &mut self,
        source_key: &str,
        target_key: &str,
        kind: DependencyKind,
        cascade_delete: bool,
        cascade_update: bool,
        description: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<Dependency, CatalogError> {
        let source = self.resolve_node(source_key)?.node_ref();
        let target = self.resolve_node(target_key)?.node_ref();
        validate_length("description", description, MAX_DESCRIPTION_LENGTH)?;

        if self.graph.edge_exists(&source, &target, kind) {
            return Err(CatalogError::DuplicateEdge);
        }

        let edge = Dependency {
            source,
            target,
            kind,
            cascade_delete,
            cascade_update,
            description: description.to_string(),
            metadata,
            created_at: self.now(),
        };

        let mut cs = ChangeSet::new();
        cs.push(Mutation::PutDependency(edge.clone()));
        self.commit(cs)?;
        Ok(edge)
    }

    /// Remove one dependency edge by its identifying triple.
    pub fn delete_dependency(
        &mut self,
        source_key: &str,
        target_key: &str,
        kind: DependencyKind,
    ) -> Result<(), CatalogError> {
        let source = self.parse_node_key(source_key)?;
        let target = self.parse_node_key(target_key)?;
        if !self.graph.edge_exists(&source, &target, kind) {
            return Err(CatalogError::DependencyNotFound);
        }

        let mut cs = ChangeSet::new();
        cs.push(Mutation::DeleteDependency {
            source,
            target,
            kind,
        });
        self.commit(cs)
    }

    /// Edges leaving a node (what it depends on).
    pub fn list_dependencies(&self, key: &str) -> Result<Vec<Dependency>, CatalogError> {
        let node = self.resolve_node(key)?;
        Ok(self.graph.dependencies(&node.node_ref()))
    }

    /// Edges arriving at a node (what depends on it).
    pub fn list_dependents(&self, key: &str) -> Result<Vec<Dependency>, CatalogError> {
        let node = self.resolve_node(key)?;
        Ok(self.graph.dependents(&node.node_ref()))
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// A node's event history, oldest first. Works for deleted nodes: the
    /// key only needs to parse, not to resolve.
    pub fn node_events(&self, key: &str) -> Result<Vec<Event>, CatalogError> {
        let node_ref = self.parse_node_key(key)?;
        Ok(self.events.node_events(&node_ref))
    }

    /// Up to `limit` pending events in commit order.
    #[must_use]
    pub fn pending_events(&self, limit: usize) -> Vec<Event> {
        self.events.pending(limit)
    }

    /// Mark an event processed. Idempotent: processing a processed event
    /// is a no-op returning the event.
    pub fn process_event(&mut self, id: u64) -> Result<Event, CatalogError> {
        let event = self
            .events
            .get(EventId(id))
            .cloned()
            .ok_or(CatalogError::EventNotFound(id))?;
        if event.status == EventStatus::Processed {
            return Ok(event);
        }

        let mut cs = ChangeSet::new();
        cs.push(Mutation::SetEventStatus {
            id: EventId(id),
            status: EventStatus::Processed,
        });
        self.commit(cs)?;

        Ok(Event {
            status: EventStatus::Processed,
            ..event
        })
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Register an interest in a node's events. The node must exist at
    /// registration time; the subscription survives its deletion.
    pub fn create_subscription(
        &mut self,
        node_key: &str,
        subscriber_service: &str,
        subscriber_endpoint: Option<String>,
        event_types: BTreeSet<EventType>,
    ) -> Result<Subscription, CatalogError> {
        let node = self.resolve_node(node_key)?;
        if subscriber_service.is_empty() {
            return Err(CatalogError::Validation {
                field: "subscriber_service",
                message: "must be non-empty".to_string(),
            });
        }
        if event_types.is_empty() {
            return Err(CatalogError::InvalidFilter(
                "a subscription needs at least one event type".to_string(),
            ));
        }

        let id = SubscriptionId(self.subscriptions.next_id());
        let sub = Subscription {
            id,
            node: node.node_ref(),
            subscriber_service: subscriber_service.to_string(),
            subscriber_endpoint,
            event_types,
            created_at: self.now(),
        };

        let mut cs = ChangeSet::new();
        cs.push(Mutation::PutSubscription(sub.clone()));
        cs.push(Mutation::SetSubscriptionCounter {
            value: id.0.saturating_add(1),
        });
        self.commit(cs)?;
        Ok(sub)
    }

    /// All subscriptions, in id order.
    #[must_use]
    pub fn list_subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.list()
    }

    /// Subscriptions targeting one node. The key only needs to parse, so
    /// subscriptions on deleted nodes stay visible.
    pub fn node_subscriptions(&self, key: &str) -> Result<Vec<Subscription>, CatalogError> {
        let node_ref = self.parse_node_key(key)?;
        Ok(self.subscriptions.node_subscriptions(&node_ref))
    }

    /// Remove a subscription.
    pub fn delete_subscription(&mut self, id: u64) -> Result<(), CatalogError> {
        if self.subscriptions.get(SubscriptionId(id)).is_none() {
            return Err(CatalogError::SubscriptionNotFound(id));
        }
        let mut cs = ChangeSet::new();
        cs.push(Mutation::DeleteSubscription(SubscriptionId(id)));
        self.commit(cs)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Conjunctive attribute filter over a domain's nodes.
    pub fn filter_nodes(
        &self,
        domain: &str,
        filters: &[AttributeFilter],
        page: Option<usize>,
        size: Option<usize>,
    ) -> Result<FilteredPage, CatalogError> {
        query::filter_nodes(
            &self.store,
            domain,
            filters,
            PageRequest::normalize(page, size),
        )
    }
}

// =============================================================================
// FIELD VALIDATION
// =============================================================================

fn validate_length(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), CatalogError> {
    if value.len() > max {
        return Err(CatalogError::Validation {
            field,
            message: format!("exceeds {max} characters"),
        });
    }
    Ok(())
}

fn validate_domain_name(name: &str) -> Result<(), CatalogError> {
    if name.is_empty() {
        return Err(CatalogError::Validation {
            field: "domain_name",
            message: "must be non-empty".to_string(),
        });
    }
    validate_length("domain_name", name, MAX_DOMAIN_NAME_LENGTH)?;
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(CatalogError::Validation {
            field: "domain_name",
            message: "may only contain alphanumerics and hyphens".to_string(),
        });
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<(), CatalogError> {
    if url.is_empty() {
        return Err(CatalogError::Validation {
            field: "url",
            message: "must be non-empty".to_string(),
        });
    }
    validate_length("url", url, MAX_URL_LENGTH)?;
    if !is_http_url(url) {
        return Err(CatalogError::Validation {
            field: "url",
            message: "must be an http(s) URL".to_string(),
        });
    }
    Ok(())
}

fn validate_attribute_name(name: &str) -> Result<(), CatalogError> {
    if name.is_empty() {
        return Err(CatalogError::Validation {
            field: "attribute_name",
            message: "must be non-empty".to_string(),
        });
    }
    validate_length("attribute_name", name, MAX_ATTRIBUTE_NAME_LENGTH)?;
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CatalogError::Validation {
            field: "attribute_name",
            message: "may only contain alphanumerics, underscores, and hyphens".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_clock() -> Timestamp {
        Timestamp(1_700_000_000_000)
    }

    fn catalog() -> Catalog {
        let mut c = Catalog::new();
        c.set_clock(fixed_clock);
        c
    }

    #[test]
    fn create_node_auto_creates_domain() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "Alpha", "")
            .expect("create");
        assert_eq!(node.local_id, 1);

        let domain = c.get_domain("bookmarks").expect("domain");
        assert_eq!(domain.description, "Auto-created domain for bookmarks");
    }

    #[test]
    fn duplicate_url_per_domain_rejected_but_cross_domain_allowed() {
        let mut c = catalog();
        c.create_node("a", "https://x.example", "", "").expect("n1");
        assert!(matches!(
            c.create_node("a", "https://x.example", "", ""),
            Err(CatalogError::DuplicateUrl { .. })
        ));
        assert!(c.create_node("b", "https://x.example", "", "").is_ok());
    }

    #[test]
    fn keys_roundtrip_through_the_facade() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "Alpha", "")
            .expect("create");
        let key = c.compose_node_key(&node);
        assert_eq!(key, "urldex:bookmarks:1");
        assert_eq!(c.get_node(&key).expect("get").url, "https://a.example");
    }

    #[test]
    fn foreign_namespace_key_rejected() {
        let mut c = catalog();
        c.create_node("bookmarks", "https://a.example", "", "")
            .expect("create");
        assert!(matches!(
            c.get_node("other:bookmarks:1"),
            Err(CatalogError::InvalidKey(_))
        ));
    }

    #[test]
    fn update_node_emits_before_and_after() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "Old", "")
            .expect("create");
        let key = c.compose_node_key(&node);

        let updated = c
            .update_node(
                &key,
                UpdateNodeRequest {
                    title: Some("New".to_string()),
                    ..UpdateNodeRequest::default()
                },
            )
            .expect("update");
        assert_eq!(updated.title, "New");
        assert_eq!(updated.url, "https://a.example");

        let events = c.node_events(&key).expect("events");
        assert_eq!(events.len(), 2);
        let update_event = &events[1];
        assert_eq!(update_event.event_type, EventType::NodeUpdated);
        assert_eq!(
            update_event.before.as_ref().map(|s| s.title.as_str()),
            Some("Old")
        );
        assert_eq!(
            update_event.after.as_ref().map(|s| s.title.as_str()),
            Some("New")
        );
    }

    #[test]
    fn set_attributes_is_all_or_nothing() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "", "")
            .expect("create");
        c.define_attribute("bookmarks", "tags", AttributeKind::Tag, "")
            .expect("define");
        let key = c.compose_node_key(&node);

        let err = c.set_attributes(
            &key,
            vec![
                AttributeValue::new("tags", "valid"),
                AttributeValue::new("tags", "not valid"),
            ],
        );
        assert!(matches!(err, Err(CatalogError::SchemaViolation(_))));
        assert!(c.get_attributes(&key).expect("get").is_empty());
    }

    #[test]
    fn set_attributes_replaces_per_name_last_wins_for_single_valued() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "", "")
            .expect("create");
        c.define_attribute("bookmarks", "tags", AttributeKind::Tag, "")
            .expect("define");
        c.define_attribute("bookmarks", "priority", AttributeKind::Number, "")
            .expect("define");
        let key = c.compose_node_key(&node);

        c.set_attributes(
            &key,
            vec![
                AttributeValue::new("tags", "rust"),
                AttributeValue::new("tags", "db"),
                AttributeValue::new("priority", "1"),
                AttributeValue::new("priority", "5"),
            ],
        )
        .expect("set");

        let values = c.get_attributes(&key).expect("get");
        let priorities: Vec<_> = values
            .iter()
            .filter(|v| v.name == "priority")
            .map(|v| v.value.as_str())
            .collect();
        assert_eq!(priorities, vec!["5"]);
        assert_eq!(values.iter().filter(|v| v.name == "tags").count(), 2);

        // Replacing tags leaves priority untouched.
        c.set_attributes(&key, vec![AttributeValue::new("tags", "new")])
            .expect("set");
        let values = c.get_attributes(&key).expect("get");
        assert_eq!(values.iter().filter(|v| v.name == "tags").count(), 1);
        assert_eq!(values.iter().filter(|v| v.name == "priority").count(), 1);
    }

    #[test]
    fn attribute_changed_events_one_per_name() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "", "")
            .expect("create");
        c.define_attribute("bookmarks", "tags", AttributeKind::Tag, "")
            .expect("define");
        c.define_attribute("bookmarks", "priority", AttributeKind::Number, "")
            .expect("define");
        let key = c.compose_node_key(&node);

        c.set_attributes(
            &key,
            vec![
                AttributeValue::new("tags", "a"),
                AttributeValue::new("tags", "b"),
                AttributeValue::new("priority", "1"),
            ],
        )
        .expect("set");

        let attr_events: Vec<_> = c
            .node_events(&key)
            .expect("events")
            .into_iter()
            .filter(|e| e.event_type == EventType::AttributeChanged)
            .collect();
        assert_eq!(attr_events.len(), 2);
        let names: Vec<_> = attr_events
            .iter()
            .filter_map(|e| e.attribute.as_deref())
            .collect();
        assert_eq!(names, vec!["priority", "tags"]);
    }

    #[test]
    fn cascade_delete_removes_closure_with_events() {
        let mut c = catalog();
        let a = c.create_node("d", "https://a.example", "", "").expect("a");
        let b = c.create_node("d", "https://b.example", "", "").expect("b");
        let x = c.create_node("d", "https://x.example", "", "").expect("x");
        let (ka, kb, kx) = (
            c.compose_node_key(&a),
            c.compose_node_key(&b),
            c.compose_node_key(&x),
        );

        c.create_dependency(&ka, &kb, DependencyKind::Hard, true, false, "", BTreeMap::new())
            .expect("edge");
        c.create_dependency(&ka, &kx, DependencyKind::Soft, false, false, "", BTreeMap::new())
            .expect("edge");

        let deleted = c.delete_node(&ka).expect("delete");
        assert_eq!(deleted.len(), 2);
        assert!(matches!(c.get_node(&ka), Err(CatalogError::NodeNotFound(_))));
        assert!(matches!(c.get_node(&kb), Err(CatalogError::NodeNotFound(_))));
        assert!(c.get_node(&kx).is_ok());

        // The surviving node carries no dangling edges.
        assert!(c.list_dependents(&kx).expect("deps").is_empty());

        // Both victims got their own deletion event.
        let b_events = c.node_events(&kb).expect("events");
        assert!(b_events
            .iter()
            .any(|e| e.event_type == EventType::NodeDeleted));
    }

    #[test]
    fn deleted_node_history_stays_queryable() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "", "")
            .expect("create");
        let key = c.compose_node_key(&node);
        c.delete_node(&key).expect("delete");

        let events = c.node_events(&key).expect("events");
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::NodeCreated, EventType::NodeDeleted]);
    }

    #[test]
    fn local_ids_not_reused_after_cascade() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "", "")
            .expect("create");
        c.delete_node(&c.compose_node_key(&node)).expect("delete");

        let next = c
            .create_node("bookmarks", "https://b.example", "", "")
            .expect("create");
        assert_eq!(next.local_id, 2);
    }

    #[test]
    fn duplicate_edge_triple_rejected() {
        let mut c = catalog();
        let a = c.create_node("d", "https://a.example", "", "").expect("a");
        let b = c.create_node("d", "https://b.example", "", "").expect("b");
        let (ka, kb) = (c.compose_node_key(&a), c.compose_node_key(&b));

        c.create_dependency(&ka, &kb, DependencyKind::Hard, false, false, "", BTreeMap::new())
            .expect("edge");
        assert!(matches!(
            c.create_dependency(&ka, &kb, DependencyKind::Hard, true, false, "", BTreeMap::new()),
            Err(CatalogError::DuplicateEdge)
        ));
        // A different kind between the same pair is fine.
        assert!(c
            .create_dependency(&ka, &kb, DependencyKind::Reference, false, false, "", BTreeMap::new())
            .is_ok());
    }

    #[test]
    fn delete_attribute_strips_values_without_events() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "", "")
            .expect("create");
        let def = c
            .define_attribute("bookmarks", "tags", AttributeKind::Tag, "")
            .expect("define");
        let node_key = c.compose_node_key(&node);
        let attr_key = c.compose_attribute_key(&def);
        assert_eq!(attr_key, "urldex:bookmarks:attr-1");

        c.set_attributes(&node_key, vec![AttributeValue::new("tags", "rust")])
            .expect("set");
        let events_before = c.node_events(&node_key).expect("events").len();

        c.delete_attribute(&attr_key).expect("delete");
        assert!(c.get_attributes(&node_key).expect("get").is_empty());
        assert!(matches!(
            c.get_attribute(&attr_key),
            Err(CatalogError::AttributeNotFound(_))
        ));
        assert_eq!(c.node_events(&node_key).expect("events").len(), events_before);

        // Values of the deleted attribute no longer validate.
        assert!(matches!(
            c.set_attributes(&node_key, vec![AttributeValue::new("tags", "x")]),
            Err(CatalogError::SchemaViolation(_))
        ));
    }

    #[test]
    fn process_event_is_idempotent() {
        let mut c = catalog();
        c.create_node("bookmarks", "https://a.example", "", "")
            .expect("create");

        let pending = c.pending_events(10);
        assert_eq!(pending.len(), 1);
        let id = pending[0].id.0;

        let processed = c.process_event(id).expect("process");
        assert_eq!(processed.status, EventStatus::Processed);
        let again = c.process_event(id).expect("process again");
        assert_eq!(again.status, EventStatus::Processed);
        assert!(c.pending_events(10).is_empty());

        assert!(matches!(
            c.process_event(999),
            Err(CatalogError::EventNotFound(999))
        ));
    }

    #[test]
    fn subscription_requires_live_node_then_survives_deletion() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "", "")
            .expect("create");
        let key = c.compose_node_key(&node);

        assert!(matches!(
            c.create_subscription("urldex:bookmarks:99", "svc", None, [EventType::NodeDeleted].into()),
            Err(CatalogError::NodeNotFound(_))
        ));
        assert!(matches!(
            c.create_subscription(&key, "svc", None, BTreeSet::new()),
            Err(CatalogError::InvalidFilter(_))
        ));

        let sub = c
            .create_subscription(&key, "svc", None, [EventType::NodeDeleted].into())
            .expect("subscribe");
        c.delete_node(&key).expect("delete");

        let still = c.node_subscriptions(&key).expect("subs");
        assert_eq!(still.len(), 1);
        assert_eq!(still[0].id, sub.id);
    }

    #[test]
    fn stats_track_all_tables() {
        let mut c = catalog();
        let node = c
            .create_node("bookmarks", "https://a.example", "", "")
            .expect("create");
        c.define_attribute("bookmarks", "tags", AttributeKind::Tag, "")
            .expect("define");
        let key = c.compose_node_key(&node);
        c.create_subscription(&key, "svc", None, [EventType::NodeUpdated].into())
            .expect("subscribe");

        let stats = c.stats();
        assert_eq!(stats.domains, 1);
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.attribute_defs, 1);
        assert_eq!(stats.subscriptions, 1);
        assert_eq!(stats.events.total, 1);
    }

    #[test]
    fn invalid_inputs_rejected_up_front() {
        let mut c = catalog();
        assert!(matches!(
            c.create_node("bad name!", "https://a.example", "", ""),
            Err(CatalogError::Validation { field: "domain_name", .. })
        ));
        assert!(matches!(
            c.create_node("d", "ftp://a.example", "", ""),
            Err(CatalogError::Validation { field: "url", .. })
        ));
        assert!(matches!(
            c.create_domain("d", &"x".repeat(MAX_DESCRIPTION_LENGTH + 1)),
            Err(CatalogError::Validation { field: "description", .. })
        ));
    }
}
