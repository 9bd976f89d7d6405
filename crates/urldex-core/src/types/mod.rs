//! # Core Type Definitions
//!
//! This module contains all record and identifier types for the urldex
//! catalog engine:
//! - Identifiers (`NodeRef`, `EventId`, `SubscriptionId`, `Timestamp`)
//! - Catalog records (`Domain`, `AttributeDef`, `Node`, `AttributeValue`)
//! - Graph records (`DependencyKind`, `Dependency`)
//! - Event records (`EventType`, `EventStatus`, `Event`, `NodeSnapshot`)
//! - Subscription records (`Subscription`)
//! - Error types (`CatalogError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module implement `Ord` where they serve as map keys,
//! so every table in the engine iterates in a stable order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unix-millisecond timestamp.
///
/// The core stays clock-library-free; the catalog facade injects the clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Get the raw millisecond value.
    #[must_use]
    pub const fn millis(self) -> i64 {
        self.0
    }
}

/// Internal address of a node: the owning domain plus the domain-scoped id.
///
/// External callers only ever see the composite-key string form; the raw
/// pair never crosses the tool boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    /// Name of the owning domain.
    pub domain: String,
    /// Domain-scoped monotonically increasing id, starting at 1.
    pub local_id: u64,
}

impl NodeRef {
    /// Create a new node reference.
    #[must_use]
    pub fn new(domain: impl Into<String>, local_id: u64) -> Self {
        Self {
            domain: domain.into(),
            local_id,
        }
    }
}

/// Globally monotonic event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

/// Subscription identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

// =============================================================================
// DOMAIN
// =============================================================================

/// A named partition owning its own node id-space and attribute schema.
///
/// The name is immutable once chosen; composite keys embed it, so renaming
/// would invalidate every issued key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// =============================================================================
// ATTRIBUTE SCHEMA
// =============================================================================

/// The closed set of attribute value kinds.
///
/// Validation is a fixed capability set: adding a kind requires explicit
/// validator logic, so this is a tagged variant rather than open typing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Tag,
    OrderedTag,
    Number,
    String,
    Markdown,
    Image,
}

impl AttributeKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Tag,
        Self::OrderedTag,
        Self::Number,
        Self::String,
        Self::Markdown,
        Self::Image,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::OrderedTag => "ordered_tag",
            Self::Number => "number",
            Self::String => "string",
            Self::Markdown => "markdown",
            Self::Image => "image",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Multi-valued kinds may hold several values per node; single-valued
    /// kinds replace on write.
    #[must_use]
    pub const fn is_multi_valued(self) -> bool {
        matches!(self, Self::Tag | Self::OrderedTag)
    }

    /// Ordered tags carry an explicit sort index; no other kind does.
    #[must_use]
    pub const fn requires_order_index(self) -> bool {
        matches!(self, Self::OrderedTag)
    }
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-domain attribute definition: the validation contract for node
/// attribute values in that domain.
///
/// `id` is a global counter used only to form the attribute composite key
/// (`namespace:domain:attr-<id>`); the `(domain, name)` pair is the unique
/// logical identity. The kind is immutable post-creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub id: u64,
    pub domain: String,
    pub name: String,
    pub kind: AttributeKind,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// =============================================================================
// NODE
// =============================================================================

/// A cataloged URL within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub domain: String,
    pub local_id: u64,
    pub url: String,
    pub title: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Node {
    /// Internal address of this node.
    #[must_use]
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(&self.domain, self.local_id)
    }

    /// Capture the mutable fields for an event record.
    #[must_use]
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            url: self.url.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }
}

/// One schema-validated attribute value on a node.
///
/// `order_index` is meaningful only for `ordered_tag` values; on other
/// kinds it must be absent or zero.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeValue {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub order_index: Option<u32>,
}

impl AttributeValue {
    /// Create a plain (unordered) attribute value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            order_index: None,
        }
    }

    /// Create an ordered attribute value.
    #[must_use]
    pub fn ordered(name: impl Into<String>, value: impl Into<String>, order_index: u32) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            order_index: Some(order_index),
        }
    }
}

// =============================================================================
// DEPENDENCIES
// =============================================================================

/// Kind of a directed dependency edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Hard,
    Soft,
    Reference,
}

impl DependencyKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Soft => "soft",
            Self::Reference => "reference",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hard" => Some(Self::Hard),
            "soft" => Some(Self::Soft),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, directed dependency edge between two nodes.
///
/// At most one edge per `(source, target, kind)` triple; multiple kinds
/// between the same pair are allowed. `cascade_update` is advisory
/// metadata: the engine stores it but never propagates updates itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub source: NodeRef,
    pub target: NodeRef,
    pub kind: DependencyKind,
    pub cascade_delete: bool,
    pub cascade_update: bool,
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: Timestamp,
}

// =============================================================================
// EVENTS
// =============================================================================

/// The closed set of node event types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EventType {
    #[serde(rename = "node.created")]
    NodeCreated,
    #[serde(rename = "node.updated")]
    NodeUpdated,
    #[serde(rename = "node.deleted")]
    NodeDeleted,
    #[serde(rename = "attribute_changed")]
    AttributeChanged,
}

impl EventType {
    /// All event types, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::NodeCreated,
        Self::NodeUpdated,
        Self::NodeDeleted,
        Self::AttributeChanged,
    ];

    /// Wire name of the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NodeCreated => "node.created",
            Self::NodeUpdated => "node.updated",
            Self::NodeDeleted => "node.deleted",
            Self::AttributeChanged => "attribute_changed",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of an event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Processed,
}

/// Snapshot of a node's mutable fields, captured around a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub url: String,
    pub title: String,
    pub description: String,
}

/// One entry of the append-only mutation log.
///
/// Immutable once written; only `status` transitions (pending → processed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub node: NodeRef,
    pub event_type: EventType,
    /// Set for `attribute_changed` events: the attribute name touched.
    #[serde(default)]
    pub attribute: Option<String>,
    pub before: Option<NodeSnapshot>,
    pub after: Option<NodeSnapshot>,
    pub status: EventStatus,
    pub created_at: Timestamp,
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// A registered interest in a node's events.
///
/// Lifecycle is independent of the node: subscriptions on deleted nodes
/// are retained but can never match a new event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub node: NodeRef,
    pub subscriber_service: String,
    #[serde(default)]
    pub subscriber_endpoint: Option<String>,
    pub event_types: BTreeSet<EventType>,
    pub created_at: Timestamp,
}

impl Subscription {
    /// Whether this subscription matches the given event: same node AND
    /// the event type is in the subscribed set.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.node == event.node && self.event_types.contains(&event.event_type)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by the catalog engine.
///
/// All are local, recoverable conditions returned to the caller as
/// structured results; the engine never panics.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The named domain does not exist.
    #[error("domain not found: {0}")]
    DomainNotFound(String),

    /// The addressed node does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// The addressed attribute definition does not exist.
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),

    /// No dependency edge exists for the given triple.
    #[error("dependency not found")]
    DependencyNotFound,

    /// No event with the given id.
    #[error("event not found: {0}")]
    EventNotFound(u64),

    /// No subscription with the given id.
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(u64),

    /// A domain with this name already exists.
    #[error("domain already exists: {0}")]
    DuplicateDomain(String),

    /// The URL is already cataloged in this domain.
    #[error("url already exists in domain {domain}: {url}")]
    DuplicateUrl { domain: String, url: String },

    /// An attribute with this name already exists in the domain.
    #[error("attribute already exists: {domain}.{name}")]
    DuplicateAttribute { domain: String, name: String },

    /// An edge of this kind already exists in this direction.
    #[error("dependency edge already exists")]
    DuplicateEdge,

    /// An attribute value failed schema validation; nothing was written.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A filter or subscription filter is malformed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A composite key string could not be parsed.
    #[error("invalid composite key: {0}")]
    InvalidKey(String),

    /// A field failed basic validation (length, charset, range).
    #[error("validation failed for {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    /// Stable machine-readable code for the tool-surface error envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DomainNotFound(_)
            | Self::NodeNotFound(_)
            | Self::AttributeNotFound(_)
            | Self::DependencyNotFound
            | Self::EventNotFound(_)
            | Self::SubscriptionNotFound(_) => "NOT_FOUND",
            Self::DuplicateDomain(_) => "DUPLICATE_DOMAIN",
            Self::DuplicateUrl { .. } => "DUPLICATE_URL",
            Self::DuplicateAttribute { .. } => "DUPLICATE_ATTRIBUTE",
            Self::DuplicateEdge => "DUPLICATE_EDGE",
            Self::SchemaViolation(_) => "SCHEMA_VIOLATION",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::InvalidKey(_) => "INVALID_KEY",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
