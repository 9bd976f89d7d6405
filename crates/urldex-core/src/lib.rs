//! # urldex-core
//!
//! The deterministic catalog engine for urldex - THE LOGIC.
//!
//! This crate implements the catalog substrate: a domain-partitioned store
//! of URL nodes with schema-validated attributes, typed dependency edges
//! with cascade deletion, an append-only event log, and per-node
//! subscriptions, all addressed by stable composite keys.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is the ONLY place where catalog state exists (stateful)
//! - Is closed: the `Catalog` facade is the only mutation surface
//! - Is deterministic: `BTreeMap` tables only, no randomness, an
//!   injectable clock
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod events;
pub mod formats;
pub mod graph;
pub mod key;
pub mod mutation;
pub mod primitives;
pub mod query;
pub mod schema;
pub mod storage;
pub mod store;
pub mod subscriptions;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AttributeDef, AttributeKind, AttributeValue, CatalogError, Dependency, DependencyKind, Domain,
    Event, EventId, EventStatus, EventType, Node, NodeRef, NodeSnapshot, Subscription,
    SubscriptionId, Timestamp,
};

// =============================================================================
// RE-EXPORTS: Catalog Engine
// =============================================================================

pub use catalog::{Catalog, CatalogStats, UpdateNodeRequest};
pub use events::{EventLog, EventStats};
pub use graph::DependencyGraph;
pub use key::{CompositeKey, KeyKind};
pub use mutation::{ChangeSet, Mutation};
pub use query::{AttributeFilter, FilterOp, FilteredPage};
pub use schema::SchemaRegistry;
pub use storage::RedbCatalog;
pub use store::{NodePage, NodeStore, PageRequest};
pub use subscriptions::SubscriptionRegistry;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{catalog_from_bytes, catalog_to_bytes};
