//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Every entity response carries the
//! composite key the catalog issued for it; internal `(domain, local_id)`
//! pairs never appear on the wire.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use urldex_core::{
    AttributeDef, AttributeValue, Catalog, CatalogError, Dependency, Domain, Event, Node,
    Subscription,
};

// =============================================================================
// ERROR ENVELOPE
// =============================================================================

/// Structured error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn from_error(e: &CatalogError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

// =============================================================================
// HEALTH & INFO
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Server info response: identity plus table counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub namespace: String,
    pub domains: usize,
    pub nodes: usize,
    pub attributes: usize,
    pub dependencies: usize,
    pub subscriptions: usize,
    pub events_total: usize,
    pub events_pending: usize,
    pub events_processed: usize,
}

// =============================================================================
// DOMAINS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDomainRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainJson {
    pub name: String,
    pub description: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Domain> for DomainJson {
    fn from(d: Domain) -> Self {
        Self {
            name: d.name,
            description: d.description,
            created_at: d.created_at.millis(),
            updated_at: d.updated_at.millis(),
        }
    }
}

// =============================================================================
// NODES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateNodeJson {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeJson {
    pub key: String,
    pub domain: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NodeJson {
    #[must_use]
    pub fn from_node(catalog: &Catalog, node: Node) -> Self {
        Self {
            key: catalog.compose_node_key(&node),
            domain: node.domain,
            url: node.url,
            title: node.title,
            description: node.description,
            created_at: node.created_at.millis(),
            updated_at: node.updated_at.millis(),
        }
    }
}

/// One page of nodes plus pagination totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePageJson {
    pub nodes: Vec<NodeJson>,
    pub total_count: usize,
    pub total_pages: usize,
    pub page: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNodeResponse {
    /// Composite keys of every node removed, cascade targets included.
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListNodesQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindByUrlQuery {
    pub url: String,
}

// =============================================================================
// ATTRIBUTE SCHEMA
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefineAttributeRequest {
    pub name: String,
    /// One of: tag, ordered_tag, number, string, markdown, image.
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAttributeRequest {
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefJson {
    pub key: String,
    pub domain: String,
    pub name: String,
    pub kind: String,
    pub description: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AttributeDefJson {
    #[must_use]
    pub fn from_def(catalog: &Catalog, def: AttributeDef) -> Self {
        Self {
            key: catalog.compose_attribute_key(&def),
            domain: def.domain,
            name: def.name,
            kind: def.kind.as_str().to_string(),
            description: def.description,
            created_at: def.created_at.millis(),
            updated_at: def.updated_at.millis(),
        }
    }
}

// =============================================================================
// NODE ATTRIBUTE VALUES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeValueJson {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order_index: Option<u32>,
}

impl From<AttributeValue> for AttributeValueJson {
    fn from(v: AttributeValue) -> Self {
        Self {
            name: v.name,
            value: v.value,
            order_index: v.order_index,
        }
    }
}

impl From<AttributeValueJson> for AttributeValue {
    fn from(v: AttributeValueJson) -> Self {
        Self {
            name: v.name,
            value: v.value,
            order_index: v.order_index,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAttributesRequest {
    pub attributes: Vec<AttributeValueJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributesResponse {
    pub attributes: Vec<AttributeValueJson>,
}

// =============================================================================
// DEPENDENCIES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDependencyRequest {
    pub source: String,
    pub target: String,
    /// One of: hard, soft, reference.
    pub kind: String,
    #[serde(default)]
    pub cascade_delete: bool,
    #[serde(default)]
    pub cascade_update: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDependencyRequest {
    pub source: String,
    pub target: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyJson {
    pub source: String,
    pub target: String,
    pub kind: String,
    pub cascade_delete: bool,
    pub cascade_update: bool,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
    pub created_at: i64,
}

impl DependencyJson {
    #[must_use]
    pub fn from_edge(namespace: &str, edge: Dependency) -> Self {
        Self {
            source: format!("{namespace}:{}:{}", edge.source.domain, edge.source.local_id),
            target: format!("{namespace}:{}:{}", edge.target.domain, edge.target.local_id),
            kind: edge.kind.as_str().to_string(),
            cascade_delete: edge.cascade_delete,
            cascade_update: edge.cascade_update,
            description: edge.description,
            metadata: edge.metadata,
            created_at: edge.created_at.millis(),
        }
    }
}

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventJson {
    pub id: u64,
    pub node: String,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attribute: Option<String>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub status: String,
    pub created_at: i64,
}

impl EventJson {
    #[must_use]
    pub fn from_event(namespace: &str, event: Event) -> Self {
        let snapshot = |s: urldex_core::NodeSnapshot| {
            serde_json::json!({
                "url": s.url,
                "title": s.title,
                "description": s.description,
            })
        };
        Self {
            id: event.id.0,
            node: format!("{namespace}:{}:{}", event.node.domain, event.node.local_id),
            event_type: event.event_type.as_str().to_string(),
            attribute: event.attribute,
            before: event.before.map(snapshot),
            after: event.after.map(snapshot),
            status: match event.status {
                urldex_core::EventStatus::Pending => "pending".to_string(),
                urldex_core::EventStatus::Processed => "processed".to_string(),
            },
            created_at: event.created_at.millis(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PendingEventsQuery {
    pub limit: Option<usize>,
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub node: String,
    pub subscriber_service: String,
    #[serde(default)]
    pub subscriber_endpoint: Option<String>,
    pub event_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionJson {
    pub id: u64,
    pub node: String,
    pub subscriber_service: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub subscriber_endpoint: Option<String>,
    pub event_types: Vec<String>,
    pub created_at: i64,
}

impl SubscriptionJson {
    #[must_use]
    pub fn from_subscription(namespace: &str, sub: Subscription) -> Self {
        Self {
            id: sub.id.0,
            node: format!("{namespace}:{}:{}", sub.node.domain, sub.node.local_id),
            subscriber_service: sub.subscriber_service,
            subscriber_endpoint: sub.subscriber_endpoint,
            event_types: sub
                .event_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            created_at: sub.created_at.millis(),
        }
    }
}

// =============================================================================
// FILTER QUERIES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRequest {
    pub filters: Vec<FilterJson>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterJson {
    pub name: String,
    pub value: String,
    /// "equals" (default) or "contains".
    #[serde(default)]
    pub op: String,
}

// =============================================================================
// EXPORT
// =============================================================================

/// Whole-catalog snapshot, base64-encoded for JSON transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub format_version: u8,
    pub size_bytes: usize,
    pub data_base64: String,
}
