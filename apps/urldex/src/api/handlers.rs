//! # API Endpoint Handlers
//!
//! The HTTP endpoint handlers. Reads take the shared read lock; every
//! mutation takes the write lock, so id assignment and cascade closure
//! are atomic with respect to concurrent requests.

use super::{
    AppState,
    types::{
        AttributeDefJson, AttributesResponse, CreateDependencyRequest, CreateDomainRequest,
        CreateNodeRequest, CreateSubscriptionRequest, DefineAttributeRequest,
        DeleteDependencyRequest, DeleteNodeResponse, DependencyJson, DomainJson, ErrorResponse,
        EventJson, ExportResponse, FilterRequest, FindByUrlQuery, HealthResponse, InfoResponse,
        ListNodesQuery, NodeJson, NodePageJson, PendingEventsQuery, SetAttributesRequest,
        SubscriptionJson, UpdateAttributeRequest, UpdateNodeJson,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use urldex_core::{
    AttributeFilter, AttributeKind, CatalogError, DependencyKind, EventType, FilterOp, NodePage,
    UpdateNodeRequest, catalog_to_bytes, primitives::FORMAT_VERSION,
};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Map a catalog error onto an HTTP status plus the structured envelope.
fn error_response(e: &CatalogError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        CatalogError::DomainNotFound(_)
        | CatalogError::NodeNotFound(_)
        | CatalogError::AttributeNotFound(_)
        | CatalogError::DependencyNotFound
        | CatalogError::EventNotFound(_)
        | CatalogError::SubscriptionNotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::DuplicateDomain(_)
        | CatalogError::DuplicateUrl { .. }
        | CatalogError::DuplicateAttribute { .. }
        | CatalogError::DuplicateEdge => StatusCode::CONFLICT,
        CatalogError::SchemaViolation(_)
        | CatalogError::InvalidFilter(_)
        | CatalogError::InvalidKey(_)
        | CatalogError::Validation { .. }
        | CatalogError::Serialization(_) => StatusCode::BAD_REQUEST,
        CatalogError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::from_error(e)))
}

fn parse_attribute_kind(kind: &str) -> Result<AttributeKind, CatalogError> {
    AttributeKind::parse(kind).ok_or_else(|| CatalogError::Validation {
        field: "kind",
        message: format!("unknown attribute kind: {kind}"),
    })
}

fn parse_dependency_kind(kind: &str) -> Result<DependencyKind, CatalogError> {
    DependencyKind::parse(kind).ok_or_else(|| CatalogError::Validation {
        field: "kind",
        message: format!("unknown dependency kind: {kind}"),
    })
}

fn parse_filter_op(op: &str) -> Result<FilterOp, CatalogError> {
    FilterOp::parse(op).ok_or_else(|| {
        CatalogError::InvalidFilter(format!("unknown filter operator: {op}"))
    })
}

fn node_page_json(catalog: &urldex_core::Catalog, page: NodePage) -> NodePageJson {
    NodePageJson {
        nodes: page
            .nodes
            .into_iter()
            .map(|n| NodeJson::from_node(catalog, n))
            .collect(),
        total_count: page.total_count,
        total_pages: page.total_pages,
        page: page.page,
        size: page.size,
    }
}

// =============================================================================
// HEALTH & INFO
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Server identity and table counters.
pub async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    let stats = catalog.stats();
    Json(InfoResponse {
        name: "urldex".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        namespace: catalog.namespace().to_string(),
        domains: stats.domains,
        nodes: stats.nodes,
        attributes: stats.attribute_defs,
        dependencies: stats.dependencies,
        subscriptions: stats.subscriptions,
        events_total: stats.events.total,
        events_pending: stats.events.pending,
        events_processed: stats.events.processed,
    })
}

// =============================================================================
// DOMAIN HANDLERS
// =============================================================================

pub async fn list_domains_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    let domains: Vec<DomainJson> = catalog
        .list_domains()
        .into_iter()
        .map(DomainJson::from)
        .collect();
    Json(domains)
}

pub async fn create_domain_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateDomainRequest>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    match catalog.create_domain(&request.name, &request.description) {
        Ok(domain) => (StatusCode::CREATED, Json(DomainJson::from(domain))).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// NODE HANDLERS
// =============================================================================

pub async fn list_nodes_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<ListNodesQuery>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.list_nodes(&domain, query.search.as_deref(), query.page, query.size) {
        Ok(page) => Json(node_page_json(&catalog, page)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn create_node_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(request): Json<CreateNodeRequest>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    match catalog.create_node(&domain, &request.url, &request.title, &request.description) {
        Ok(node) => {
            let body = NodeJson::from_node(&catalog, node);
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn find_node_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<FindByUrlQuery>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.find_node_by_url(&domain, &query.url) {
        Ok(node) => Json(NodeJson::from_node(&catalog, node)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn get_node_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.get_node(&key) {
        Ok(node) => Json(NodeJson::from_node(&catalog, node)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn update_node_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<UpdateNodeJson>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    let update = UpdateNodeRequest {
        url: request.url,
        title: request.title,
        description: request.description,
    };
    match catalog.update_node(&key, update) {
        Ok(node) => Json(NodeJson::from_node(&catalog, node)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn delete_node_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    match catalog.delete_node(&key) {
        Ok(victims) => {
            let namespace = catalog.namespace();
            let deleted = victims
                .into_iter()
                .map(|v| format!("{namespace}:{}:{}", v.domain, v.local_id))
                .collect();
            Json(DeleteNodeResponse { deleted }).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// ATTRIBUTE SCHEMA HANDLERS
// =============================================================================

pub async fn list_attributes_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.list_attributes(&domain) {
        Ok(defs) => {
            let body: Vec<AttributeDefJson> = defs
                .into_iter()
                .map(|d| AttributeDefJson::from_def(&catalog, d))
                .collect();
            Json(body).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn define_attribute_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(request): Json<DefineAttributeRequest>,
) -> impl IntoResponse {
    let kind = match parse_attribute_kind(&request.kind) {
        Ok(kind) => kind,
        Err(e) => return error_response(&e).into_response(),
    };
    let mut catalog = state.catalog.write().await;
    match catalog.define_attribute(&domain, &request.name, kind, &request.description) {
        Ok(def) => {
            let body = AttributeDefJson::from_def(&catalog, def);
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn get_attribute_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.get_attribute(&key) {
        Ok(def) => Json(AttributeDefJson::from_def(&catalog, def)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn update_attribute_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<UpdateAttributeRequest>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    match catalog.update_attribute(&key, &request.description) {
        Ok(def) => Json(AttributeDefJson::from_def(&catalog, def)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn delete_attribute_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    match catalog.delete_attribute(&key) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// NODE ATTRIBUTE VALUE HANDLERS
// =============================================================================

pub async fn get_node_attributes_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.get_attributes(&key) {
        Ok(values) => Json(AttributesResponse {
            attributes: values.into_iter().map(Into::into).collect(),
        })
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn set_node_attributes_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<SetAttributesRequest>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    let entries = request.attributes.into_iter().map(Into::into).collect();
    match catalog.set_attributes(&key, entries) {
        Ok(values) => Json(AttributesResponse {
            attributes: values.into_iter().map(Into::into).collect(),
        })
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// DEPENDENCY HANDLERS
// =============================================================================

pub async fn create_dependency_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateDependencyRequest>,
) -> impl IntoResponse {
    let kind = match parse_dependency_kind(&request.kind) {
        Ok(kind) => kind,
        Err(e) => return error_response(&e).into_response(),
    };
    let mut catalog = state.catalog.write().await;
    match catalog.create_dependency(
        &request.source,
        &request.target,
        kind,
        request.cascade_delete,
        request.cascade_update,
        &request.description,
        request.metadata,
    ) {
        Ok(edge) => {
            let body = DependencyJson::from_edge(catalog.namespace(), edge);
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn delete_dependency_handler(
    State(state): State<AppState>,
    Json(request): Json<DeleteDependencyRequest>,
) -> impl IntoResponse {
    let kind = match parse_dependency_kind(&request.kind) {
        Ok(kind) => kind,
        Err(e) => return error_response(&e).into_response(),
    };
    let mut catalog = state.catalog.write().await;
    match catalog.delete_dependency(&request.source, &request.target, kind) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn list_dependencies_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.list_dependencies(&key) {
        Ok(edges) => {
            let namespace = catalog.namespace();
            let body: Vec<DependencyJson> = edges
                .into_iter()
                .map(|e| DependencyJson::from_edge(namespace, e))
                .collect();
            Json(body).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn list_dependents_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.list_dependents(&key) {
        Ok(edges) => {
            let namespace = catalog.namespace();
            let body: Vec<DependencyJson> = edges
                .into_iter()
                .map(|e| DependencyJson::from_edge(namespace, e))
                .collect();
            Json(body).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// EVENT HANDLERS
// =============================================================================

pub async fn node_events_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.node_events(&key) {
        Ok(events) => {
            let namespace = catalog.namespace();
            let body: Vec<EventJson> = events
                .into_iter()
                .map(|e| EventJson::from_event(namespace, e))
                .collect();
            Json(body).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn pending_events_handler(
    State(state): State<AppState>,
    Query(query): Query<PendingEventsQuery>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    let limit = query.limit.unwrap_or(100);
    let namespace = catalog.namespace();
    let body: Vec<EventJson> = catalog
        .pending_events(limit)
        .into_iter()
        .map(|e| EventJson::from_event(namespace, e))
        .collect();
    Json(body)
}

pub async fn process_event_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    match catalog.process_event(id) {
        Ok(event) => Json(EventJson::from_event(catalog.namespace(), event)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// SUBSCRIPTION HANDLERS
// =============================================================================

pub async fn create_subscription_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> impl IntoResponse {
    let mut event_types = std::collections::BTreeSet::new();
    for raw in &request.event_types {
        match EventType::parse(raw) {
            Some(t) => {
                event_types.insert(t);
            }
            None => {
                let e = CatalogError::InvalidFilter(format!("unknown event type: {raw}"));
                return error_response(&e).into_response();
            }
        }
    }

    let mut catalog = state.catalog.write().await;
    match catalog.create_subscription(
        &request.node,
        &request.subscriber_service,
        request.subscriber_endpoint,
        event_types,
    ) {
        Ok(sub) => {
            let body = SubscriptionJson::from_subscription(catalog.namespace(), sub);
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn list_subscriptions_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    let namespace = catalog.namespace();
    let body: Vec<SubscriptionJson> = catalog
        .list_subscriptions()
        .into_iter()
        .map(|s| SubscriptionJson::from_subscription(namespace, s))
        .collect();
    Json(body)
}

pub async fn node_subscriptions_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog.node_subscriptions(&key) {
        Ok(subs) => {
            let namespace = catalog.namespace();
            let body: Vec<SubscriptionJson> = subs
                .into_iter()
                .map(|s| SubscriptionJson::from_subscription(namespace, s))
                .collect();
            Json(body).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn delete_subscription_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    match catalog.delete_subscription(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// FILTER HANDLER
// =============================================================================

pub async fn filter_nodes_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(request): Json<FilterRequest>,
) -> impl IntoResponse {
    let mut filters = Vec::with_capacity(request.filters.len());
    for f in request.filters {
        let op = match parse_filter_op(&f.op) {
            Ok(op) => op,
            Err(e) => return error_response(&e).into_response(),
        };
        filters.push(AttributeFilter {
            name: f.name,
            value: f.value,
            op,
        });
    }

    let catalog = state.catalog.read().await;
    match catalog.filter_nodes(&domain, &filters, request.page, request.size) {
        Ok(page) => {
            let body = NodePageJson {
                nodes: page
                    .nodes
                    .into_iter()
                    .map(|n| NodeJson::from_node(&catalog, n))
                    .collect(),
                total_count: page.total_count,
                total_pages: page.total_pages,
                page: page.page,
                size: page.size,
            };
            Json(body).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export the whole catalog as a base64-encoded snapshot.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    match catalog_to_bytes(&catalog) {
        Ok(bytes) => Json(ExportResponse {
            format_version: FORMAT_VERSION,
            size_bytes: bytes.len(),
            data_base64: BASE64.encode(&bytes),
        })
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}
