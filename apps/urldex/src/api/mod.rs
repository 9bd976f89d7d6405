//! # urldex HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET  /health` - Health check
//! - `GET  /info` - Server identity and table counters
//! - `GET  /domains` / `POST /domains` - Domain listing and creation
//! - `GET  /domains/{domain}/nodes` / `POST /domains/{domain}/nodes` - Node listing and creation
//! - `GET  /domains/{domain}/nodes/find?url=` - URL lookup
//! - `GET  /domains/{domain}/attributes` / `POST /domains/{domain}/attributes` - Schema
//! - `POST /domains/{domain}/filter` - Attribute filter query
//! - `GET|PUT|DELETE /nodes/{key}` - Node by composite key
//! - `GET|PUT /nodes/{key}/attributes` - Node attribute values
//! - `GET  /nodes/{key}/dependencies` / `GET /nodes/{key}/dependents` - Graph views
//! - `GET  /nodes/{key}/events` / `GET /nodes/{key}/subscriptions` - Per-node views
//! - `GET|PUT|DELETE /attributes/{key}` - Attribute definition by composite key
//! - `POST|DELETE /dependencies` - Edge creation and removal
//! - `GET  /events/pending?limit=` / `POST /events/{id}/process` - Event pipeline
//! - `GET|POST /subscriptions` / `DELETE /subscriptions/{id}` - Subscriptions
//! - `POST /export` - Whole-catalog snapshot
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `URLDEX_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `URLDEX_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

mod handlers;
mod throttle;
mod types;

// Re-exports for external use
pub use throttle::{build_throttle, throttle_from_env};
// Re-export handlers and types for integration tests (via `urldex::api::*`)
#[allow(unused_imports)]
pub use types::{
    AttributeDefJson, AttributeValueJson, AttributesResponse, CreateDependencyRequest,
    CreateDomainRequest, CreateNodeRequest, CreateSubscriptionRequest, DefineAttributeRequest,
    DeleteDependencyRequest, DeleteNodeResponse, DependencyJson, DomainJson, ErrorResponse,
    EventJson, ExportResponse, FilterJson, FilterRequest, HealthResponse, InfoResponse, NodeJson,
    NodePageJson, SetAttributesRequest, SubscriptionJson, UpdateAttributeRequest, UpdateNodeJson,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use urldex_core::{Catalog, CatalogError};

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the catalog.
#[derive(Clone)]
pub struct AppState {
    /// The catalog engine. Writers are exclusive, so local-id assignment
    /// and cascade closure are atomic across requests.
    pub catalog: Arc<RwLock<Catalog>>,
}

impl AppState {
    /// Create new app state with a catalog.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `URLDEX_CORS_ORIGINS`:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("URLDEX_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (URLDEX_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in URLDEX_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No URLDEX_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - caps request payloads
/// 4. Rate Limiting - protects against overload (if enabled)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let throttle = throttle_from_env();
    match throttle {
        Some(_) => tracing::info!("request throttling enabled"),
        None => tracing::info!("request throttling disabled"),
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/info", get(handlers::info_handler))
        .route(
            "/domains",
            get(handlers::list_domains_handler).post(handlers::create_domain_handler),
        )
        .route(
            "/domains/{domain}/nodes",
            get(handlers::list_nodes_handler).post(handlers::create_node_handler),
        )
        .route("/domains/{domain}/nodes/find", get(handlers::find_node_handler))
        .route(
            "/domains/{domain}/attributes",
            get(handlers::list_attributes_handler).post(handlers::define_attribute_handler),
        )
        .route("/domains/{domain}/filter", post(handlers::filter_nodes_handler))
        .route(
            "/nodes/{key}",
            get(handlers::get_node_handler)
                .put(handlers::update_node_handler)
                .delete(handlers::delete_node_handler),
        )
        .route(
            "/nodes/{key}/attributes",
            get(handlers::get_node_attributes_handler).put(handlers::set_node_attributes_handler),
        )
        .route(
            "/nodes/{key}/dependencies",
            get(handlers::list_dependencies_handler),
        )
        .route("/nodes/{key}/dependents", get(handlers::list_dependents_handler))
        .route("/nodes/{key}/events", get(handlers::node_events_handler))
        .route(
            "/nodes/{key}/subscriptions",
            get(handlers::node_subscriptions_handler),
        )
        .route(
            "/attributes/{key}",
            get(handlers::get_attribute_handler)
                .put(handlers::update_attribute_handler)
                .delete(handlers::delete_attribute_handler),
        )
        .route(
            "/dependencies",
            post(handlers::create_dependency_handler)
                .delete(handlers::delete_dependency_handler),
        )
        .route("/events/pending", get(handlers::pending_events_handler))
        .route("/events/{id}/process", post(handlers::process_event_handler))
        .route(
            "/subscriptions",
            get(handlers::list_subscriptions_handler)
                .post(handlers::create_subscription_handler),
        )
        .route(
            "/subscriptions/{id}",
            delete(handlers::delete_subscription_handler),
        )
        .route("/export", post(handlers::export_handler));

    // Apply rate limiting middleware
    if let Some(throttle) = throttle {
        router = router.layer(axum_middleware::from_fn_with_state(
            throttle,
            throttle::throttle_middleware,
        ));
    }

    // Apply CORS, body limit, and tracing (outermost layers)
    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, catalog: Catalog) -> Result<(), CatalogError> {
    let state = AppState::new(catalog);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CatalogError::Storage(format!("Bind failed: {e}")))?;

    tracing::info!("urldex HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| CatalogError::Storage(format!("Server error: {e}")))
}
