//! # urldex MCP Server
//!
//! Implements `ServerHandler` with MCP tools that proxy to the urldex HTTP API.
//!
//! Every node and attribute is addressed by its composite key
//! (`urldex:domain:id` / `urldex:domain:attr-id`), exactly as the
//! HTTP API issues them.

use crate::client::UrldexClient;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Deserialize;

// =============================================================================
// MCP SERVER
// =============================================================================

/// MCP server that bridges to a urldex HTTP API.
#[derive(Clone)]
pub struct UrldexMcp {
    client: UrldexClient,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

// =============================================================================
// TOOL PARAMETER STRUCTS
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateDomainParams {
    /// Domain name (letters, digits, hyphens).
    #[schemars(description = "Domain name (letters, digits, hyphens)")]
    pub name: String,
    /// Human-readable description of the domain.
    #[schemars(description = "Human-readable description of the domain")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateNodeParams {
    /// Domain to catalog the URL under (created on first use).
    #[schemars(description = "Domain to catalog the URL under (created on first use)")]
    pub domain: String,
    /// The URL to catalog (http or https).
    #[schemars(description = "The URL to catalog (http or https)")]
    pub url: String,
    /// Title for the entry.
    #[schemars(description = "Title for the entry")]
    pub title: Option<String>,
    /// Description for the entry.
    #[schemars(description = "Description for the entry")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct NodeKeyParams {
    /// Composite node key, e.g. 'urldex:bookmarks:42'.
    #[schemars(description = "Composite node key, e.g. 'urldex:bookmarks:42'")]
    pub key: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateNodeParams {
    /// Composite node key, e.g. 'urldex:bookmarks:42'.
    #[schemars(description = "Composite node key, e.g. 'urldex:bookmarks:42'")]
    pub key: String,
    /// New URL (omit to keep current).
    #[schemars(description = "New URL (omit to keep current)")]
    pub url: Option<String>,
    /// New title (omit to keep current).
    #[schemars(description = "New title (omit to keep current)")]
    pub title: Option<String>,
    /// New description (omit to keep current).
    #[schemars(description = "New description (omit to keep current)")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListNodesParams {
    /// Domain to list.
    #[schemars(description = "Domain to list")]
    pub domain: String,
    /// Case-insensitive substring match over title and URL.
    #[schemars(description = "Case-insensitive substring match over title and URL")]
    pub search: Option<String>,
    /// Page number (1-indexed, default 1).
    #[schemars(description = "Page number (1-indexed, default 1)")]
    pub page: Option<u64>,
    /// Page size (default 20, max 100).
    #[schemars(description = "Page size (default 20, max 100)")]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FindNodeParams {
    /// Domain to search.
    #[schemars(description = "Domain to search")]
    pub domain: String,
    /// Exact URL to look up.
    #[schemars(description = "Exact URL to look up")]
    pub url: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AttributeValueParam {
    /// Attribute name (must be declared in the domain's schema).
    #[schemars(description = "Attribute name (must be declared in the domain's schema)")]
    pub name: String,
    /// The value to set.
    #[schemars(description = "The value to set")]
    pub value: String,
    /// Ordering position (required for ordered_tag attributes).
    #[schemars(description = "Ordering position (required for ordered_tag attributes)")]
    pub order_index: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetAttributesParams {
    /// Composite node key, e.g. 'urldex:bookmarks:42'.
    #[schemars(description = "Composite node key, e.g. 'urldex:bookmarks:42'")]
    pub key: String,
    /// Attribute values to set (full replace per attribute name).
    #[schemars(description = "Attribute values to set (full replace per attribute name)")]
    pub attributes: Vec<AttributeValueParam>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DefineAttributeParams {
    /// Domain to define the attribute in.
    #[schemars(description = "Domain to define the attribute in")]
    pub domain: String,
    /// Attribute name (letters, digits, underscores, hyphens).
    #[schemars(description = "Attribute name (letters, digits, underscores, hyphens)")]
    pub name: String,
    /// Kind: tag, ordered_tag, number, string, markdown, or image.
    #[schemars(description = "Kind: tag, ordered_tag, number, string, markdown, or image")]
    pub kind: String,
    /// Description of what the attribute means.
    #[schemars(description = "Description of what the attribute means")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DomainParams {
    /// Domain name.
    #[schemars(description = "Domain name")]
    pub domain: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateAttributeParams {
    /// Composite attribute key, e.g. 'urldex:bookmarks:attr-3'.
    #[schemars(description = "Composite attribute key, e.g. 'urldex:bookmarks:attr-3'")]
    pub key: String,
    /// New description.
    #[schemars(description = "New description")]
    pub description: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AttributeKeyParams {
    /// Composite attribute key, e.g. 'urldex:bookmarks:attr-3'.
    #[schemars(description = "Composite attribute key, e.g. 'urldex:bookmarks:attr-3'")]
    pub key: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FilterParam {
    /// Attribute name to filter on.
    #[schemars(description = "Attribute name to filter on")]
    pub name: String,
    /// Value to match.
    #[schemars(description = "Value to match")]
    pub value: String,
    /// Match operator: 'equals' (default) or 'contains'.
    #[schemars(description = "Match operator: 'equals' (default) or 'contains'")]
    pub op: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FilterNodesParams {
    /// Domain to filter.
    #[schemars(description = "Domain to filter")]
    pub domain: String,
    /// Filters, ANDed together.
    #[schemars(description = "Filters, ANDed together")]
    pub filters: Vec<FilterParam>,
    /// Page number (1-indexed, default 1).
    #[schemars(description = "Page number (1-indexed, default 1)")]
    pub page: Option<u64>,
    /// Page size (default 20, max 100).
    #[schemars(description = "Page size (default 20, max 100)")]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateDependencyParams {
    /// Composite key of the dependent node (the one that would be cascaded).
    #[schemars(description = "Composite key of the dependent node (the one that would be cascaded)")]
    pub source: String,
    /// Composite key of the node being depended on.
    #[schemars(description = "Composite key of the node being depended on")]
    pub target: String,
    /// Dependency kind: hard, soft, or reference.
    #[schemars(description = "Dependency kind: hard, soft, or reference")]
    pub kind: String,
    /// Delete the source when the target is deleted.
    #[schemars(description = "Delete the source when the target is deleted")]
    pub cascade_delete: Option<bool>,
    /// Advisory flag: source should be refreshed when the target changes.
    #[schemars(description = "Advisory flag: source should be refreshed when the target changes")]
    pub cascade_update: Option<bool>,
    /// Description of the relationship.
    #[schemars(description = "Description of the relationship")]
    pub description: Option<String>,
}

// =============================================================================
// TOOL IMPLEMENTATIONS
// =============================================================================

#[tool_router]
impl UrldexMcp {
    pub fn new(client: UrldexClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    fn proxy(result: Result<serde_json::Value, crate::client::ClientError>, text: impl FnOnce(&serde_json::Value) -> String) -> Result<CallToolResult, McpError> {
        match result {
            Ok(resp) => Ok(CallToolResult::success(vec![Content::text(text(&resp))])),
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "Create a domain (a named partition of the URL catalog)")]
    async fn create_domain(
        &self,
        params: Parameters<CreateDomainParams>,
    ) -> Result<CallToolResult, McpError> {
        let CreateDomainParams { name, description } = params.0;
        let result = self
            .client
            .create_domain(&name, description.as_deref().unwrap_or(""))
            .await;
        Self::proxy(result, |resp| {
            format!(
                "Created domain '{}'",
                resp.get("name").and_then(|v| v.as_str()).unwrap_or("?")
            )
        })
    }

    #[tool(description = "List all domains in the catalog")]
    async fn list_domains(&self) -> Result<CallToolResult, McpError> {
        Self::proxy(self.client.list_domains().await, |resp| {
            let domains = resp.as_array().cloned().unwrap_or_default();
            if domains.is_empty() {
                return "No domains defined.".to_string();
            }
            let mut parts = vec![format!("Domains ({}):", domains.len())];
            for d in &domains {
                let name = d.get("name").and_then(|v| v.as_str()).unwrap_or("?");
                let desc = d.get("description").and_then(|v| v.as_str()).unwrap_or("");
                if desc.is_empty() {
                    parts.push(format!("  {name}"));
                } else {
                    parts.push(format!("  {name} - {desc}"));
                }
            }
            parts.join("\n")
        })
    }

    #[tool(description = "Catalog a URL in a domain (domain is created on first use)")]
    async fn create_node(
        &self,
        params: Parameters<CreateNodeParams>,
    ) -> Result<CallToolResult, McpError> {
        let CreateNodeParams {
            domain,
            url,
            title,
            description,
        } = params.0;
        let body = serde_json::json!({
            "url": url,
            "title": title.unwrap_or_default(),
            "description": description.unwrap_or_default(),
        });
        Self::proxy(self.client.create_node(&domain, &body).await, format_node)
    }

    #[tool(description = "Get a cataloged URL by its composite key")]
    async fn get_node(
        &self,
        params: Parameters<NodeKeyParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::proxy(self.client.get_node(&params.0.key).await, format_node)
    }

    #[tool(description = "Update a cataloged URL's url, title, or description")]
    async fn update_node(
        &self,
        params: Parameters<UpdateNodeParams>,
    ) -> Result<CallToolResult, McpError> {
        let UpdateNodeParams {
            key,
            url,
            title,
            description,
        } = params.0;
        let body = serde_json::json!({
            "url": url,
            "title": title,
            "description": description,
        });
        Self::proxy(self.client.update_node(&key, &body).await, format_node)
    }

    #[tool(description = "Delete a cataloged URL (hard dependents with cascade_delete go with it)")]
    async fn delete_node(
        &self,
        params: Parameters<NodeKeyParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::proxy(self.client.delete_node(&params.0.key).await, |resp| {
            let deleted = resp
                .get("deleted")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            let keys: Vec<&str> = deleted.iter().filter_map(|v| v.as_str()).collect();
            format!("Deleted {} node(s): {}", keys.len(), keys.join(", "))
        })
    }

    #[tool(description = "List a domain's cataloged URLs with optional search and pagination")]
    async fn list_nodes(
        &self,
        params: Parameters<ListNodesParams>,
    ) -> Result<CallToolResult, McpError> {
        let ListNodesParams {
            domain,
            search,
            page,
            size,
        } = params.0;
        let result = self
            .client
            .list_nodes(&domain, search.as_deref(), page, size)
            .await;
        Self::proxy(result, format_node_page)
    }

    #[tool(description = "Find a cataloged URL by exact URL match within a domain")]
    async fn find_node_by_url(
        &self,
        params: Parameters<FindNodeParams>,
    ) -> Result<CallToolResult, McpError> {
        let FindNodeParams { domain, url } = params.0;
        Self::proxy(self.client.find_node_by_url(&domain, &url).await, format_node)
    }

    #[tool(description = "Set schema-validated attribute values on a node (full replace per name)")]
    async fn set_node_attributes(
        &self,
        params: Parameters<SetAttributesParams>,
    ) -> Result<CallToolResult, McpError> {
        let SetAttributesParams { key, attributes } = params.0;
        let values: Vec<serde_json::Value> = attributes
            .into_iter()
            .map(|a| {
                serde_json::json!({
                    "name": a.name,
                    "value": a.value,
                    "order_index": a.order_index,
                })
            })
            .collect();
        let body = serde_json::json!({ "attributes": values });
        let result = self.client.set_node_attributes(&key, &body).await;
        Self::proxy(result, format_attribute_values)
    }

    #[tool(description = "Get all attribute values of a node")]
    async fn get_node_attributes(
        &self,
        params: Parameters<NodeKeyParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.client.get_node_attributes(&params.0.key).await;
        Self::proxy(result, format_attribute_values)
    }

    #[tool(description = "Declare an attribute in a domain's schema (tag, ordered_tag, number, string, markdown, image)")]
    async fn create_domain_attribute(
        &self,
        params: Parameters<DefineAttributeParams>,
    ) -> Result<CallToolResult, McpError> {
        let DefineAttributeParams {
            domain,
            name,
            kind,
            description,
        } = params.0;
        let body = serde_json::json!({
            "name": name,
            "kind": kind,
            "description": description.unwrap_or_default(),
        });
        Self::proxy(self.client.define_attribute(&domain, &body).await, |resp| {
            format!(
                "Defined attribute '{}' ({}) as {}",
                resp.get("name").and_then(|v| v.as_str()).unwrap_or("?"),
                resp.get("kind").and_then(|v| v.as_str()).unwrap_or("?"),
                resp.get("key").and_then(|v| v.as_str()).unwrap_or("?"),
            )
        })
    }

    #[tool(description = "List a domain's attribute schema")]
    async fn list_domain_attributes(
        &self,
        params: Parameters<DomainParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::proxy(self.client.list_attributes(&params.0.domain).await, |resp| {
            let defs = resp.as_array().cloned().unwrap_or_default();
            if defs.is_empty() {
                return "No attributes defined.".to_string();
            }
            let mut parts = vec![format!("Attributes ({}):", defs.len())];
            for d in &defs {
                parts.push(format!(
                    "  {} [{}] {}",
                    d.get("name").and_then(|v| v.as_str()).unwrap_or("?"),
                    d.get("kind").and_then(|v| v.as_str()).unwrap_or("?"),
                    d.get("key").and_then(|v| v.as_str()).unwrap_or("?"),
                ));
            }
            parts.join("\n")
        })
    }

    #[tool(description = "Update an attribute definition's description")]
    async fn update_domain_attribute(
        &self,
        params: Parameters<UpdateAttributeParams>,
    ) -> Result<CallToolResult, McpError> {
        let UpdateAttributeParams { key, description } = params.0;
        let body = serde_json::json!({ "description": description });
        Self::proxy(self.client.update_attribute(&key, &body).await, |resp| {
            format!(
                "Updated attribute '{}'",
                resp.get("name").and_then(|v| v.as_str()).unwrap_or("?")
            )
        })
    }

    #[tool(description = "Delete an attribute definition and every stored value of it")]
    async fn delete_domain_attribute(
        &self,
        params: Parameters<AttributeKeyParams>,
    ) -> Result<CallToolResult, McpError> {
        let key = params.0.key;
        match self.client.delete_attribute(&key).await {
            Ok(_) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Deleted attribute {key}"
            ))])),
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "Find nodes in a domain whose attribute values match the given filters")]
    async fn filter_nodes_by_attributes(
        &self,
        params: Parameters<FilterNodesParams>,
    ) -> Result<CallToolResult, McpError> {
        let FilterNodesParams {
            domain,
            filters,
            page,
            size,
        } = params.0;
        let filters: Vec<serde_json::Value> = filters
            .into_iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "value": f.value,
                    "op": f.op.unwrap_or_default(),
                })
            })
            .collect();
        let body = serde_json::json!({ "filters": filters, "page": page, "size": size });
        Self::proxy(self.client.filter_nodes(&domain, &body).await, format_node_page)
    }

    #[tool(description = "Create a dependency edge between two cataloged URLs")]
    async fn create_dependency(
        &self,
        params: Parameters<CreateDependencyParams>,
    ) -> Result<CallToolResult, McpError> {
        let CreateDependencyParams {
            source,
            target,
            kind,
            cascade_delete,
            cascade_update,
            description,
        } = params.0;
        let body = serde_json::json!({
            "source": source,
            "target": target,
            "kind": kind,
            "cascade_delete": cascade_delete.unwrap_or(false),
            "cascade_update": cascade_update.unwrap_or(false),
            "description": description.unwrap_or_default(),
        });
        Self::proxy(self.client.create_dependency(&body).await, |resp| {
            format!(
                "Created {} dependency {} -> {}",
                resp.get("kind").and_then(|v| v.as_str()).unwrap_or("?"),
                resp.get("source").and_then(|v| v.as_str()).unwrap_or("?"),
                resp.get("target").and_then(|v| v.as_str()).unwrap_or("?"),
            )
        })
    }

    #[tool(description = "List the dependencies of a node (edges where it is the source)")]
    async fn list_node_dependencies(
        &self,
        params: Parameters<NodeKeyParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.client.list_dependencies(&params.0.key).await;
        Self::proxy(result, format_edges)
    }

    #[tool(description = "List the dependents of a node (edges where it is the target)")]
    async fn list_node_dependents(
        &self,
        params: Parameters<NodeKeyParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.client.list_dependents(&params.0.key).await;
        Self::proxy(result, format_edges)
    }

    #[tool(description = "Get server identity and catalog statistics")]
    async fn get_server_info(&self) -> Result<CallToolResult, McpError> {
        Self::proxy(self.client.info().await, |resp| {
            format!(
                "urldex {} (namespace '{}')\n  Domains: {}\n  Nodes: {}\n  Attributes: {}\n  Dependencies: {}\n  Subscriptions: {}\n  Events: {} total, {} pending",
                resp.get("version").and_then(|v| v.as_str()).unwrap_or("?"),
                resp.get("namespace").and_then(|v| v.as_str()).unwrap_or("?"),
                resp.get("domains").and_then(|v| v.as_u64()).unwrap_or(0),
                resp.get("nodes").and_then(|v| v.as_u64()).unwrap_or(0),
                resp.get("attributes").and_then(|v| v.as_u64()).unwrap_or(0),
                resp.get("dependencies").and_then(|v| v.as_u64()).unwrap_or(0),
                resp.get("subscriptions").and_then(|v| v.as_u64()).unwrap_or(0),
                resp.get("events_total").and_then(|v| v.as_u64()).unwrap_or(0),
                resp.get("events_pending").and_then(|v| v.as_u64()).unwrap_or(0),
            )
        })
    }
}

// =============================================================================
// SERVER HANDLER
// =============================================================================

#[tool_handler]
impl ServerHandler for UrldexMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "urldex URL catalog server. Use tools to catalog URLs into domains, \
                 declare and set schema-validated attributes, link entries with \
                 dependencies, and filter by attribute values. Nodes are addressed \
                 by composite keys like 'urldex:bookmarks:42'."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// =============================================================================
// RESPONSE FORMATTING
// =============================================================================

/// Format a single node JSON into human-readable text.
fn format_node(resp: &serde_json::Value) -> String {
    let key = resp.get("key").and_then(|v| v.as_str()).unwrap_or("?");
    let url = resp.get("url").and_then(|v| v.as_str()).unwrap_or("?");
    let title = resp.get("title").and_then(|v| v.as_str()).unwrap_or("");
    let description = resp
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let mut parts = vec![format!("{key}"), format!("  URL: {url}")];
    if !title.is_empty() {
        parts.push(format!("  Title: {title}"));
    }
    if !description.is_empty() {
        parts.push(format!("  Description: {description}"));
    }
    parts.join("\n")
}

/// Format a node page JSON into human-readable text.
fn format_node_page(resp: &serde_json::Value) -> String {
    let total = resp.get("total_count").and_then(|v| v.as_u64()).unwrap_or(0);
    let page = resp.get("page").and_then(|v| v.as_u64()).unwrap_or(1);
    let pages = resp.get("total_pages").and_then(|v| v.as_u64()).unwrap_or(0);
    let nodes = resp
        .get("nodes")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    if total == 0 {
        return "No matching nodes.".to_string();
    }

    let mut parts = vec![format!("{total} node(s), page {page}/{}:", pages.max(1))];
    for node in &nodes {
        let key = node.get("key").and_then(|v| v.as_str()).unwrap_or("?");
        let url = node.get("url").and_then(|v| v.as_str()).unwrap_or("?");
        let title = node.get("title").and_then(|v| v.as_str()).unwrap_or("");
        if title.is_empty() {
            parts.push(format!("  {key}  {url}"));
        } else {
            parts.push(format!("  {key}  {url}  ({title})"));
        }
    }
    parts.join("\n")
}

/// Format an attribute value list JSON into human-readable text.
fn format_attribute_values(resp: &serde_json::Value) -> String {
    let values = resp
        .get("attributes")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    if values.is_empty() {
        return "No attribute values.".to_string();
    }

    let mut parts = vec![format!("Attributes ({}):", values.len())];
    for value in &values {
        let name = value.get("name").and_then(|v| v.as_str()).unwrap_or("?");
        let val = value.get("value").and_then(|v| v.as_str()).unwrap_or("?");
        match value.get("order_index").and_then(|v| v.as_u64()) {
            Some(idx) => parts.push(format!("  {name}[{idx}]: {val}")),
            None => parts.push(format!("  {name}: {val}")),
        }
    }
    parts.join("\n")
}

/// Format a dependency edge list JSON into human-readable text.
fn format_edges(resp: &serde_json::Value) -> String {
    let edges = resp.as_array().cloned().unwrap_or_default();
    if edges.is_empty() {
        return "No dependency edges.".to_string();
    }

    let mut parts = vec![format!("Edges ({}):", edges.len())];
    for edge in &edges {
        let source = edge.get("source").and_then(|v| v.as_str()).unwrap_or("?");
        let target = edge.get("target").and_then(|v| v.as_str()).unwrap_or("?");
        let kind = edge.get("kind").and_then(|v| v.as_str()).unwrap_or("?");
        let cascade = edge
            .get("cascade_delete")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if cascade {
            parts.push(format!("  {source} --[{kind}, cascade]--> {target}"));
        } else {
            parts.push(format!("  {source} --[{kind}]--> {target}"));
        }
    }
    parts.join("\n")
}
