//! # urldex HTTP Client
//!
//! Wrapper around the urldex REST API for use by the MCP server.

use serde_json::Value;

/// Errors from the HTTP client layer.
#[derive(Debug)]
pub enum ClientError {
    /// Cannot reach the urldex server.
    ConnectionFailed(String),
    /// 429 Too Many Requests.
    RateLimited,
    /// Server returned a 4xx error with a structured body.
    RequestFailed(u16, String),
    /// Server returned a 5xx error.
    ServerError(u16, String),
    /// Failed to parse response body.
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(url) => write!(f, "Cannot connect to urldex at {url}"),
            Self::RateLimited => write!(f, "Rate limited: too many requests"),
            Self::RequestFailed(status, msg) => write!(f, "Request failed ({status}): {msg}"),
            Self::ServerError(status, msg) => write!(f, "Server error ({status}): {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// HTTP client that wraps calls to the urldex REST API.
#[derive(Clone)]
pub struct UrldexClient {
    http: reqwest::Client,
    base_url: String,
}

impl UrldexClient {
    /// Create a new client pointing at the given urldex server URL.
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http.request(method, &url)
    }

    /// Handle HTTP response: check status codes and parse JSON.
    ///
    /// 4xx bodies carry the catalog's `{code, message}` envelope; the
    /// message is surfaced so the MCP caller sees why a request failed.
    async fn handle_response(&self, resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::ServerError(status.as_u16(), body));
        }
        if status.is_client_error() {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            let message = body
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("request rejected")
                .to_string();
            return Err(ClientError::RequestFailed(status.as_u16(), message));
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// Send a request and handle connection errors.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        req.send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {e}", self.base_url)))
    }

    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::GET, path);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::POST, path).json(body);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::PUT, path).json(body);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::DELETE, path);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// GET /info → server identity and table counters.
    pub async fn info(&self) -> Result<Value, ClientError> {
        self.get("/info").await
    }

    /// GET /domains
    pub async fn list_domains(&self) -> Result<Value, ClientError> {
        self.get("/domains").await
    }

    /// POST /domains
    pub async fn create_domain(&self, name: &str, description: &str) -> Result<Value, ClientError> {
        let body = serde_json::json!({ "name": name, "description": description });
        self.post("/domains", &body).await
    }

    /// POST /domains/{domain}/nodes
    pub async fn create_node(&self, domain: &str, body: &Value) -> Result<Value, ClientError> {
        self.post(&format!("/domains/{domain}/nodes"), body).await
    }

    /// GET /domains/{domain}/nodes
    pub async fn list_nodes(
        &self,
        domain: &str,
        search: Option<&str>,
        page: Option<u64>,
        size: Option<u64>,
    ) -> Result<Value, ClientError> {
        let mut req = self.request(reqwest::Method::GET, &format!("/domains/{domain}/nodes"));
        if let Some(search) = search {
            req = req.query(&[("search", search)]);
        }
        if let Some(page) = page {
            req = req.query(&[("page", page)]);
        }
        if let Some(size) = size {
            req = req.query(&[("size", size)]);
        }
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// GET /domains/{domain}/nodes/find?url=
    pub async fn find_node_by_url(&self, domain: &str, url: &str) -> Result<Value, ClientError> {
        let req = self
            .request(
                reqwest::Method::GET,
                &format!("/domains/{domain}/nodes/find"),
            )
            .query(&[("url", url)]);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// GET /nodes/{key}
    pub async fn get_node(&self, key: &str) -> Result<Value, ClientError> {
        self.get(&format!("/nodes/{key}")).await
    }

    /// PUT /nodes/{key}
    pub async fn update_node(&self, key: &str, body: &Value) -> Result<Value, ClientError> {
        self.put(&format!("/nodes/{key}"), body).await
    }

    /// DELETE /nodes/{key}
    pub async fn delete_node(&self, key: &str) -> Result<Value, ClientError> {
        self.delete(&format!("/nodes/{key}")).await
    }

    /// GET /nodes/{key}/attributes
    pub async fn get_node_attributes(&self, key: &str) -> Result<Value, ClientError> {
        self.get(&format!("/nodes/{key}/attributes")).await
    }

    /// PUT /nodes/{key}/attributes
    pub async fn set_node_attributes(
        &self,
        key: &str,
        body: &Value,
    ) -> Result<Value, ClientError> {
        self.put(&format!("/nodes/{key}/attributes"), body).await
    }

    /// GET /domains/{domain}/attributes
    pub async fn list_attributes(&self, domain: &str) -> Result<Value, ClientError> {
        self.get(&format!("/domains/{domain}/attributes")).await
    }

    /// POST /domains/{domain}/attributes
    pub async fn define_attribute(&self, domain: &str, body: &Value) -> Result<Value, ClientError> {
        self.post(&format!("/domains/{domain}/attributes"), body)
            .await
    }

    /// PUT /attributes/{key}
    pub async fn update_attribute(&self, key: &str, body: &Value) -> Result<Value, ClientError> {
        self.put(&format!("/attributes/{key}"), body).await
    }

    /// DELETE /attributes/{key}
    pub async fn delete_attribute(&self, key: &str) -> Result<Value, ClientError> {
        self.delete(&format!("/attributes/{key}")).await
    }

    /// POST /domains/{domain}/filter
    pub async fn filter_nodes(&self, domain: &str, body: &Value) -> Result<Value, ClientError> {
        self.post(&format!("/domains/{domain}/filter"), body).await
    }

    /// POST /dependencies
    pub async fn create_dependency(&self, body: &Value) -> Result<Value, ClientError> {
        self.post("/dependencies", body).await
    }

    /// GET /nodes/{key}/dependencies
    pub async fn list_dependencies(&self, key: &str) -> Result<Value, ClientError> {
        self.get(&format!("/nodes/{key}/dependencies")).await
    }

    /// GET /nodes/{key}/dependents
    pub async fn list_dependents(&self, key: &str) -> Result<Value, ClientError> {
        self.get(&format!("/nodes/{key}/dependents")).await
    }
}
