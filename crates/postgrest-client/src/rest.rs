//! REST client implementation
//!
//! This module speaks the PostgREST dialect used by the hosted database:
//! tables live under `/rest/v1/<table>`, filters are query parameters of the
//! form `column=eq.value`, and stored procedures are called with
//! `POST /rest/v1/rpc/<function>`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ServiceConfig;
use crate::retry::{network_retry, RetryConfig};

// =============================================================================
// Error Types
// =============================================================================

/// REST error with HTTP status and message
///
/// A status of `0` means the request never produced an HTTP response
/// (connection refused, DNS failure, timeout, unreadable body).
///
/// # Examples
/// ```
/// use postgrest_client::RestError;
///
/// let error = RestError::new(404, "PGRST116", "No rows found");
/// assert_eq!(error.status(), 404);
/// assert!(!error.is_network_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestError {
    status: u16,
    code: String,
    message: String,
}

impl RestError {
    /// Create a new REST error
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { status, code: code.into(), message: message.into() }
    }

    /// Create an error for a request that never got an HTTP response
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, "NetworkError", message)
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the error code (PostgREST or SQLSTATE code when provided)
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is a network-related error that should be retried
    pub fn is_network_error(&self) -> bool {
        matches!(self.status, 0 | 408 | 425 | 429 | 500 | 502 | 503 | 504 | 522 | 524)
    }

    /// Check if the service rejected the request (constraint, permission, validation)
    pub fn is_rejection(&self) -> bool {
        !self.is_network_error()
    }
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "REST error {}: {} - {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for RestError {}

/// Error body returned by PostgREST
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    /// PostgREST or SQLSTATE code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: Option<String>,
    /// Extra detail
    #[serde(default)]
    pub details: Option<String>,
    /// Hint for fixing the request
    #[serde(default)]
    pub hint: Option<String>,
}

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method for REST requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Read rows
    Get,
    /// Insert rows or call a procedure
    Post,
    /// Update rows
    Patch,
    /// Delete rows
    Delete,
}

impl HttpMethod {
    /// Method name
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// What a request is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A table
    Table(String),
    /// A stored procedure
    Rpc(String),
}

/// REST request
///
/// # Examples
/// ```
/// use postgrest_client::RestRequest;
///
/// let request = RestRequest::select("farmlands")
///     .columns("*")
///     .eq("farmer_id", "f-1")
///     .order("created_at", false);
///
/// assert_eq!(request.path(), "farmlands");
/// ```
#[derive(Debug, Clone)]
pub struct RestRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Table or procedure
    pub target: Target,
    /// Query parameters, in insertion order
    pub params: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// JSON request body
    pub body: Option<Vec<u8>>,
}

impl RestRequest {
    fn new(method: HttpMethod, target: Target) -> Self {
        Self { method, target, params: Vec::new(), headers: HashMap::new(), body: None }
    }

    /// Read rows from a table
    pub fn select(table: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, Target::Table(table.into()))
    }

    /// Insert rows into a table
    pub fn insert(table: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, Target::Table(table.into()))
    }

    /// Update rows in a table
    pub fn update(table: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, Target::Table(table.into()))
    }

    /// Delete rows from a table
    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, Target::Table(table.into()))
    }

    /// Call a stored procedure
    pub fn rpc(function: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, Target::Rpc(function.into()))
    }

    /// Choose the returned columns (`select=`)
    pub fn columns(self, columns: impl Into<String>) -> Self {
        self.param("select", columns)
    }

    /// Filter on column equality (`column=eq.value`)
    pub fn eq(self, column: impl Into<String>, value: impl AsRef<str>) -> Self {
        let filter = format!("eq.{}", value.as_ref());
        self.param(column, filter)
    }

    /// Order results by a column
    pub fn order(self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.param("order", format!("{}.{}", column, direction))
    }

    /// Limit the number of rows
    pub fn limit(self, limit: usize) -> Self {
        self.param("limit", limit.to_string())
    }

    /// Add a raw query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Ask the service to return the written rows
    pub fn return_representation(self) -> Self {
        self.header("Prefer", "return=representation")
    }

    /// Attach an idempotency key so a replayed write is applied once
    pub fn idempotency_key(self, key: impl Into<String>) -> Self {
        self.header("Idempotency-Key", key)
    }

    /// Set the request body from JSON
    pub fn json_body<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(value)?);
        Ok(self)
    }

    /// Path below `/rest/v1/`
    pub fn path(&self) -> String {
        match &self.target {
            Target::Table(table) => table.clone(),
            Target::Rpc(function) => format!("rpc/{}", function),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// REST response
#[derive(Debug, Clone)]
pub struct RestResponse<T> {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response data
    pub data: T,
}

impl<T> RestResponse<T> {
    /// Get a header value
    pub fn header(&self, key: &str) -> Option<&String> {
        self.headers.get(key)
    }
}

// =============================================================================
// Client Implementation
// =============================================================================

use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};

/// Client for the hosted REST service
///
/// # Examples
/// ```no_run
/// use postgrest_client::{RestClient, RestRequest, ServiceConfig};
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let client = RestClient::new(ServiceConfig::from_env()?)?;
///     let rows: Vec<serde_json::Value> = client
///         .execute(RestRequest::select("crops").columns("*"))
///         .await?
///         .data;
///     println!("{} crops", rows.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    client: ReqwestClient,
    config: ServiceConfig,
}

impl RestClient {
    /// Create a new REST client
    pub fn new(config: ServiceConfig) -> Result<Self, RestError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| RestError::new(0, "ClientError", format!("Failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Execute a request and decode the JSON response body
    pub async fn execute<T>(&self, request: RestRequest) -> Result<RestResponse<T>, RestError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(&request).await?;
        self.parse_response(response).await
    }

    /// Execute a request whose response body is ignored, returning the status
    pub async fn execute_empty(&self, request: RestRequest) -> Result<u16, RestError> {
        let response = self.send(&request).await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(status)
    }

    /// Execute a request, retrying network-class failures
    pub async fn execute_with_retry<T>(
        &self,
        request: RestRequest,
        retry: &RetryConfig,
    ) -> Result<RestResponse<T>, RestError>
    where
        T: DeserializeOwned,
    {
        network_retry(retry, || self.execute(request.clone())).await
    }

    /// Execute a bodiless request, retrying network-class failures
    pub async fn execute_empty_with_retry(
        &self,
        request: RestRequest,
        retry: &RetryConfig,
    ) -> Result<u16, RestError> {
        network_retry(retry, || self.execute_empty(request.clone())).await
    }

    async fn send(&self, request: &RestRequest) -> Result<ReqwestResponse, RestError> {
        let url = self.config.rest_url(&request.path());

        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Patch => self.client.patch(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };

        if !request.params.is_empty() {
            req = req.query(&request.params);
        }

        req = req
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key));

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = &request.body {
            req = req.header("Content-Type", "application/json").body(body.clone());
        }

        tracing::trace!(method = request.method.as_str(), %url, "sending request");

        req.send()
            .await
            .map_err(|e| RestError::transport(format!("Request failed: {}", e)))
    }

    async fn parse_response<T>(&self, response: ReqwestResponse) -> Result<RestResponse<T>, RestError>
    where
        T: DeserializeOwned,
    {
        let status = response.status().as_u16();

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(key.to_string(), value_str.to_string());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| RestError::new(0, "ParseError", format!("Failed to read response: {}", e)))?;

        let data: T = serde_json::from_str(&body).map_err(|e| {
            RestError::new(status, "ParseError", format!("Failed to parse JSON: {}", e))
        })?;

        Ok(RestResponse { status, headers, data })
    }

    async fn error_from(response: ReqwestResponse) -> RestError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody { code, message: Some(message), .. }) => {
                RestError::new(status, code.unwrap_or_else(|| "Unknown".to_string()), message)
            }
            _ => RestError::new(status, "Unknown", format!("HTTP {}: {}", status, body)),
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Get the service URL
    pub fn service_url(&self) -> &str {
        &self.config.service_url
    }
}
