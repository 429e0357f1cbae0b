//! REST table client
//!
//! Typed access to the backend's table surface. Filters use the
//! `column=op.value` encoding the service expects; inserts and updates
//! send `Prefer: return=representation` so the affected row comes back
//! with its server-assigned id and timestamps.

use crate::error::{BackendError, ErrorBody};
use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the backend client
#[derive(Debug, Clone)]
pub struct BackendClientConfig {
    /// Base service URL (e.g., "https://project.supabase.co")
    pub base_url: String,
    /// Project API key, sent with every request
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Custom headers to include in all requests
    pub default_headers: HashMap<String, String>,
}

impl BackendClientConfig {
    /// Create a new config with a base URL and API key
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            user_agent: format!("SportsLinked/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}

/// Filter and shaping parameters for a table read
///
/// Built up fluently and consumed by [`TableClient::select`].
///
/// # Examples
/// ```
/// use backend_client::SelectQuery;
///
/// let query = SelectQuery::new()
///     .eq("receiver_id", "u1")
///     .eq("status", "pending")
///     .order("created_at.desc")
///     .limit(50);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<u32>,
}

impl SelectQuery {
    /// Create an empty query (matches all rows the caller may see)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter on a column
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), format!("eq.{}", value.into())));
        self
    }

    /// Add a less-than filter on a column
    pub fn lt(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), format!("lt.{}", value.into())));
        self
    }

    /// Set the ordering, e.g. `"created_at.desc"`
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Limit the number of rows returned
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the query as request parameters
    fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(self.filters.iter().cloned());
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// Client for the backend REST and auth surface
///
/// Cheap to clone; clones share the underlying connection pool.
///
/// # Example
///
/// ```rust,no_run
/// use backend_client::{BackendClient, BackendClientConfig, SelectQuery};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = BackendClientConfig::new("https://project.supabase.co", "anon-key");
///     let client = BackendClient::new(config);
///
///     let rows: Vec<serde_json::Value> = client
///         .table("message_requests")
///         .select(SelectQuery::new().eq("status", "pending"))
///         .await?;
///     println!("{} pending rows", rows.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// HTTP client
    client: ReqwestClient,
    /// Configuration
    config: BackendClientConfig,
    /// Access token of the signed-in user, if any
    access_token: Option<String>,
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(config: BackendClientConfig) -> Self {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            config,
            access_token: None,
        }
    }

    /// Return a copy of this client that authenticates as the given user
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Get a handle for a single table
    pub fn table(&self, name: impl Into<String>) -> TableClient {
        TableClient {
            client: self.clone(),
            table: name.into(),
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &BackendClientConfig {
        &self.config
    }

    /// Check whether an access token is attached
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub(crate) fn http(&self) -> &ReqwestClient {
        &self.client
    }

    pub(crate) fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.base_url, path)
    }

    /// Attach api key, default headers, and bearer auth to a request
    pub(crate) fn apply_headers(
        &self,
        mut req: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        req = req.header("apikey", &self.config.api_key);
        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        req.header("Authorization", format!("Bearer {}", bearer))
    }

    /// Parse a response body into `T`, mapping non-2xx statuses to errors
    pub(crate) async fn parse_response<T>(
        &self,
        response: ReqwestResponse,
    ) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorBody>(&body) {
                Ok(parsed) => parsed.into_error(status),
                Err(_) => BackendError::new(status, "unknown", format!("HTTP {}: {}", status, body)),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::new(0, "parse_error", format!("Failed to read response: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| BackendError::new(0, "parse_error", format!("Failed to parse JSON: {}", e)))
    }
}

/// Handle for one backend table
///
/// Obtained from [`BackendClient::table`]; carries the parent client's
/// credentials.
#[derive(Debug, Clone)]
pub struct TableClient {
    client: BackendClient,
    table: String,
}

impl TableClient {
    /// Get the table name
    pub fn name(&self) -> &str {
        &self.table
    }

    /// Read rows matching the query
    pub async fn select<T>(&self, query: SelectQuery) -> Result<Vec<T>, BackendError>
    where
        T: DeserializeOwned,
    {
        let url = self.client.rest_url(&self.table);
        let mut req = self.client.http().get(&url);
        for (key, value) in query.params() {
            req = req.query(&[(key, value)]);
        }
        req = self.client.apply_headers(req);

        tracing::debug!(table = %self.table, "select");
        let response = req
            .send()
            .await
            .map_err(|e| BackendError::new(0, "network_error", format!("Request failed: {}", e)))?;

        self.client.parse_response(response).await
    }

    /// Read rows matching the query, retrying transient failures
    pub async fn select_with_retry<T>(
        &self,
        query: SelectQuery,
        max_retries: usize,
    ) -> Result<Vec<T>, BackendError>
    where
        T: DeserializeOwned,
    {
        crate::retry::network_retry(max_retries, || self.select(query.clone())).await
    }

    /// Insert a row and return it with its server-assigned fields
    pub async fn insert<I, T>(&self, row: &I) -> Result<T, BackendError>
    where
        I: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.client.rest_url(&self.table);
        let req = self
            .client
            .apply_headers(self.client.http().post(&url))
            .header("Prefer", "return=representation")
            .json(row);

        tracing::debug!(table = %self.table, "insert");
        let response = req
            .send()
            .await
            .map_err(|e| BackendError::new(0, "network_error", format!("Request failed: {}", e)))?;

        let mut rows: Vec<T> = self.client.parse_response(response).await?;
        if rows.is_empty() {
            return Err(BackendError::new(
                500,
                "row_not_found",
                "insert returned no row",
            ));
        }
        Ok(rows.remove(0))
    }

    /// Update the row with the given id and return the updated row
    pub async fn update_by_id<P, T>(&self, id: &str, patch: &P) -> Result<T, BackendError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.client.rest_url(&self.table);
        let req = self
            .client
            .apply_headers(self.client.http().patch(&url))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(patch);

        tracing::debug!(table = %self.table, id, "update");
        let response = req
            .send()
            .await
            .map_err(|e| BackendError::new(0, "network_error", format!("Request failed: {}", e)))?;

        let mut rows: Vec<T> = self.client.parse_response(response).await?;
        if rows.is_empty() {
            return Err(BackendError::new(
                404,
                "row_not_found",
                format!("no row with id {}", id),
            ));
        }
        Ok(rows.remove(0))
    }
}
