//! PostgREST client for a Supabase project.
//!
//! Every request carries the connection's `apikey`, its bearer token and the
//! schema profile header. Non-2xx responses become [`Error::Request`] with
//! the response body so callers can show it as-is.
//!
//! # Usage
//!
//! ```rust,no_run
//! use supahack_core::client::{RestClient, RestEndpoint};
//! use supahack_core::types::Connection;
//!
//! #[tokio::main]
//! async fn main() -> supahack_core::Result<()> {
//!     let connection = Connection::new("abcdefgh", "anon-key", None, None);
//!     let client = RestClient::new(&connection, &RestEndpoint::Hosted)?;
//!     let openapi = client.fetch_openapi().await?;
//!     println!("{}", openapi);
//!     Ok(())
//! }
//! ```

pub mod query;

pub use query::{coerce_input_value, Filter, FilterOp, RowQuery, SortDirection};

use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::credentials::build_base_url;
use crate::error::{Error, Result};
use crate::openapi::infer_columns_from_rows;
use crate::types::Connection;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept for count failures.
const COUNT_ERROR_BODY_LIMIT: usize = 200;

/// Rows sampled when the OpenAPI document has no column list.
const COLUMN_SAMPLE_SIZE: u32 = 10;

const OPENAPI_ACCEPT: &str = "application/openapi+json;version=3.0";

/// Where the REST API lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RestEndpoint {
    /// `https://<projectId>.supabase.co/rest/v1`
    #[default]
    Hosted,
    /// Fixed base URL (self-hosted or local stack).
    Fixed(String),
}

impl RestEndpoint {
    /// Build from an optional override; blank overrides fall back to hosted.
    pub fn from_override(url: Option<&str>) -> Self {
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(u) => RestEndpoint::Fixed(u.to_string()),
            None => RestEndpoint::Hosted,
        }
    }

    pub fn base_url(&self, project_id: &str) -> String {
        match self {
            RestEndpoint::Hosted => build_base_url(project_id),
            RestEndpoint::Fixed(url) => url.trim_end_matches('/').to_string(),
        }
    }
}

/// Rows returned by a paged read.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPage {
    pub rows: Vec<Value>,
    /// Exact total when the server reported one.
    pub total: Option<u64>,
}

/// Parse the total from a `Content-Range` header (`0-0/42`).
///
/// `*` or a missing header yields `None`.
pub fn parse_content_range_total(header: Option<&str>) -> Option<u64> {
    let (_, total) = header?.rsplit_once('/')?;
    let total = total.trim();
    if total == "*" {
        return None;
    }
    total.parse().ok()
}

/// HTTP client bound to one connection.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    connection: Connection,
}

impl RestClient {
    /// Create a client with the default timeout.
    pub fn new(connection: &Connection, endpoint: &RestEndpoint) -> Result<Self> {
        Self::with_timeout(connection, endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        connection: &Connection,
        endpoint: &RestEndpoint,
        timeout: Duration,
    ) -> Result<Self> {
        let connection = connection.normalized();
        if !connection.is_usable() {
            return Err(Error::MissingCredentials);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: endpoint.base_url(&connection.project_id),
            connection,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Build request with auth and profile headers.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let profile_header = if method == Method::GET || method == Method::HEAD {
            "Accept-Profile"
        } else {
            "Content-Profile"
        };
        self.client
            .request(method, &url)
            .header("apikey", &self.connection.api_key)
            .bearer_auth(self.connection.effective_bearer())
            .header(profile_header, &self.connection.schema)
    }

    /// Turn a non-2xx response into [`Error::Request`].
    async fn check(response: Response, context: &str, body_limit: Option<usize>) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let body = text.trim();
        let body = match body_limit {
            Some(limit) => body.chars().take(limit).collect(),
            None => body.to_string(),
        };
        Err(Error::request(context, status.as_u16(), body))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metadata
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the OpenAPI description served at the REST root.
    pub async fn fetch_openapi(&self) -> Result<Value> {
        debug!("Fetching OpenAPI document from {}", self.base_url);
        let response = self
            .request(Method::GET, "/")
            .header("accept", OPENAPI_ACCEPT)
            .header("cache-control", "no-cache")
            .send()
            .await?;
        let response = Self::check(response, "OpenAPI request failed", None).await?;
        Ok(response.json().await?)
    }

    /// Exact row count of a table, or `None` when the server does not say.
    pub async fn get_table_row_count(&self, table: &str) -> Result<Option<u64>> {
        let response = self
            .request(Method::GET, &encode_table(table))
            .query(&[("select", "*"), ("limit", "1")])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = Self::check(response, "Count failed", Some(COUNT_ERROR_BODY_LIMIT)).await?;
        Ok(content_range_total(&response))
    }

    /// Column names by sampling a handful of rows.
    pub async fn infer_columns(&self, table: &str) -> Result<Option<Vec<String>>> {
        let page = self
            .fetch_rows(
                table,
                &RowQuery {
                    page_size: COLUMN_SAMPLE_SIZE,
                    ..Default::default()
                },
            )
            .await?;
        Ok(infer_columns_from_rows(&page.rows))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rows
    // ─────────────────────────────────────────────────────────────────────────

    /// Read one page of rows with an exact total.
    pub async fn fetch_rows(&self, table: &str, query: &RowQuery) -> Result<RowPage> {
        let response = self
            .request(Method::GET, &encode_table(table))
            .query(&query.to_params())
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = Self::check(response, "Query failed", None).await?;
        let total = content_range_total(&response);
        let rows: Vec<Value> = response.json().await?;
        Ok(RowPage { rows, total })
    }

    /// Insert one row and return what the server stored.
    pub async fn insert_row(&self, table: &str, row: &Value) -> Result<Vec<Value>> {
        let response = self
            .request(Method::POST, &encode_table(table))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let response = Self::check(response, "Insert failed", None).await?;
        Ok(response.json().await?)
    }

    /// Patch every row matching the filters.
    ///
    /// Refuses to run without a filter so a typo cannot rewrite a table.
    pub async fn update_rows(&self, table: &str, filters: &[Filter], patch: &Value) -> Result<Vec<Value>> {
        let params = filter_params(filters)?;
        let response = self
            .request(Method::PATCH, &encode_table(table))
            .query(&params)
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;
        let response = Self::check(response, "Update failed", None).await?;
        Ok(response.json().await?)
    }

    /// Delete every row matching the filters.
    pub async fn delete_rows(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        let params = filter_params(filters)?;
        let response = self
            .request(Method::DELETE, &encode_table(table))
            .query(&params)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = Self::check(response, "Delete failed", None).await?;
        Ok(response.json().await?)
    }
}

fn content_range_total(response: &Response) -> Option<u64> {
    parse_content_range_total(
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok()),
    )
}

fn filter_params(filters: &[Filter]) -> Result<Vec<(String, String)>> {
    let params: Vec<(String, String)> = filters.iter().filter_map(Filter::to_param).collect();
    if params.is_empty() {
        return Err(Error::Other("At least one filter is required.".into()));
    }
    Ok(params)
}

/// Percent-encode a table name for use as a path segment.
fn encode_table(table: &str) -> String {
    url::form_urlencoded::byte_serialize(table.trim().as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RestClient {
        let connection = Connection::new("abcdefgh", "anon-key", Some("api"), Some("user-jwt"));
        RestClient::new(&connection, &RestEndpoint::Fixed(server.uri())).unwrap()
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total(Some("0-0/42")), Some(42));
        assert_eq!(parse_content_range_total(Some("0-0/*")), None);
        assert_eq!(parse_content_range_total(Some("*/0")), Some(0));
        assert_eq!(parse_content_range_total(Some("garbage")), None);
        assert_eq!(parse_content_range_total(None), None);
    }

    #[test]
    fn test_endpoint_base_url() {
        assert_eq!(
            RestEndpoint::Hosted.base_url("abc"),
            "https://abc.supabase.co/rest/v1"
        );
        assert_eq!(
            RestEndpoint::from_override(Some("http://localhost:54321/rest/v1/")).base_url("abc"),
            "http://localhost:54321/rest/v1"
        );
        assert_eq!(RestEndpoint::from_override(Some("  ")), RestEndpoint::Hosted);
    }

    #[test]
    fn test_unusable_connection_rejected() {
        let connection = Connection::new("abc", "  ", None, None);
        assert!(matches!(
            RestClient::new(&connection, &RestEndpoint::Hosted),
            Err(Error::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_fetch_openapi_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer user-jwt"))
            .and(header("accept-profile", "api"))
            .and(header("accept", OPENAPI_ACCEPT))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "paths": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let doc = client_for(&server).fetch_openapi().await.unwrap();
        assert_eq!(doc, json!({ "paths": {} }));
    }

    #[tokio::test]
    async fn test_fetch_openapi_failure_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_openapi().await.unwrap_err();
        assert_eq!(err.to_string(), "OpenAPI request failed (401): Invalid API key");
    }

    #[tokio::test]
    async fn test_row_count_from_content_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .and(query_param("select", "*"))
            .and(query_param("limit", "1"))
            .and(header("prefer", "count=exact"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-range", "0-0/42")
                    .set_body_json(json!([{ "id": 1 }])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/unknown_total"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-range", "0-0/*")
                    .set_body_json(json!([])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/no_header"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.get_table_row_count("users").await.unwrap(), Some(42));
        assert_eq!(client.get_table_row_count("unknown_total").await.unwrap(), None);
        assert_eq!(client.get_table_row_count("no_header").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_row_count_failure_body_is_trimmed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(500)))
            .mount(&server)
            .await;

        let err = client_for(&server).get_table_row_count("users").await.unwrap_err();
        match err {
            Error::Request { context, status, body } => {
                assert_eq!(context, "Count failed");
                assert_eq!(status, 500);
                assert_eq!(body.len(), 200);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_row_count_failure_body_is_trimmed_before_truncating() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/padded"))
            .respond_with(ResponseTemplate::new(503).set_body_string(format!("{}{}", " ".repeat(300), "busy\n")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blank"))
            .respond_with(ResponseTemplate::new(500).set_body_string("  \n "))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get_table_row_count("padded").await.unwrap_err();
        assert_eq!(err.to_string(), "Count failed (503): busy");
        let err = client.get_table_row_count("blank").await.unwrap_err();
        assert_eq!(err.to_string(), "Count failed (500)");
    }

    #[tokio::test]
    async fn test_fetch_rows_with_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .and(query_param("select", "*"))
            .and(query_param("limit", "10"))
            .and(query_param("offset", "10"))
            .and(query_param("order", "id.asc"))
            .and(query_param("status", "in.(paid,shipped)"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-range", "10-11/12")
                    .set_body_json(json!([{ "id": 11 }, { "id": 12 }])),
            )
            .mount(&server)
            .await;

        let query = RowQuery {
            page_size: 10,
            page: 2,
            order: Some(("id".into(), SortDirection::Asc)),
            filters: vec![Filter::new("status", FilterOp::In, "paid,shipped")],
            ..Default::default()
        };
        let page = client_for(&server).fetch_rows("orders", &query).await.unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.total, Some(12));
    }

    #[tokio::test]
    async fn test_writes_request_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notes"))
            .and(header("prefer", "return=representation"))
            .and(header("content-profile", "api"))
            .and(body_json(json!({ "title": "hi" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": 1, "title": "hi" }])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/notes"))
            .and(query_param("id", "eq.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "title": "yo" }])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/notes"))
            .and(query_param("id", "eq.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let by_id = vec![Filter::new("id", FilterOp::Eq, "1")];
        assert_eq!(client.insert_row("notes", &json!({ "title": "hi" })).await.unwrap().len(), 1);
        let updated = client.update_rows("notes", &by_id, &json!({ "title": "yo" })).await.unwrap();
        assert_eq!(updated[0]["title"], "yo");
        assert_eq!(client.delete_rows("notes", &by_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unfiltered_delete_is_refused() {
        let server = MockServer::start().await;
        let err = client_for(&server).delete_rows("notes", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "At least one filter is required.");
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
