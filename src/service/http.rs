//! HTTP Query Service Client
//!
//! REST client for the remote query service:
//!
//! - `POST   /v1/queries` submit a query
//! - `GET    /v1/queries/{id}` poll status
//! - `GET    /v1/queries/{id}/results` fetch one result page
//! - `GET    /v1/queries/{id}/location` bulk result object location
//! - `DELETE /v1/queries/{id}` cancel
//! - `GET    /v1/resources?prefix=` list resources for expansion
//!
//! Every call authenticates with the profile's bearer token. Service error
//! bodies (`{"code", "message"}`) are mapped onto the error taxonomy with
//! the message carried verbatim.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{QueryError, QueryResult};
use crate::service::{
    QueryHandle, QueryRequest, QueryService, RawRow, ResourceCatalog, ResultPage, ResultSource,
    StatusSnapshot,
};

/// Connection settings for one service endpoint
#[derive(Debug, Clone)]
pub struct HttpServiceConfig {
    pub base_url: String,

    /// Bearer token from the selected credential profile
    pub token: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retrieval strategy this endpoint supports
    pub result_source: ResultSource,
}

impl Default for HttpServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8088".to_string(),
            token: String::new(),
            timeout_secs: 30,
            result_source: ResultSource::Paginated,
        }
    }
}

/// Client for the query service REST API
pub struct HttpQueryService {
    client: Client,
    config: HttpServiceConfig,
}

impl HttpQueryService {
    pub fn new(config: HttpServiceConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn transport_error(e: reqwest::Error) -> QueryError {
        if e.is_timeout() {
            QueryError::Transport(format!("request timed out: {}", e))
        } else if e.is_connect() {
            QueryError::Transport(format!("connection failed: {}", e))
        } else {
            QueryError::Transport(e.to_string())
        }
    }

    /// Turn a non-success response into the matching error kind.
    ///
    /// The HTTP status settles authentication and throttling; everything
    /// else is decided by the error code in the body.
    async fn classify_response(response: Response) -> QueryError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let (code, message) = match serde_json::from_str::<ServiceErrorBody>(&body) {
            Ok(parsed) => (parsed.code, parsed.message),
            Err(_) => (String::new(), body),
        };
        let message = if message.is_empty() {
            format!("HTTP {}", status)
        } else {
            message
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => QueryError::Unauthorized(message),
            StatusCode::TOO_MANY_REQUESTS => QueryError::RateLimited(message),
            _ => QueryError::from_service_code(&code, message),
        }
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn submit(&self, request: &QueryRequest) -> QueryResult<QueryHandle> {
        let url = self.url("/v1/queries");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(request)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_response(response).await);
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Transport(format!("invalid submit response: {}", e)))?;

        tracing::info!("Submitted query {}", submitted.query_id);
        Ok(QueryHandle::new(
            submitted.query_id,
            Utc::now().timestamp_millis(),
        ))
    }

    async fn poll(&self, handle: &QueryHandle) -> QueryResult<StatusSnapshot> {
        let url = self.url(&format!("/v1/queries/{}", handle.id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_response(response).await);
        }

        let snapshot: StatusSnapshot = response
            .json()
            .await
            .map_err(|e| QueryError::Transport(format!("invalid status response: {}", e)))?;

        tracing::debug!("Query {} is {}", handle.id, snapshot.status);
        Ok(snapshot)
    }

    async fn fetch_page(
        &self,
        handle: &QueryHandle,
        page_token: Option<&str>,
    ) -> QueryResult<ResultPage> {
        let url = self.url(&format!("/v1/queries/{}/results", handle.id));

        let mut request = self.client.get(&url).bearer_auth(&self.config.token);
        if let Some(token) = page_token {
            request = request.query(&[("page_token", token)]);
        }

        let response = request.send().await.map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| QueryError::Transport(format!("invalid results page: {}", e)))
    }

    async fn bulk_location(&self, handle: &QueryHandle) -> QueryResult<Option<String>> {
        let url = self.url(&format!("/v1/queries/{}/location", handle.id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        // Endpoints that never materialize result objects report 404 here
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::classify_response(response).await);
        }

        let body: LocationResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Transport(format!("invalid location response: {}", e)))?;

        Ok(body.location)
    }

    async fn fetch_bulk(&self, location: &str) -> QueryResult<Vec<RawRow>> {
        // Locations are pre-signed URLs on the result object store; they
        // carry their own authorization.
        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| QueryError::Transport(format!("invalid result object: {}", e)))
    }

    async fn cancel(&self, handle: &QueryHandle) -> QueryResult<()> {
        let url = self.url(&format!("/v1/queries/{}", handle.id));

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_response(response).await);
        }

        tracing::info!("Cancelled query {}", handle.id);
        Ok(())
    }

    fn result_source(&self) -> ResultSource {
        self.config.result_source
    }
}

#[async_trait]
impl ResourceCatalog for HttpQueryService {
    async fn list_resources(&self, prefix: &str) -> QueryResult<Vec<String>> {
        let url = self.url("/v1/resources");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.token)
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_response(response).await);
        }

        let body: ResourceListResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Transport(format!("invalid resource listing: {}", e)))?;

        Ok(body.resources)
    }
}

// ============================================
// Wire DTOs
// ============================================

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    query_id: String,
}

#[derive(Debug, Deserialize)]
struct LocationResponse {
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceListResponse {
    #[serde(default)]
    resources: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}
