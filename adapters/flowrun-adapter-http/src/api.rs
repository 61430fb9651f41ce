//! Data-flow service REST client.
//!
//! ## Run flow
//!
//! 1. `POST /pipelines/{id}/runs` → `metadata.asset_id` is the run ID
//! 2. Poll `GET /pipelines/{id}/runs/{run_id}` until a terminal state
//! 3. Page through `GET /pipelines/{id}/runs/{run_id}/logs?offset&limit`
//! 4. Cancel with `POST /pipelines/{id}/runs/{run_id}/cancel`
//!
//! Every request carries the bearer token and, when configured, the
//! `project_id` query parameter.

// Response fields are deserialized for completeness even where unused.
#![allow(dead_code)]

use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use flowrun_core::{ClientConfig, RunError, RunState, RunStatus, RunSummary};

use crate::error::{HttpError, HttpResult, describe_error_body};

/// User agent sent with every request.
const USER_AGENT: &str = concat!("flowrun/", env!("CARGO_PKG_VERSION"));

/// Data-flow service API client.
#[derive(Clone)]
pub struct DataFlowClient {
    /// HTTP client.
    client: Client,
    /// API base URL, without trailing slash.
    base_url: String,
    /// Bearer token.
    token: Option<String>,
    /// Project scope.
    project_id: Option<String>,
}

impl fmt::Debug for DataFlowClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFlowClient")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl DataFlowClient {
    /// Create a client from connection settings.
    pub fn new(config: &ClientConfig) -> HttpResult<Self> {
        config
            .validate()
            .map_err(|e| HttpError::Configuration(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(HttpError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            project_id: config.project_id.clone(),
        })
    }

    /// Base URL in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start a request with credentials and project scope attached.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(project_id) = &self.project_id {
            builder = builder.query(&[("project_id", project_id)]);
        }
        builder
    }

    // ─── Runs ───────────────────────────────────────────────────────

    /// Trigger a run of a pipeline.
    #[instrument(skip(self))]
    pub async fn create_run(&self, pipeline_id: &str) -> HttpResult<RunResponse> {
        let response = self
            .request(Method::POST, &format!("/pipelines/{pipeline_id}/runs"))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List the runs of a pipeline.
    #[instrument(skip(self))]
    pub async fn list_runs(&self, pipeline_id: &str) -> HttpResult<RunListResponse> {
        let response = self
            .request(Method::GET, &format!("/pipelines/{pipeline_id}/runs"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a run.
    #[instrument(skip(self))]
    pub async fn get_run(&self, pipeline_id: &str, run_id: &str) -> HttpResult<RunResponse> {
        let response = self
            .request(
                Method::GET,
                &format!("/pipelines/{pipeline_id}/runs/{run_id}"),
            )
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Request cancellation of a run.
    #[instrument(skip(self))]
    pub async fn cancel_run(&self, pipeline_id: &str, run_id: &str) -> HttpResult<()> {
        let response = self
            .request(
                Method::POST,
                &format!("/pipelines/{pipeline_id}/runs/{run_id}/cancel"),
            )
            .json(&serde_json::json!({}))
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Get a page of a run's log.
    #[instrument(skip(self))]
    pub async fn get_logs(
        &self,
        pipeline_id: &str,
        run_id: &str,
        offset: u64,
        limit: u32,
    ) -> HttpResult<LogsResponse> {
        let response = self
            .request(
                Method::GET,
                &format!("/pipelines/{pipeline_id}/runs/{run_id}/logs"),
            )
            .query(&[("offset", offset.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        self.handle_response(response).await
    }

    // ─── Response handling ──────────────────────────────────────────

    /// Handle an HTTP response, extracting JSON or returning an error.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> HttpResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(Self::status_error(status, &body))
        }
    }

    /// Handle an HTTP response whose body, if any, is not needed.
    async fn handle_empty_response(&self, response: reqwest::Response) -> HttpResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::status_error(status, &body))
    }

    fn status_error(status: StatusCode, body: &str) -> HttpError {
        let message = describe_error_body(body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => HttpError::AuthFailed(message),
            StatusCode::NOT_FOUND => HttpError::NotFound(message),
            StatusCode::CONFLICT => HttpError::Conflict(message),
            StatusCode::BAD_REQUEST => HttpError::BadRequest(message),
            _ => HttpError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

// ─── Response types ─────────────────────────────────────────────────

/// A run document (create, get, list).
#[derive(Debug, Clone, Deserialize)]
pub struct RunResponse {
    /// Asset metadata.
    pub metadata: RunMetadata,
    /// Run body.
    pub entity: RunEntity,
}

/// Asset metadata of a run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunMetadata {
    /// Run ID.
    pub asset_id: String,
    /// Canonical URL of the run.
    #[serde(default)]
    pub href: Option<String>,
    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub create_time: Option<String>,
    /// Last modification timestamp (RFC 3339).
    #[serde(default)]
    pub modification_time: Option<String>,
}

impl RunMetadata {
    /// Parsed creation time, if present and well-formed.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.create_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Run body.
#[derive(Debug, Clone, Deserialize)]
pub struct RunEntity {
    /// Lifecycle state.
    pub state: RunState,
    /// Progress counters.
    #[serde(default)]
    pub summary: Option<RunSummary>,
    /// Failure description.
    #[serde(default)]
    pub error: Option<RunError>,
    /// Name given to the run.
    #[serde(default)]
    pub name: Option<String>,
}

impl RunEntity {
    /// Convert into a status, applying the error-state fallback.
    pub fn into_status(self) -> RunStatus {
        RunStatus::new(self.state, self.summary, self.error)
    }
}

/// Run listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RunListResponse {
    /// Runs of the pipeline.
    #[serde(default)]
    pub runs: Vec<RunResponse>,
    /// Total number of runs.
    #[serde(default)]
    pub total_count: u64,
}

/// A page of a run's log.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsResponse {
    /// Log events, oldest first.
    #[serde(default)]
    pub logs: Vec<LogEvent>,
    /// Offset of the first event.
    #[serde(default)]
    pub offset: Option<u64>,
    /// Total number of events.
    #[serde(default)]
    pub total_count: u64,
    /// Link to the first page.
    #[serde(default)]
    pub first: Option<PageLink>,
    /// Link to the last page.
    #[serde(default)]
    pub last: Option<PageLink>,
}

/// A pagination link.
#[derive(Debug, Clone, Deserialize)]
pub struct PageLink {
    /// Target URL.
    pub href: String,
}

/// A single log event.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEvent {
    /// Event timestamp.
    pub date: DateTime<Utc>,
    /// Event identifier.
    pub event_id: EventId,
    /// Event text.
    #[serde(default)]
    pub message_text: String,
    /// Event type.
    #[serde(rename = "type", default)]
    pub event_type: String,
}

/// Event identifiers are strings on some service versions, numbers on others.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    /// Textual identifier.
    Text(String),
    /// Numeric identifier.
    Number(u64),
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Text(s) => f.write_str(s),
            EventId::Number(n) => write!(f, "{n}"),
        }
    }
}
