//! Flowrun adapter for HTTP+JSON data-flow services
//!
//! Implements [`RunsApi`] against a REST service that exposes pipeline runs
//! under `/pipelines/{id}/runs`.
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | Submit | `POST /pipelines/{id}/runs` |
//! | List | `GET /pipelines/{id}/runs` |
//! | Status | `GET /pipelines/{id}/runs/{run_id}` |
//! | Cancel | `POST /pipelines/{id}/runs/{run_id}/cancel` |
//! | Logs | `GET /pipelines/{id}/runs/{run_id}/logs?offset&limit` |
//!
//! # Authentication
//!
//! The bearer token from [`ClientConfig`] is sent as-is in the
//! `Authorization` header. Obtaining and refreshing it is up to the caller.
//!
//! ```bash
//! export FLOWRUN_BASE_URL="https://dataflow.example.com/v2"
//! export FLOWRUN_TOKEN="your-token"
//! export FLOWRUN_PROJECT_ID="your-project-id"  # optional
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use flowrun_adapter_http::HttpRunsApi;
//! use flowrun_core::{ClientConfig, PipelineId, RunPoller};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::new(std::env::var("FLOWRUN_BASE_URL")?)
//!         .with_token(std::env::var("FLOWRUN_TOKEN")?);
//!     let poller = RunPoller::new(Arc::new(HttpRunsApi::new(config)?));
//!
//!     let run = poller.submit(&PipelineId::new("pipeline-123")).await?;
//!     let status = poller.wait_for_terminal(&run).await?;
//!     println!("{} ended as {}", run, status.state());
//!     Ok(())
//! }
//! ```
//!
//! # Error mapping
//!
//! - 401/403 → authentication failure
//! - 404 → run not found (submission error when submitting)
//! - 400/422 on submit → submission error
//! - 409 → conflict
//! - 408/429/5xx and connection failures → transient, retried by the poller

mod api;
mod backend;
mod error;

pub use api::DataFlowClient;
pub use backend::HttpRunsApi;
pub use error::{HttpError, HttpResult};

// Re-export common types
pub use flowrun_core::{ClientConfig, RunsApi};
