//! Flowrun core
//!
//! Typed access to the run lifecycle of a data-flow (pipeline) service.
//! The service executes pipelines as *runs*; this crate lets a caller submit
//! a run, read its status, wait for it to settle, cancel it and page
//! through its log without re-deriving the remote state machine.
//!
//! # Overview
//!
//! - [`RunState`] and [`RunStatus`] model the lifecycle, with the
//!   guarantee that a failed run always carries a [`RunError`]
//! - [`RunsApi`] is the seam to the service (see `flowrun-adapter-http`)
//! - [`RunPoller`] adds retries for transient I/O, waiting with a
//!   configurable [`PollConfig`], idempotent cancellation and log paging
//!
//! # Example: Running a Pipeline
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use flowrun_adapter_http::HttpRunsApi;
//! use flowrun_core::{ClientConfig, PipelineId, PollConfig, RunPoller};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::new("https://dataflow.example.com/v2")
//!         .with_token(std::env::var("FLOWRUN_TOKEN")?);
//!     let api = HttpRunsApi::new(config)?;
//!
//!     let poller = RunPoller::new(Arc::new(api)).with_poll_config(PollConfig::fixed(
//!         Duration::from_secs(1),
//!         Duration::from_secs(60),
//!     ));
//!
//!     let run = poller.submit(&PipelineId::new("pipeline-123")).await?;
//!     let status = poller.wait_for_terminal(&run).await?.into_success(&run)?;
//!
//!     if let Some(summary) = status.summary() {
//!         println!("rows written: {}", summary.total_rows_written);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod logs;
pub mod poller;
pub mod run;

pub use api::RunsApi;
pub use config::{ClientConfig, PollBackoff, PollConfig, RetryPolicy};
pub use error::{FlowError, FlowResult};
pub use logs::{LogEntry, LogPage};
pub use poller::RunPoller;
pub use run::{
    ErrorDetail, PipelineId, RunError, RunHandle, RunId, RunRecord, RunState, RunStatus,
    RunSummary,
};
