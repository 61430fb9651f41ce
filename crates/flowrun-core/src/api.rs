//! The service seam.
//!
//! [`RunsApi`] is the minimal set of point-in-time calls the poller needs
//! from a data-flow service:
//!
//! ```text
//!   create_run() ──→ get_run() ──→ ... ──→ get_run() (terminal)
//!                       │
//!                       ├──→ stop_run()
//!                       └──→ get_logs(offset, limit)
//! ```
//!
//! ## Method table
//!
//! | Method | Kind | Returns |
//! |--------|------|---------|
//! | `name()` | sync | `&str` |
//! | `create_run()` | async | `FlowResult<RunRecord>` |
//! | `get_run()` | async | `FlowResult<RunStatus>` |
//! | `stop_run()` | async | `FlowResult<()>` |
//! | `get_logs()` | async | `FlowResult<LogPage>` |
//! | `list_runs()` | async | `FlowResult<Vec<RunRecord>>` |
//!
//! Implementations do no retrying and no waiting; both belong to
//! [`RunPoller`](crate::poller::RunPoller).

use async_trait::async_trait;

use crate::error::FlowResult;
use crate::logs::LogPage;
use crate::run::{PipelineId, RunHandle, RunRecord, RunStatus};

/// Point-in-time access to a data-flow service's runs.
///
/// # Contract
///
/// - `create_run()` MUST return the new run in `Starting` unless the
///   service rejected it outright, in which case it returns
///   `FlowError::Submission`.
/// - `get_run()` MUST NOT block waiting for a state change.
/// - Network-level failures MUST surface as `FlowError::Transport` (or a
///   transient `FlowError::Api`) so callers can retry them.
/// - `stop_run()` on a run that already finished MAY fail with
///   `FlowError::Conflict`.
#[async_trait]
pub trait RunsApi: Send + Sync {
    /// Name of this service binding.
    fn name(&self) -> &str;

    /// Trigger a run of a pipeline.
    async fn create_run(&self, pipeline: &PipelineId) -> FlowResult<RunRecord>;

    /// Read the current status of a run.
    async fn get_run(&self, run: &RunHandle) -> FlowResult<RunStatus>;

    /// Request cancellation of a run.
    async fn stop_run(&self, run: &RunHandle) -> FlowResult<()>;

    /// Read a page of a run's log.
    async fn get_logs(&self, run: &RunHandle, offset: u64, limit: u32) -> FlowResult<LogPage>;

    /// List the runs of a pipeline.
    async fn list_runs(&self, pipeline: &PipelineId) -> FlowResult<Vec<RunRecord>>;
}
