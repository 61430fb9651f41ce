//! Run lifecycle types.
//!
//! The run state machine, as owned by the remote data-flow engine:
//!
//! ```text
//!   submit() ──→ Starting ──→ Queued ──→ Running ──→ Finished
//!                   │  │         │          │
//!                   │  │         │          ├──→ Stopping ──→ Stopped
//!                   │  └─────────┼──────────┤
//!                   └────────────┴──────────┴──→ Error
//! ```
//!
//! **Invariants:**
//! - `submit()` returns a run in `Starting`.
//! - `Queued` may be skipped (`Starting → Running`).
//! - Terminal states (`Finished`, `Error`, `Stopped`) are permanent.
//! - `Stopped` is only reached through a cancellation request.
//! - A status in `Error` always carries a non-empty [`RunError`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};

/// Code used when the service reports a failure without any detail.
pub const GENERIC_ERROR_CODE: &str = "run_failed";

/// Message used when the service reports a failure without any detail.
pub const GENERIC_ERROR_MESSAGE: &str = "run failed without error details from the service";

/// Identifier of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(pub String);

impl PipelineId {
    /// Create a new pipeline ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PipelineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PipelineId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a run, issued by the service at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Create a new run ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Address of a run. Every run endpoint is scoped by its pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunHandle {
    /// Pipeline the run belongs to.
    pub pipeline_id: PipelineId,
    /// The run itself.
    pub run_id: RunId,
}

impl RunHandle {
    /// Create a handle from a pipeline and run identifier.
    pub fn new(pipeline_id: impl Into<PipelineId>, run_id: impl Into<RunId>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            run_id: run_id.into(),
        }
    }

    /// Key used for per-run bookkeeping.
    pub(crate) fn cache_key(&self) -> String {
        format!("{}/{}", self.pipeline_id, self.run_id)
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pipeline_id, self.run_id)
    }
}

/// State of a run.
///
/// States the client does not know deserialize into [`RunState::Unknown`]
/// rather than failing, since the remote state machine may grow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunState {
    /// Accepted by the service, pre-flight checks in progress.
    Starting,
    /// Waiting for engine capacity.
    Queued,
    /// Executing.
    Running,
    /// Completed successfully.
    Finished,
    /// Failed, either in pre-flight validation or during execution.
    Error,
    /// Cancellation requested, engine winding down.
    Stopping,
    /// Cancelled.
    Stopped,
    /// A state this client does not recognise.
    Unknown(String),
}

impl RunState {
    /// Wire name of the state.
    pub fn as_str(&self) -> &str {
        match self {
            RunState::Starting => "starting",
            RunState::Queued => "queued",
            RunState::Running => "running",
            RunState::Finished => "finished",
            RunState::Error => "error",
            RunState::Stopping => "stopping",
            RunState::Stopped => "stopped",
            RunState::Unknown(raw) => raw,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Finished | RunState::Error | RunState::Stopped)
    }

    /// Check if the run is in a documented, non-terminal state.
    pub fn is_active(&self) -> bool {
        self.is_known() && !self.is_terminal()
    }

    /// Check if the state is one of the documented states.
    pub fn is_known(&self) -> bool {
        !matches!(self, RunState::Unknown(_))
    }

    /// Documented direct successors.
    fn successors(&self) -> Vec<RunState> {
        match self {
            RunState::Starting => vec![RunState::Queued, RunState::Running, RunState::Error],
            RunState::Queued => vec![RunState::Running, RunState::Error],
            RunState::Running => vec![RunState::Finished, RunState::Error, RunState::Stopping],
            RunState::Stopping => vec![RunState::Stopped],
            RunState::Finished | RunState::Error | RunState::Stopped | RunState::Unknown(_) => {
                vec![]
            }
        }
    }

    /// Whether `next` is a documented direct transition from this state.
    pub fn can_transition_to(&self, next: &RunState) -> bool {
        self.successors().contains(next)
    }

    /// Whether `next` can be observed after this state.
    ///
    /// Polling samples the state, so intermediate states may be missed;
    /// this follows documented edges transitively. Reflexive. Unknown
    /// states are tolerated in both directions, but nothing is reachable
    /// from a terminal state.
    pub fn can_reach(&self, next: &RunState) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        if !self.is_known() || !next.is_known() {
            return true;
        }

        let mut frontier = self.successors();
        let mut seen = Vec::new();
        while let Some(state) = frontier.pop() {
            if &state == next {
                return true;
            }
            if !seen.contains(&state) {
                frontier.extend(state.successors());
                seen.push(state);
            }
        }
        false
    }
}

impl From<String> for RunState {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "starting" => RunState::Starting,
            "queued" => RunState::Queued,
            "running" => RunState::Running,
            "finished" => RunState::Finished,
            "error" => RunState::Error,
            "stopping" => RunState::Stopping,
            "stopped" => RunState::Stopped,
            _ => RunState::Unknown(raw),
        }
    }
}

impl From<&str> for RunState {
    fn from(raw: &str) -> Self {
        RunState::from(raw.to_string())
    }
}

impl From<RunState> for String {
    fn from(state: RunState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress counters reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Rows read from all sources.
    #[serde(default)]
    pub total_rows_read: u64,
    /// Rows written to all targets.
    #[serde(default)]
    pub total_rows_written: u64,
    /// Bytes read from all sources.
    #[serde(default)]
    pub total_bytes_read: u64,
    /// Bytes written to all targets.
    #[serde(default)]
    pub total_bytes_written: u64,
    /// Source/target bindings already processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_bindings: Option<u32>,
    /// Total number of source/target bindings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bindings: Option<u32>,
}

/// One entry of a structured service error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Additional, service-specific context.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Structured failure description attached to a run or an error response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    /// Service trace identifier, useful for support requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// Individual errors.
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

impl RunError {
    /// An error with a single entry.
    pub fn single(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            trace: None,
            errors: vec![ErrorDetail {
                code: code.into(),
                message: message.into(),
                extra: serde_json::Map::new(),
            }],
        }
    }

    /// The fallback used when the service supplies no detail.
    pub fn generic() -> Self {
        Self::single(GENERIC_ERROR_CODE, GENERIC_ERROR_MESSAGE)
    }

    /// True when there is no usable message.
    pub fn is_empty(&self) -> bool {
        self.errors.iter().all(|e| e.message.trim().is_empty())
    }

    /// Message of the first entry.
    pub fn primary_message(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }

    /// Fill in blanks so the error always has at least one message.
    fn normalized(mut self) -> Self {
        if self.errors.is_empty() {
            self.errors = RunError::generic().errors;
        }
        for detail in &mut self.errors {
            if detail.message.trim().is_empty() {
                detail.message = GENERIC_ERROR_MESSAGE.to_string();
            }
            if detail.code.trim().is_empty() {
                detail.code = GENERIC_ERROR_CODE.to_string();
            }
        }
        self
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("[{}] {}", e.code, e.message))
            .collect();
        write!(f, "{}", messages.join("; "))?;
        if let Some(trace) = &self.trace {
            write!(f, " (trace: {trace})")?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RunStatusFields {
    state: RunState,
    #[serde(default)]
    summary: Option<RunSummary>,
    #[serde(default)]
    error: Option<RunError>,
}

impl From<RunStatusFields> for RunStatus {
    fn from(fields: RunStatusFields) -> Self {
        RunStatus::new(fields.state, fields.summary, fields.error)
    }
}

/// Point-in-time status of a run.
///
/// Construction goes through [`RunStatus::new`] (deserialization included),
/// so a status in [`RunState::Error`] always carries a non-empty error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RunStatusFields")]
pub struct RunStatus {
    state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RunError>,
    #[serde(skip)]
    preflight: bool,
}

impl RunStatus {
    /// Build a status, substituting a generic error for an `error` state
    /// the service left undescribed.
    pub fn new(state: RunState, summary: Option<RunSummary>, error: Option<RunError>) -> Self {
        let error = match (&state, error) {
            (RunState::Error, Some(e)) => Some(e.normalized()),
            (RunState::Error, None) => Some(RunError::generic()),
            (_, e) => e,
        };
        Self {
            state,
            summary,
            error,
            preflight: false,
        }
    }

    /// A status with only a state.
    pub fn with_state(state: RunState) -> Self {
        Self::new(state, None, None)
    }

    /// Current state.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Progress counters, if reported.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Failure description. Always present in the `error` state.
    pub fn error(&self) -> Option<&RunError> {
        self.error.as_ref()
    }

    /// Check if the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the run was seen going from `starting` straight to `error`,
    /// i.e. it was rejected by pre-flight validation before executing.
    pub fn is_preflight_failure(&self) -> bool {
        self.preflight
    }

    /// Flag an `error` status as a pre-flight rejection.
    pub(crate) fn mark_preflight(&mut self) {
        if self.state == RunState::Error {
            self.preflight = true;
        }
    }

    /// Map a terminal status onto a result: `finished` is success,
    /// a pre-flight rejection becomes [`FlowError::Submission`], any other
    /// `error` becomes [`FlowError::RunFailed`] and `stopped` becomes
    /// [`FlowError::RunStopped`].
    pub fn into_success(self, run: &RunHandle) -> FlowResult<RunStatus> {
        match self.state {
            RunState::Error if self.preflight => Err(FlowError::Submission(format!(
                "run {} rejected before execution: {}",
                run.run_id,
                self.error.unwrap_or_else(RunError::generic)
            ))),
            RunState::Error => Err(FlowError::RunFailed {
                run_id: run.run_id.to_string(),
                error: self.error.unwrap_or_else(RunError::generic),
            }),
            RunState::Stopped => Err(FlowError::RunStopped(run.run_id.to_string())),
            _ => Ok(self),
        }
    }
}

/// A run together with its status, as returned by submission and listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Address of the run.
    pub handle: RunHandle,
    /// Status at the time of the response.
    pub status: RunStatus,
    /// Time the run was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_terminal() {
        assert!(!RunState::Starting.is_terminal());
        assert!(!RunState::Queued.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::Stopping.is_terminal());
        assert!(RunState::Finished.is_terminal());
        assert!(RunState::Error.is_terminal());
        assert!(RunState::Stopped.is_terminal());
        assert!(!RunState::Unknown("paused".into()).is_terminal());
    }

    #[test]
    fn test_documented_transitions() {
        assert!(RunState::Starting.can_transition_to(&RunState::Queued));
        assert!(RunState::Starting.can_transition_to(&RunState::Error));
        assert!(RunState::Starting.can_transition_to(&RunState::Running));
        assert!(RunState::Queued.can_transition_to(&RunState::Running));
        assert!(RunState::Running.can_transition_to(&RunState::Stopping));
        assert!(RunState::Stopping.can_transition_to(&RunState::Stopped));

        assert!(!RunState::Running.can_transition_to(&RunState::Stopped));
        assert!(!RunState::Running.can_transition_to(&RunState::Queued));
        assert!(!RunState::Finished.can_transition_to(&RunState::Running));
    }

    #[test]
    fn test_reachability_through_sampling() {
        assert!(RunState::Starting.can_reach(&RunState::Finished));
        assert!(RunState::Queued.can_reach(&RunState::Stopped));
        assert!(RunState::Running.can_reach(&RunState::Running));
        assert!(!RunState::Stopping.can_reach(&RunState::Running));
        assert!(!RunState::Running.can_reach(&RunState::Queued));
        assert!(!RunState::Stopped.can_reach(&RunState::Running));
        assert!(!RunState::Finished.can_reach(&RunState::Error));
    }

    #[test]
    fn test_unknown_state_is_tolerated() {
        let state: RunState = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(state, RunState::Unknown("paused".into()));
        assert!(RunState::Running.can_reach(&state));
        assert!(state.can_reach(&RunState::Finished));
        assert!(!RunState::Finished.can_reach(&state));
        assert_eq!(serde_json::to_string(&state).unwrap(), "\"paused\"");
    }

    #[test]
    fn test_state_wire_names() {
        let state: RunState = serde_json::from_str("\"Finished\"").unwrap();
        assert_eq!(state, RunState::Finished);
        assert_eq!(serde_json::to_string(&RunState::Stopping).unwrap(), "\"stopping\"");
    }

    #[test]
    fn test_error_state_without_detail_gets_generic_error() {
        let status = RunStatus::with_state(RunState::Error);
        let error = status.error().unwrap();
        assert!(!error.is_empty());
        assert_eq!(error.primary_message(), Some(GENERIC_ERROR_MESSAGE));
    }

    #[test]
    fn test_error_state_with_blank_detail_is_filled() {
        let json = serde_json::json!({
            "state": "error",
            "error": {"trace": "t-1", "errors": [{"code": "", "message": "  "}]}
        });
        let status: RunStatus = serde_json::from_value(json).unwrap();
        let error = status.error().unwrap();
        assert_eq!(error.trace.as_deref(), Some("t-1"));
        assert_eq!(error.errors[0].code, GENERIC_ERROR_CODE);
        assert_eq!(error.errors[0].message, GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_error_state_keeps_service_detail() {
        let json = serde_json::json!({
            "state": "error",
            "error": {"errors": [{"code": "missing_connection", "message": "Connection c1 not found", "extra": {"id": "c1"}}]}
        });
        let status: RunStatus = serde_json::from_value(json).unwrap();
        let detail = &status.error().unwrap().errors[0];
        assert_eq!(detail.code, "missing_connection");
        assert_eq!(detail.message, "Connection c1 not found");
        assert_eq!(detail.extra["id"], "c1");
    }

    #[test]
    fn test_summary_defaults() {
        let json = serde_json::json!({"state": "running", "summary": {"total_rows_read": 12}});
        let status: RunStatus = serde_json::from_value(json).unwrap();
        let summary = status.summary().unwrap();
        assert_eq!(summary.total_rows_read, 12);
        assert_eq!(summary.total_rows_written, 0);
        assert!(status.error().is_none());
    }

    #[test]
    fn test_into_success() {
        let run = RunHandle::new("p1", "r1");
        assert!(
            RunStatus::with_state(RunState::Finished)
                .into_success(&run)
                .is_ok()
        );
        assert!(matches!(
            RunStatus::with_state(RunState::Error).into_success(&run),
            Err(FlowError::RunFailed { run_id, .. }) if run_id == "r1"
        ));
        assert!(matches!(
            RunStatus::with_state(RunState::Stopped).into_success(&run),
            Err(FlowError::RunStopped(id)) if id == "r1"
        ));
    }

    #[test]
    fn test_preflight_failure_is_a_submission_error() {
        let run = RunHandle::new("p1", "r1");
        let mut status = RunStatus::with_state(RunState::Error);
        assert!(!status.is_preflight_failure());
        status.mark_preflight();
        assert!(status.is_preflight_failure());
        assert!(matches!(
            status.into_success(&run),
            Err(FlowError::Submission(msg)) if msg.contains(GENERIC_ERROR_MESSAGE)
        ));

        let mut running = RunStatus::with_state(RunState::Running);
        running.mark_preflight();
        assert!(!running.is_preflight_failure());
    }

    #[test]
    fn test_active_states() {
        assert!(RunState::Starting.is_active());
        assert!(RunState::Stopping.is_active());
        assert!(!RunState::Finished.is_active());
        assert!(!RunState::Error.is_active());
        assert!(!RunState::Unknown("paused".into()).is_active());
    }

    #[test]
    fn test_run_handle_display() {
        let run = RunHandle::new("pipe-1", "run-9");
        assert_eq!(run.to_string(), "pipe-1/run-9");
        assert_eq!(run.cache_key(), "pipe-1/run-9");
    }
}
