//! Error types for the core crate.

use std::time::Duration;

use thiserror::Error;

use crate::run::{RunError, RunState};

/// Errors that can occur while driving a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    /// The service rejected the submission (unknown pipeline, connection or asset).
    #[error("Run submission failed: {0}")]
    Submission(String),

    /// The run reached the `error` state.
    #[error("Run {run_id} failed: {error}")]
    RunFailed {
        /// Run that failed.
        run_id: String,
        /// Structured failure reported by the service.
        error: RunError,
    },

    /// The run was stopped by a cancellation request.
    #[error("Run {0} was stopped")]
    RunStopped(String),

    /// The client-side wait budget elapsed before the run became terminal.
    #[error("Timeout after {waited:?} waiting for run {run_id} (last state: {last_state})")]
    Timeout {
        /// Run that was being waited on.
        run_id: String,
        /// Time spent waiting.
        waited: Duration,
        /// Last state observed before giving up.
        last_state: RunState,
    },

    /// A single network-level failure. Retried by the poller.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request failed without a usable response and retrying would
    /// not help (redirect loop, undecodable body).
    #[error("Request error: {0}")]
    Request(String),

    /// Transient failures persisted through every retry attempt.
    #[error("{operation} failed after {attempts} attempts: {message}")]
    TransientIo {
        /// Operation being retried.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last underlying error.
        message: String,
    },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Run not found.
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// The request conflicts with the current run state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other error response from the service.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response message.
        message: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FlowError {
    /// Whether the failure is a transient I/O condition worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            FlowError::Transport(_) => true,
            FlowError::Api { status, .. } => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}

/// Result type for run operations.
pub type FlowResult<T> = Result<T, FlowError>;
