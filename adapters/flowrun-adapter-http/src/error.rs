//! Error types for the HTTP adapter.

use flowrun_core::{FlowError, RunError};
use serde::Deserialize;
use thiserror::Error;

/// Result type for HTTP adapter operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors that can occur when talking to the data-flow service.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The HTTP client failed before a usable response was read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request conflicts with the run's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request was rejected as invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Any other error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Client configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<HttpError> for FlowError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Http(e) => classify_reqwest(&e),
            HttpError::Json(e) => FlowError::Serialization(e),
            HttpError::AuthFailed(msg) => FlowError::AuthenticationFailed(msg),
            HttpError::NotFound(msg) => FlowError::RunNotFound(msg),
            HttpError::Conflict(msg) => FlowError::Conflict(msg),
            HttpError::BadRequest(message) => FlowError::Api {
                status: 400,
                message,
            },
            HttpError::ApiError { status, message } => FlowError::Api { status, message },
            HttpError::Configuration(msg) => FlowError::Configuration(msg),
        }
    }
}

/// Split client failures into retryable network faults and the rest.
fn classify_reqwest(e: &reqwest::Error) -> FlowError {
    let message = e.to_string();
    if e.is_builder() {
        FlowError::Configuration(message)
    } else if e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() {
        FlowError::Transport(message)
    } else {
        FlowError::Request(message)
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RunError,
}

/// Render an error response body.
///
/// Accepts `{error: {trace, errors}}`, a bare `{trace, errors}` or
/// anything else as plain text.
pub(crate) fn describe_error_body(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if !envelope.error.errors.is_empty() {
            return envelope.error.to_string();
        }
    }
    if let Ok(error) = serde_json::from_str::<RunError>(body) {
        if !error.errors.is_empty() {
            return error.to_string();
        }
    }
    let text = body.trim();
    if text.is_empty() {
        "<empty response body>".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_enveloped_error() {
        let body = r#"{"error":{"trace":"abc123","errors":[{"code":"does_not_exist","message":"Connection c-1 was not found","extra":{"id":"c-1"}}]}}"#;
        let msg = describe_error_body(body);
        assert!(msg.contains("does_not_exist"));
        assert!(msg.contains("Connection c-1 was not found"));
        assert!(msg.contains("abc123"));
    }

    #[test]
    fn test_describe_bare_error() {
        let body = r#"{"trace":"t9","errors":[{"code":"invalid_request","message":"bad limit"}]}"#;
        let msg = describe_error_body(body);
        assert!(msg.contains("bad limit"));
    }

    #[test]
    fn test_describe_plain_text() {
        assert_eq!(describe_error_body("  gateway timeout \n"), "gateway timeout");
        assert_eq!(describe_error_body(""), "<empty response body>");
    }

    #[test]
    fn test_not_found_to_flow() {
        let flow: FlowError = HttpError::NotFound("run r1".into()).into();
        assert!(matches!(flow, FlowError::RunNotFound(msg) if msg == "run r1"));
    }

    #[test]
    fn test_server_error_is_transient() {
        let flow: FlowError = HttpError::ApiError {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert!(flow.is_transient());
    }

    #[test]
    fn test_bad_request_is_not_transient() {
        let flow: FlowError = HttpError::BadRequest("limit too large".into()).into();
        assert!(!flow.is_transient());
    }

    #[test]
    fn test_builder_error_is_configuration() {
        let err = reqwest::Client::new()
            .get("https://dataflow.example.com/v2/pipelines")
            .bearer_auth("bad\ntoken")
            .build()
            .unwrap_err();
        assert!(err.is_builder());

        let flow: FlowError = HttpError::Http(err).into();
        assert!(matches!(flow, FlowError::Configuration(_)));
        assert!(!flow.is_transient());
    }

    #[test]
    fn test_invalid_url_is_not_transient() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();

        let flow: FlowError = HttpError::Http(err).into();
        assert!(!flow.is_transient());
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport() {
        // Bind then drop a listener so the port is known to be closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::Client::new()
            .get(format!("http://{addr}/pipelines"))
            .send()
            .await
            .unwrap_err();

        let flow: FlowError = HttpError::Http(err).into();
        assert!(matches!(flow, FlowError::Transport(_)));
        assert!(flow.is_transient());
    }

    #[test]
    fn test_auth_failed_to_flow() {
        let flow: FlowError = HttpError::AuthFailed("token expired".into()).into();
        assert!(matches!(flow, FlowError::AuthenticationFailed(_)));
    }
}
