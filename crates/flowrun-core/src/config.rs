//! Client, polling and retry configuration.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::error::{FlowError, FlowResult};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for a data-flow service.
#[derive(Clone)]
pub struct ClientConfig {
    /// Service base URL; run endpoints are resolved relative to it.
    pub base_url: String,
    /// Bearer token, treated as an opaque credential.
    pub token: Option<String>,
    /// Project scope appended to every request as `project_id`.
    pub project_id: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for a base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            project_id: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the project scope.
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check the settings are usable.
    pub fn validate(&self) -> FlowResult<()> {
        if self.base_url.is_empty() {
            return Err(FlowError::Configuration("base URL is empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(FlowError::Configuration(format!(
                "base URL must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if let Some(token) = self.token.as_deref() {
            if token.trim().is_empty() {
                return Err(FlowError::Configuration("token is empty".into()));
            }
            // Header values cannot carry control characters.
            if token.chars().any(char::is_control) {
                return Err(FlowError::Configuration(
                    "token contains control characters".into(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// How the interval between status polls evolves.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PollBackoff {
    /// Poll at a constant interval.
    #[default]
    Fixed,
    /// Multiply the interval after every poll, up to a cap.
    Exponential {
        /// Growth factor per poll.
        multiplier: f64,
        /// Upper bound on the interval.
        max_interval: Duration,
    },
}

impl PollBackoff {
    /// Interval to use after `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        match *self {
            PollBackoff::Fixed => current,
            PollBackoff::Exponential {
                multiplier,
                max_interval,
            } => current.mul_f64(multiplier.max(1.0)).min(max_interval),
        }
    }
}

/// Settings for waiting on a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Interval before the second poll.
    pub interval: Duration,
    /// Total wait budget.
    pub timeout: Duration,
    /// Interval progression.
    pub backoff: PollBackoff,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
            backoff: PollBackoff::Fixed,
        }
    }
}

impl PollConfig {
    /// Fixed-interval polling.
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            backoff: PollBackoff::Fixed,
        }
    }

    /// Exponentially backed-off polling.
    pub fn exponential(
        interval: Duration,
        timeout: Duration,
        multiplier: f64,
        max_interval: Duration,
    ) -> Self {
        Self {
            interval,
            timeout,
            backoff: PollBackoff::Exponential {
                multiplier,
                max_interval,
            },
        }
    }
}

/// Retry policy for transient I/O failures on individual calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any delay.
    pub max_backoff: Duration,
    /// Growth factor per retry.
    pub multiplier: f64,
    /// Randomize delays to a factor in [0.5, 1.0].
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Disable jitter.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as i32;
        let base = self
            .initial_backoff
            .mul_f64(self.multiplier.max(1.0).powi(exponent))
            .min(self.max_backoff);
        if self.jitter {
            base.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            base
        }
    }
}
