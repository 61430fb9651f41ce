//! Shared helpers for CLI commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use console::{StyledObject, style};
use serde::Deserialize;
use tracing::debug;

use flowrun_adapter_http::HttpRunsApi;
use flowrun_core::{
    ClientConfig, PollConfig, RetryPolicy, RunHandle, RunPoller, RunState, RunStatus,
};

/// Default poll interval in seconds.
const DEFAULT_INTERVAL_SECS: u64 = 2;

/// Default wait budget in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default cap for exponential polling, in seconds.
const DEFAULT_MAX_INTERVAL_SECS: u64 = 30;

/// Interval growth per poll with exponential backoff.
const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Service connection flags, shared by every command.
#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// Service base URL
    #[arg(long, env = "FLOWRUN_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "FLOWRUN_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Project scope
    #[arg(long, env = "FLOWRUN_PROJECT_ID", global = true)]
    pub project_id: Option<String>,

    /// Config file (defaults to ~/.flowrun/config.yaml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Polling flags for commands that wait.
#[derive(Args, Debug, Default, Clone)]
pub struct PollArgs {
    /// Seconds between status polls
    #[arg(long)]
    pub interval: Option<u64>,

    /// Seconds to wait before giving up
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// How the poll interval evolves
    #[arg(long, value_enum)]
    pub backoff: Option<BackoffKind>,
}

/// Poll interval progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Constant interval.
    Fixed,
    /// Growing interval, capped at `max_interval_secs`.
    Exponential,
}

/// Contents of a config file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub project_id: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub backoff: Option<BackoffKind>,
    pub max_interval_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
}

/// Return the default config file location (~/.flowrun/config.yaml).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".flowrun").join("config.yaml"))
}

/// Load the config file.
///
/// An explicit path must exist; the default location is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    match default_config_path() {
        Some(path) if path.exists() => read_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn read_config(path: &Path) -> Result<FileConfig> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = serde_yaml_ng::from_str(&source)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Fully resolved settings: flags over config file over defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub poll: PollConfig,
    pub retry: RetryPolicy,
}

impl Settings {
    /// Resolve settings from flags and the config file.
    pub fn resolve(connection: &ConnectionArgs, poll: &PollArgs) -> Result<Self> {
        let file = load_file_config(connection.config.as_deref())?;
        Self::merge(connection, poll, file)
    }

    /// Merge flags with already-loaded file contents.
    pub fn merge(connection: &ConnectionArgs, poll: &PollArgs, file: FileConfig) -> Result<Self> {
        let base_url = connection
            .base_url
            .clone()
            .or(file.base_url)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No service URL configured. Pass --base-url, set FLOWRUN_BASE_URL or add base_url to the config file"
                )
            })?;

        let mut client = ClientConfig::new(base_url);
        if let Some(token) = connection.token.clone().or(file.token) {
            client = client.with_token(token);
        }
        if let Some(project_id) = connection.project_id.clone().or(file.project_id) {
            client = client.with_project_id(project_id);
        }
        client.validate()?;

        let interval = poll
            .interval
            .or(file.poll_interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval == 0 {
            anyhow::bail!("Poll interval must be at least 1 second");
        }
        let timeout = poll
            .timeout
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let poll = match poll
            .backoff
            .or(file.backoff)
            .unwrap_or(BackoffKind::Fixed)
        {
            BackoffKind::Fixed => PollConfig::fixed(
                Duration::from_secs(interval),
                Duration::from_secs(timeout),
            ),
            BackoffKind::Exponential => PollConfig::exponential(
                Duration::from_secs(interval),
                Duration::from_secs(timeout),
                BACKOFF_MULTIPLIER,
                Duration::from_secs(
                    file.max_interval_secs
                        .unwrap_or(DEFAULT_MAX_INTERVAL_SECS)
                        .max(interval),
                ),
            ),
        };

        let retry = match file.retry_attempts {
            Some(attempts) => RetryPolicy::default().with_max_attempts(attempts),
            None => RetryPolicy::default(),
        };

        Ok(Self {
            client,
            poll,
            retry,
        })
    }

    /// Build a poller bound to the configured service.
    pub fn poller(&self) -> Result<RunPoller> {
        let api = HttpRunsApi::new(self.client.clone())?;
        Ok(RunPoller::new(Arc::new(api))
            .with_poll_config(self.poll.clone())
            .with_retry_policy(self.retry.clone()))
    }
}

/// Style a run state by outcome.
pub fn styled_state(state: &RunState) -> StyledObject<&str> {
    let name = state.as_str();
    match state {
        RunState::Finished => style(name).green(),
        RunState::Error | RunState::Stopped => style(name).red(),
        RunState::Starting | RunState::Queued | RunState::Stopping => style(name).yellow(),
        RunState::Running => style(name).cyan(),
        RunState::Unknown(_) => style(name).dim(),
    }
}

/// Print a run's status, summary and error details.
pub fn print_status(run: &RunHandle, status: &RunStatus) {
    let marker = match status.state() {
        RunState::Finished => style("✓").green().bold(),
        RunState::Error | RunState::Stopped => style("✗").red().bold(),
        state if state.is_active() => style("→").cyan().bold(),
        _ => style("?").dim().bold(),
    };

    println!(
        "{} Run {} status: {}",
        marker,
        style(&run.run_id).dim(),
        styled_state(status.state()).bold()
    );

    if let Some(summary) = status.summary() {
        println!(
            "  Rows:  {} read, {} written",
            style(summary.total_rows_read).yellow(),
            style(summary.total_rows_written).yellow()
        );
        println!(
            "  Bytes: {} read, {} written",
            summary.total_bytes_read, summary.total_bytes_written
        );
        if let (Some(done), Some(total)) = (summary.completed_bindings, summary.total_bindings) {
            println!("  Bindings: {done}/{total}");
        }
    }

    if status.is_preflight_failure() {
        println!(
            "  {}",
            style("Rejected before execution; check the pipeline's connections and assets").red()
        );
    }

    if let Some(error) = status.error() {
        for detail in &error.errors {
            println!(
                "  {} {}",
                style(format!("[{}]", detail.code)).red(),
                detail.message
            );
        }
        if let Some(trace) = &error.trace {
            println!("  Trace: {}", style(trace).dim());
        }
    }
}
