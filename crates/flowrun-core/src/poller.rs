//! Run status poller.
//!
//! Drives a run through its lifecycle on behalf of a caller: submission,
//! point-in-time status reads, waiting for a terminal state, cancellation
//! and log paging. The remote engine owns the run; the poller only
//! observes it, retrying its own transient I/O failures with backoff.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, instrument, warn};

use crate::api::RunsApi;
use crate::config::{PollConfig, RetryPolicy};
use crate::error::{FlowError, FlowResult};
use crate::logs::{LogEntry, LogPage};
use crate::run::{PipelineId, RunHandle, RunRecord, RunState, RunStatus};

/// Maximum number of runs whose last state is remembered before terminal
/// entries are evicted.
const MAX_CACHED_RUNS: usize = 10_000;

/// What the poller remembers about a run between calls.
#[derive(Debug, Clone)]
struct Observed {
    state: RunState,
    /// Seen going from `starting` straight to `error`.
    preflight: bool,
}

/// Observes runs of a data-flow service until they settle.
///
/// Each poller is bound to one [`RunsApi`] and its own configuration;
/// several pollers can coexist. Cloning is cheap and clones share the
/// observed-state cache.
#[derive(Clone)]
pub struct RunPoller {
    api: Arc<dyn RunsApi>,
    poll: PollConfig,
    retry: RetryPolicy,
    observed: Arc<Mutex<FxHashMap<String, Observed>>>,
}

impl RunPoller {
    /// Create a poller with default polling and retry settings.
    pub fn new(api: Arc<dyn RunsApi>) -> Self {
        Self {
            api,
            poll: PollConfig::default(),
            retry: RetryPolicy::default(),
            observed: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    /// Set the settings used by [`wait_for_terminal`](Self::wait_for_terminal).
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Set the retry policy for transient failures.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Polling settings in use.
    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// The underlying service binding.
    pub fn api(&self) -> &dyn RunsApi {
        self.api.as_ref()
    }

    /// Trigger a run of `pipeline`.
    ///
    /// Returns as soon as the service has accepted the run. Not retried,
    /// since a repeated POST would start a second run.
    #[instrument(skip(self))]
    pub async fn submit(&self, pipeline: &PipelineId) -> FlowResult<RunHandle> {
        info!("Submitting run for pipeline {}", pipeline);
        let record = self.api.create_run(pipeline).await?;

        if *record.status.state() == RunState::Error {
            let message = record
                .status
                .error()
                .map(ToString::to_string)
                .unwrap_or_default();
            return Err(FlowError::Submission(message));
        }
        if *record.status.state() != RunState::Starting {
            debug!(
                "Run {} reported initial state {}",
                record.handle,
                record.status.state()
            );
        }

        self.observe(&record.handle, record.status.state()).await;
        info!("Run submitted: {}", record.handle);
        Ok(record.handle)
    }

    /// Read the current status of a run. Never waits for a state change.
    ///
    /// An `error` status observed directly after `starting` is flagged as a
    /// pre-flight rejection (see [`RunStatus::is_preflight_failure`]).
    #[instrument(skip(self))]
    pub async fn get_status(&self, run: &RunHandle) -> FlowResult<RunStatus> {
        let mut status = self
            .with_retry("get_status", || self.api.get_run(run))
            .await?;
        if self.observe(run, status.state()).await {
            status.mark_preflight();
        }
        Ok(status)
    }

    /// Wait until the run is terminal, using the poller's [`PollConfig`].
    pub async fn wait_for_terminal(&self, run: &RunHandle) -> FlowResult<RunStatus> {
        let poll = self.poll.clone();
        self.wait_for_terminal_with(run, &poll).await
    }

    /// Wait until the run is terminal.
    ///
    /// Returns the terminal status whether the run finished, failed or was
    /// stopped. Fails with [`FlowError::Timeout`] if `poll.timeout` elapses
    /// first; the run itself keeps executing.
    #[instrument(skip(self, poll))]
    pub async fn wait_for_terminal_with(
        &self,
        run: &RunHandle,
        poll: &PollConfig,
    ) -> FlowResult<RunStatus> {
        let start = Instant::now();
        let deadline = start + poll.timeout;
        let mut interval = poll.interval;

        loop {
            // Each poll, retries included, is bounded by what is left of the budget.
            let status = match timeout_at(deadline, self.get_status(run)).await {
                Ok(status) => status?,
                Err(_) => return Err(self.timeout_error(run, start).await),
            };
            let state = status.state();

            if status.is_terminal() {
                if status.is_preflight_failure() {
                    warn!("Run {} failed before execution started", run);
                }
                info!("Run {} reached {}", run, state);
                return Ok(status);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timeout_error(run, start).await);
            }

            let delay = interval.min(deadline - now);
            debug!("Run {} is {}, polling again in {:?}", run, state, delay);
            sleep(delay).await;
            interval = poll.backoff.next_interval(interval);
        }
    }

    async fn timeout_error(&self, run: &RunHandle, start: Instant) -> FlowError {
        FlowError::Timeout {
            run_id: run.run_id.to_string(),
            waited: start.elapsed(),
            last_state: self
                .last_observed(run)
                .await
                .unwrap_or(RunState::Starting),
        }
    }

    /// Wait for several runs concurrently.
    ///
    /// Results are returned in the order of `runs`.
    pub async fn wait_all(&self, runs: &[RunHandle]) -> Vec<FlowResult<RunStatus>> {
        join_all(runs.iter().map(|run| self.wait_for_terminal(run))).await
    }

    /// Request cancellation of a run.
    ///
    /// Advisory: the run may keep running briefly. A run that is already
    /// terminal or stopping is left alone and the call succeeds.
    #[instrument(skip(self))]
    pub async fn cancel(&self, run: &RunHandle) -> FlowResult<()> {
        let status = self.get_status(run).await?;
        if status.is_terminal() || *status.state() == RunState::Stopping {
            debug!("Run {} is {}, nothing to cancel", run, status.state());
            return Ok(());
        }

        match self.with_retry("cancel", || self.api.stop_run(run)).await {
            Ok(()) => {
                info!("Cancellation requested for run {}", run);
                Ok(())
            }
            Err(FlowError::Conflict(message)) => {
                // The run may have settled between the read and the request.
                let status = self.get_status(run).await?;
                if status.is_terminal() || *status.state() == RunState::Stopping {
                    debug!("Run {} settled as {} during cancel", run, status.state());
                    Ok(())
                } else {
                    Err(FlowError::Conflict(message))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Read one page of a run's log.
    #[instrument(skip(self))]
    pub async fn get_logs(&self, run: &RunHandle, offset: u64, limit: u32) -> FlowResult<LogPage> {
        self.with_retry("get_logs", || self.api.get_logs(run, offset, limit))
            .await
    }

    /// Read a run's whole log, `page_size` entries at a time.
    pub async fn all_logs(&self, run: &RunHandle, page_size: u32) -> FlowResult<Vec<LogEntry>> {
        let page_size = page_size.max(1);
        let mut entries = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.get_logs(run, offset, page_size).await?;
            // Advance from what was asked for, not what the service echoes.
            let fetched = page.entries.len() as u64;
            offset += fetched;
            entries.extend(page.entries);
            if fetched == 0 || offset >= page.total_count {
                return Ok(entries);
            }
        }
    }

    /// List the runs of a pipeline.
    #[instrument(skip(self))]
    pub async fn list_runs(&self, pipeline: &PipelineId) -> FlowResult<Vec<RunRecord>> {
        self.with_retry("list_runs", || self.api.list_runs(pipeline))
            .await
    }

    /// Last state observed for a run, if any.
    pub async fn last_observed(&self, run: &RunHandle) -> Option<RunState> {
        self.observed
            .lock()
            .await
            .get(&run.cache_key())
            .map(|o| o.state.clone())
    }

    /// Record an observed state, flagging anything the documented state
    /// machine cannot produce. Returns whether the run is a pre-flight
    /// rejection.
    async fn observe(&self, run: &RunHandle, state: &RunState) -> bool {
        if !state.is_known() {
            warn!("Run {} reported undocumented state '{}'", run, state);
        }

        let key = run.cache_key();
        let mut observed = self.observed.lock().await;
        let mut preflight = false;
        if let Some(previous) = observed.get(&key) {
            if !previous.state.can_reach(state) {
                warn!(
                    "Run {} made an undocumented transition {} -> {}",
                    run, previous.state, state
                );
            } else if previous.state != *state {
                debug!("Run {} moved {} -> {}", run, previous.state, state);
            }
            preflight = *state == RunState::Error
                && (previous.state == RunState::Starting
                    || (previous.state == RunState::Error && previous.preflight));
        }

        if observed.len() >= MAX_CACHED_RUNS && !observed.contains_key(&key) {
            observed.retain(|_, o| !o.state.is_terminal());
        }
        observed.insert(
            key,
            Observed {
                state: state.clone(),
                preflight,
            },
        );
        preflight
    }

    /// Run `op`, retrying transient failures according to the policy.
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut op: F) -> FlowResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FlowResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    if attempt >= self.retry.max_attempts {
                        return Err(FlowError::TransientIo {
                            operation: operation.to_string(),
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        "Retrying {} after transient failure (backoff {:?})",
                        operation,
                        backoff
                    );
                    sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
