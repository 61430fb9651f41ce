//! Wait command implementation.
//!
//! Poll one or more runs until they settle, then print their outcome.

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use flowrun_core::{FlowError, FlowResult, RunHandle, RunPoller, RunState, RunStatus};

use super::common::{Settings, print_status};

/// Execute the wait command.
pub async fn execute(settings: &Settings, pipeline: &str, run_ids: &[String]) -> Result<()> {
    let poller = settings.poller()?;
    let runs: Vec<RunHandle> = run_ids
        .iter()
        .map(|id| RunHandle::new(pipeline, id.as_str()))
        .collect();

    println!(
        "{} Waiting for {} run(s) of pipeline {} (timeout: {}s)",
        style("→").cyan().bold(),
        runs.len(),
        style(pipeline).dim(),
        poller.poll_config().timeout.as_secs()
    );

    let results = wait_with_spinner(&poller, &runs).await?;

    let mut unsuccessful = 0;
    for (run, result) in runs.iter().zip(results) {
        if !report(run, result) {
            unsuccessful += 1;
        }
    }

    if unsuccessful > 0 {
        anyhow::bail!(
            "{} of {} run(s) did not finish successfully",
            unsuccessful,
            runs.len()
        );
    }
    Ok(())
}

/// Wait for `runs` while a spinner shows the latest observed states.
pub async fn wait_with_spinner(
    poller: &RunPoller,
    runs: &[RunHandle],
) -> Result<Vec<FlowResult<RunStatus>>> {
    debug!(
        "Waiting on {} run(s) via {} every {:?}",
        runs.len(),
        poller.api().name(),
        poller.poll_config().interval
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Waiting for runs to settle...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let wait = poller.wait_all(runs);
    tokio::pin!(wait);
    let mut ticker = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            results = &mut wait => {
                spinner.finish_and_clear();
                return Ok(results);
            }
            _ = ticker.tick() => {
                spinner.set_message(progress_message(poller, runs).await);
            }
        }
    }
}

async fn progress_message(poller: &RunPoller, runs: &[RunHandle]) -> String {
    if let [run] = runs {
        return match poller.last_observed(run).await {
            Some(state) => format!("Run {} is {} ...", run.run_id, state),
            None => format!("Waiting for run {} ...", run.run_id),
        };
    }

    let mut settled = 0;
    for run in runs {
        if poller
            .last_observed(run)
            .await
            .is_some_and(|s| s.is_terminal())
        {
            settled += 1;
        }
    }
    format!("{settled}/{} runs settled ...", runs.len())
}

/// Print the outcome of one wait. Returns true if the run finished.
pub fn report(run: &RunHandle, result: FlowResult<RunStatus>) -> bool {
    match result {
        Ok(status) => {
            print_status(run, &status);
            *status.state() == RunState::Finished
        }
        Err(FlowError::Timeout {
            waited, last_state, ..
        }) => {
            println!(
                "{} Run {} is still {} after {}s. Use '{}' to check later.",
                style("✗").red().bold(),
                style(&run.run_id).dim(),
                last_state,
                waited.as_secs(),
                style(format!(
                    "flowrun status --pipeline {} {}",
                    run.pipeline_id, run.run_id
                ))
                .dim()
            );
            false
        }
        Err(e) => {
            println!(
                "{} Run {}: {}",
                style("✗").red().bold(),
                style(&run.run_id).dim(),
                e
            );
            false
        }
    }
}
