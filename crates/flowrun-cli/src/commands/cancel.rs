//! Cancel command implementation.

use anyhow::Result;
use console::style;

use flowrun_core::RunHandle;

use super::common::{Settings, styled_state};

/// Execute the cancel command.
pub async fn execute(settings: &Settings, pipeline: &str, run_id: &str) -> Result<()> {
    let poller = settings.poller()?;
    let run = RunHandle::new(pipeline, run_id);

    poller.cancel(&run).await?;

    // Cancellation is advisory; report where the run stands now.
    let status = poller.get_status(&run).await?;
    if status.is_terminal() {
        println!(
            "{} Run {} is {}",
            style("✓").green().bold(),
            style(&run.run_id).dim(),
            styled_state(status.state())
        );
    } else {
        println!(
            "{} Cancellation requested for run {} (now {})",
            style("→").cyan().bold(),
            style(&run.run_id).dim(),
            styled_state(status.state())
        );
        println!(
            "  Use {} to follow it.",
            style(format!("flowrun wait --pipeline {pipeline} {run_id}")).dim()
        );
    }

    Ok(())
}
