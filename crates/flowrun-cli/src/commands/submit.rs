//! Submit command implementation.
//!
//! Trigger a pipeline run and optionally wait for it to settle.

use anyhow::Result;
use console::style;

use flowrun_core::PipelineId;

use super::common::Settings;
use super::wait::{report, wait_with_spinner};

/// Execute the submit command.
pub async fn execute(settings: &Settings, pipeline: &str, wait: bool) -> Result<()> {
    let poller = settings.poller()?;
    let pipeline = PipelineId::new(pipeline);

    println!(
        "{} Submitting run for pipeline {}",
        style("→").cyan().bold(),
        style(&pipeline).dim()
    );

    let run = poller.submit(&pipeline).await?;

    println!(
        "{} Run submitted: {}",
        style("✓").green().bold(),
        style(&run.run_id).cyan()
    );

    if !wait {
        println!(
            "  Use {} to follow it.",
            style(format!("flowrun wait --pipeline {} {}", pipeline, run.run_id)).dim()
        );
        return Ok(());
    }

    let mut results = wait_with_spinner(&poller, std::slice::from_ref(&run)).await?;
    let result = results
        .pop()
        .ok_or_else(|| anyhow::anyhow!("No result for run {run}"))?;

    if !report(&run, result) {
        anyhow::bail!("Run {} did not finish successfully", run.run_id);
    }
    Ok(())
}
