//! Runs command implementation.
//!
//! List the runs of a pipeline.

use anyhow::Result;
use console::style;

use flowrun_core::PipelineId;

use super::common::{Settings, styled_state};

/// Execute the runs command.
pub async fn execute(settings: &Settings, pipeline: &str) -> Result<()> {
    let poller = settings.poller()?;
    let pipeline = PipelineId::new(pipeline);

    let runs = poller.list_runs(&pipeline).await?;
    if runs.is_empty() {
        println!("No runs found for pipeline {pipeline}.");
        return Ok(());
    }

    println!("{} {} run(s):\n", style("→").cyan().bold(), runs.len());

    // Table header
    println!(
        "  {:<36}  {:<10}  {:<16}  {:>12}  {:>12}",
        style("RUN ID").bold(),
        style("STATE").bold(),
        style("CREATED").bold(),
        style("ROWS READ").bold(),
        style("ROWS WRITTEN").bold()
    );
    println!("  {}", "-".repeat(94));

    for record in &runs {
        let created = record
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let (read, written) = record
            .status
            .summary()
            .map(|s| (s.total_rows_read, s.total_rows_written))
            .unwrap_or_default();

        println!(
            "  {:<36}  {:<10}  {:<16}  {:>12}  {:>12}",
            style(&record.handle.run_id).dim(),
            styled_state(record.status.state()),
            created,
            read,
            written
        );
    }

    Ok(())
}
