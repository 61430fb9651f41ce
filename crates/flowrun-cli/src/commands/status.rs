//! Status command implementation.
//!
//! Read the current status of a run once, without waiting.

use anyhow::Result;

use flowrun_core::RunHandle;

use super::common::{Settings, print_status};

/// Execute the status command.
pub async fn execute(settings: &Settings, pipeline: &str, run_id: &str) -> Result<()> {
    let poller = settings.poller()?;
    let run = RunHandle::new(pipeline, run_id);

    let status = poller.get_status(&run).await?;
    print_status(&run, &status);

    Ok(())
}
