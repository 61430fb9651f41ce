//! Logs command implementation.

use anyhow::Result;
use console::style;

use flowrun_core::{LogEntry, RunHandle};

use super::common::Settings;

/// Execute the logs command.
pub async fn execute(
    settings: &Settings,
    pipeline: &str,
    run_id: &str,
    offset: u64,
    limit: u32,
    all: bool,
) -> Result<()> {
    if limit == 0 {
        anyhow::bail!("--limit must be at least 1");
    }

    let poller = settings.poller()?;
    let run = RunHandle::new(pipeline, run_id);

    if all {
        let entries = poller.all_logs(&run, limit).await?;
        for entry in &entries {
            print_entry(entry);
        }
        println!("\n  {} entries", style(entries.len()).yellow());
        return Ok(());
    }

    let page = poller.get_logs(&run, offset, limit).await?;
    for entry in &page.entries {
        print_entry(entry);
    }

    println!(
        "\n  Showing {} of {} entries",
        style(page.entries.len()).yellow(),
        page.total_count
    );
    if page.has_more() {
        println!(
            "  Use {} for the next page.",
            style(format!("--offset {}", page.next_offset())).dim()
        );
    }

    Ok(())
}

fn print_entry(entry: &LogEntry) {
    let kind = match entry.event_type.as_str() {
        "error" => style(entry.event_type.as_str()).red(),
        "warning" => style(entry.event_type.as_str()).yellow(),
        _ => style(entry.event_type.as_str()).dim(),
    };
    println!(
        "{:>6}  {}  {:<8}  {}",
        style(entry.sequence).dim(),
        entry.date.format("%Y-%m-%d %H:%M:%S"),
        kind,
        entry.message_text
    );
}
