//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - data-flow pipeline run client",
        style("Flowrun").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  flowrun-core          Run model, state machine and poller");
    println!("  flowrun-adapter-http  HTTP+JSON service binding");
    println!("  flowrun-cli           Command-line interface");
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
