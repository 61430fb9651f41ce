//! Flowrun Command-Line Interface
//!
//! The main entry point for the `flowrun` tool: submit pipeline runs to a
//! data-flow service, watch them settle, cancel them and read their logs.
//!
//! ```text
//! flowrun submit --pipeline nightly-load --wait
//! flowrun wait --pipeline nightly-load run-1 run-2 --backoff exponential
//! flowrun logs --pipeline nightly-load run-1 --all
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::{ConnectionArgs, PollArgs, Settings};
use commands::{cancel, logs, runs, status, submit, version, wait};

/// Flowrun - drive data-flow pipeline runs from the command line
#[derive(Parser)]
#[command(name = "flowrun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger a run of a pipeline
    Submit {
        /// Pipeline ID
        #[arg(short, long)]
        pipeline: String,

        /// Wait for the run to settle
        #[arg(short, long)]
        wait: bool,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// Show the current status of a run
    Status {
        /// Pipeline ID
        #[arg(short, long)]
        pipeline: String,

        /// Run ID
        run_id: String,
    },

    /// Wait for one or more runs to settle
    Wait {
        /// Pipeline ID
        #[arg(short, long)]
        pipeline: String,

        /// Run IDs
        #[arg(required = true)]
        run_ids: Vec<String>,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// Request cancellation of a run
    Cancel {
        /// Pipeline ID
        #[arg(short, long)]
        pipeline: String,

        /// Run ID
        run_id: String,
    },

    /// Print a run's log
    Logs {
        /// Pipeline ID
        #[arg(short, long)]
        pipeline: String,

        /// Run ID
        run_id: String,

        /// Index of the first entry
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Entries per page
        #[arg(short, long, default_value = "100")]
        limit: u32,

        /// Read every page
        #[arg(short, long)]
        all: bool,
    },

    /// List the runs of a pipeline
    Runs {
        /// Pipeline ID
        #[arg(short, long)]
        pipeline: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    let result = execute(cli.command, &cli.connection).await;

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

async fn execute(command: Commands, connection: &ConnectionArgs) -> anyhow::Result<()> {
    let no_poll = PollArgs::default();

    match command {
        Commands::Submit {
            pipeline,
            wait: do_wait,
            poll,
        } => {
            let settings = Settings::resolve(connection, &poll)?;
            submit::execute(&settings, &pipeline, do_wait).await
        }

        Commands::Status { pipeline, run_id } => {
            let settings = Settings::resolve(connection, &no_poll)?;
            status::execute(&settings, &pipeline, &run_id).await
        }

        Commands::Wait {
            pipeline,
            run_ids,
            poll,
        } => {
            let settings = Settings::resolve(connection, &poll)?;
            wait::execute(&settings, &pipeline, &run_ids).await
        }

        Commands::Cancel { pipeline, run_id } => {
            let settings = Settings::resolve(connection, &no_poll)?;
            cancel::execute(&settings, &pipeline, &run_id).await
        }

        Commands::Logs {
            pipeline,
            run_id,
            offset,
            limit,
            all,
        } => {
            let settings = Settings::resolve(connection, &no_poll)?;
            logs::execute(&settings, &pipeline, &run_id, offset, limit, all).await
        }

        Commands::Runs { pipeline } => {
            let settings = Settings::resolve(connection, &no_poll)?;
            runs::execute(&settings, &pipeline).await
        }

        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
