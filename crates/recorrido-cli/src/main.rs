//! Recorrido CLI: run booking flows against a live site
//!
//! ## Usage
//!
//! ```bash
//! recorrido run-flow --flow booking-cash --base-url https://staging.example.com
//! recorrido run-flow --flow-file flows/booking.yaml --continue-on-failure
//! recorrido list-flows
//! recorrido validate flows/booking.yaml
//! ```
//!
//! `TARGET_BASE_URL`, `HEADLESS`, and `SCREENSHOT_DIR` are read from the
//! environment when the matching flags are omitted. Exit code is 0 only
//! when the run passed.

use clap::Parser;
use recorrido_cli::{Cli, CliResult, Commands, ProgressReporter};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let mut reporter = ProgressReporter::new(console::colors_enabled(), cli.quiet);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| recorrido_cli::CliError::config(format!("failed to create runtime: {e}")))?;

    match cli.command {
        Commands::RunFlow(args) => {
            rt.block_on(recorrido_cli::execute_run_flow(&args, &mut reporter))
        }
        Commands::ListFlows => {
            recorrido_cli::execute_list_flows(&reporter);
            Ok(())
        }
        Commands::Validate(args) => {
            rt.block_on(recorrido_cli::execute_validate(&args, &reporter))
        }
    }
}

/// Route harness tracing to stderr; `-v` raises the default level,
/// `RUST_LOG` still wins when set.
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
