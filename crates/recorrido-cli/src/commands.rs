//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Recorrido: run booking flows against a live site and export run reports
#[derive(Parser, Debug)]
#[command(name = "recorrido")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a flow against a live site
    RunFlow(RunFlowArgs),

    /// List the built-in flows
    ListFlows,

    /// Validate a flow file without running it
    Validate(ValidateArgs),
}

/// Arguments for the run-flow command
#[derive(Parser, Debug)]
pub struct RunFlowArgs {
    /// Name of a built-in flow to run
    #[arg(long, conflicts_with = "flow_file")]
    pub flow: Option<String>,

    /// Path to a flow definition file (.yaml, .yml, or .json)
    #[arg(long)]
    pub flow_file: Option<PathBuf>,

    /// Base URL of the site under test
    #[arg(long, env = "TARGET_BASE_URL")]
    pub base_url: String,

    /// Run the browser headless (accepts 1/true/yes or 0/false/no)
    #[arg(long, env = "HEADLESS", default_value = "true", value_parser = parse_bool_flag, action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Directory for failure screenshots
    #[arg(long, env = "SCREENSHOT_DIR", default_value = "screenshots")]
    pub screenshot_dir: PathBuf,

    /// Disable failure screenshot capture
    #[arg(long)]
    pub no_screenshots: bool,

    /// Keep executing remaining steps after a failed step
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Whole-flow re-runs after a non-passing run
    #[arg(long, default_value = "0")]
    pub max_flow_retries: u32,

    /// Abort the run after this many milliseconds
    #[arg(long)]
    pub run_deadline_ms: Option<u64>,

    /// Slow every page action down by this many milliseconds (debugging)
    #[arg(long, default_value = "0")]
    pub slow_mo_ms: u64,

    /// Write the run record as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,
}

impl RunFlowArgs {
    /// Navigation timeout for the initial page load (30s)
    pub const NAVIGATION_TIMEOUT_MS: u64 = 30_000;
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Flow file to validate
    pub file: PathBuf,
}

/// Parse a permissive boolean flag.
///
/// `HEADLESS` comes from shell environments where people write `1`,
/// `yes`, or `TRUE` interchangeably; reject anything else loudly rather
/// than guessing.
fn parse_bool_flag(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(format!(
            "expected one of 1/true/yes/0/false/no, got '{other}'"
        )),
    }
}
