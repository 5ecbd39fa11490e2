//! Recorrido CLI library
//!
//! Command definitions, terminal output, and the glue between CLI
//! arguments and the harness.

#![warn(missing_docs)]

mod commands;
mod error;
mod output;
mod runner;

pub use commands::{Cli, Commands, RunFlowArgs, ValidateArgs};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
pub use runner::{execute_list_flows, execute_run_flow, execute_validate};
