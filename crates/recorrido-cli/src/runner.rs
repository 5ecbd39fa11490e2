//! Wires CLI arguments to the harness: session setup, flow resolution,
//! run execution, and artifact output.

use crate::commands::{RunFlowArgs, ValidateArgs};
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use recorrido::booking;
use recorrido::{
    BrowserSession, Flow, FlowFile, FlowRun, FlowRunner, Reporter, RunOptions, RunStatus,
    SessionConfig,
};

/// Resolve the flow to run from `--flow` or `--flow-file`.
async fn resolve_flow(args: &RunFlowArgs) -> CliResult<Flow> {
    match (&args.flow, &args.flow_file) {
        (Some(name), None) => booking::builtin_flow(name).ok_or_else(|| CliError::UnknownFlow {
            name: name.clone(),
        }),
        (None, Some(path)) => Ok(FlowFile::load(path).await?.into_flow()?),
        _ => Err(CliError::config(
            "exactly one of --flow or --flow-file is required",
        )),
    }
}

/// Failed steps that should have produced a failure screenshot but did
/// not (capture is best-effort; a dead page loses the artifact)
fn steps_missing_screenshots(run: &FlowRun) -> Vec<&str> {
    run.steps
        .iter()
        .filter(|result| result.is_failed() && result.screenshot_path.is_none())
        .map(|result| result.step.name.as_str())
        .collect()
}

fn run_options(args: &RunFlowArgs) -> RunOptions {
    let mut options = RunOptions::new().with_max_flow_retries(args.max_flow_retries);
    if args.continue_on_failure {
        options = options.with_continue_on_failure();
    }
    if let Some(deadline_ms) = args.run_deadline_ms {
        options = options.with_run_deadline_ms(deadline_ms);
    }
    options
}

/// Execute the run-flow command end to end.
///
/// # Errors
/// Returns configuration, launch, and navigation errors; a run that
/// finishes with a non-passing status surfaces as `FlowDidNotPass` so
/// the process exit code reflects the result.
pub async fn execute_run_flow(
    args: &RunFlowArgs,
    reporter: &mut ProgressReporter,
) -> CliResult<()> {
    let flow = resolve_flow(args).await?;

    let config = SessionConfig::default()
        .with_headless(args.headless)
        .with_slow_mo_ms(args.slow_mo_ms);
    let session = BrowserSession::open(config).await?;

    if let Err(e) = session.navigate(&args.base_url, RunFlowArgs::NAVIGATION_TIMEOUT_MS).await {
        session.close().await;
        return Err(e.into());
    }

    let run_reporter = if args.no_screenshots {
        Reporter::disabled()
    } else {
        Reporter::new(&args.screenshot_dir)
    };

    reporter.start_flow(flow.name());
    let run = FlowRunner::new()
        .with_options(run_options(args))
        .with_reporter(run_reporter)
        .run(&flow, &session)
        .await?;
    reporter.finish_flow();

    let summary = Reporter::summarize(&run);
    reporter.run_report(&run, &summary);

    if !args.no_screenshots {
        for step in steps_missing_screenshots(&run) {
            reporter.warning(&format!(
                "no failure screenshot captured for step '{step}'"
            ));
        }
    }

    if let Some(ref path) = args.json {
        Reporter::write_json(&run, path).await?;
        reporter.info(&format!("run record written to {}", path.display()));
    }

    if run.status == RunStatus::Passed {
        Ok(())
    } else {
        Err(CliError::FlowDidNotPass {
            flow: run.flow,
            status: run.status.to_string(),
        })
    }
}

/// List the built-in flows with their step counts.
pub fn execute_list_flows(reporter: &ProgressReporter) {
    for name in booking::builtin_flow_names() {
        if let Some(flow) = booking::builtin_flow(name) {
            reporter.info(&format!("{name}  ({} steps)", flow.len()));
        }
    }
}

/// Validate a flow file without touching a browser.
///
/// # Errors
/// Returns parse and validation errors for the file.
pub async fn execute_validate(args: &ValidateArgs, reporter: &ProgressReporter) -> CliResult<()> {
    let file = FlowFile::load(&args.file).await?;
    let flow = file.into_flow()?;
    reporter.info(&format!(
        "{}: flow '{}' is valid ({} steps)",
        args.file.display(),
        flow.name(),
        flow.len()
    ));
    Ok(())
}
