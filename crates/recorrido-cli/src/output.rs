//! Terminal output for flow runs: step lines, spinners, summaries

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use recorrido::{FlowRun, StepOutcome, StepResult, Summary};
use std::time::Duration;

/// Progress and result reporting for the terminal
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Start a spinner while a flow runs
    pub fn start_flow(&mut self, flow: &str) {
        if self.quiet {
            return;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("running flow '{flow}'"));
        pb.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(pb);
    }

    /// Stop the spinner
    pub fn finish_flow(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    /// Print one step result line
    pub fn step_line(&self, result: &StepResult) {
        match result.outcome {
            StepOutcome::Passed => {
                if self.quiet {
                    return;
                }
                let prefix = if self.use_color {
                    style("✓").green().bold().to_string()
                } else {
                    "PASS".to_string()
                };
                let _ = self.term.write_line(&format!(
                    "{prefix} {} ({}ms)",
                    result.step.name, result.duration_ms
                ));
            }
            StepOutcome::Failed => {
                // Failures always print, even in quiet mode
                let prefix = if self.use_color {
                    style("✗").red().bold().to_string()
                } else {
                    "FAIL".to_string()
                };
                let reason = result.error.as_deref().unwrap_or("unknown error");
                let _ = self.term.write_line(&format!(
                    "{prefix} {} ({}ms): {reason}",
                    result.step.name, result.duration_ms
                ));
                if let Some(ref path) = result.screenshot_path {
                    let _ = self.term.write_line(&format!("    screenshot: {path}"));
                }
            }
            StepOutcome::Skipped => {
                if self.quiet {
                    return;
                }
                let prefix = if self.use_color {
                    style("-").dim().to_string()
                } else {
                    "SKIP".to_string()
                };
                let _ = self
                    .term
                    .write_line(&format!("{prefix} {} (skipped)", result.step.name));
            }
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(message);
    }

    /// Print the whole run: step lines plus the summary
    pub fn run_report(&self, run: &FlowRun, summary: &Summary) {
        for result in &run.steps {
            self.step_line(result);
        }
        self.summary(run, summary);
    }

    /// Print the run summary line
    pub fn summary(&self, run: &FlowRun, summary: &Summary) {
        if self.quiet && summary.failed == 0 {
            return;
        }

        let _ = self.term.write_line("");
        let duration_secs = summary.duration_ms as f64 / 1000.0;
        let status_text = run.status.to_string().to_uppercase();

        if self.use_color {
            let status_style = match status_text.as_str() {
                "PASSED" => Style::new().green().bold(),
                "ABORTED" => Style::new().yellow().bold(),
                _ => Style::new().red().bold(),
            };
            let _ = self.term.write_line(&format!(
                "{} {} in {:.2}s ({} passed, {} failed, {} skipped)",
                status_style.apply_to(&status_text),
                summary.flow,
                duration_secs,
                Style::new().green().apply_to(summary.passed),
                if summary.failed > 0 {
                    Style::new().red().bold().apply_to(summary.failed).to_string()
                } else {
                    summary.failed.to_string()
                },
                Style::new().yellow().apply_to(summary.skipped),
            ));
        } else {
            let _ = self.term.write_line(&format!(
                "{status_text} {} in {duration_secs:.2}s ({} passed, {} failed, {} skipped)",
                summary.flow, summary.passed, summary.failed, summary.skipped
            ));
        }

        for failure in &summary.failures {
            let _ = self.term.write_line(&format!("  failed {failure}"));
        }
    }
}
