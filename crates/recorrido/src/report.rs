//! Run reporting: step logs, failure screenshots, summaries, and JSON
//! export.
//!
//! Screenshot capture is best-effort by design: a capture failure is
//! logged and the original step failure stays the primary signal.

use crate::result::FlowResult;
use crate::runner::FlowRun;
use crate::session::BrowserSession;
use crate::step::{StepOutcome, StepResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Aggregated counts and failure reasons for one run.
///
/// Always holds: `total == passed + failed + skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Flow name
    pub flow: String,
    /// Total step results
    pub total: usize,
    /// Passed steps
    pub passed: usize,
    /// Failed steps
    pub failed: usize,
    /// Skipped steps
    pub skipped: usize,
    /// Total run duration in milliseconds
    pub duration_ms: u64,
    /// One `"step: error"` line per failed step, in order
    pub failures: Vec<String>,
}

/// Collects step outcomes and produces run artifacts
#[derive(Debug)]
pub struct Reporter {
    screenshot_dir: PathBuf,
    capture_on_failure: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Reporter {
    /// Reporter that writes failure screenshots under `screenshot_dir`
    #[must_use]
    pub fn new(screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            screenshot_dir: screenshot_dir.into(),
            capture_on_failure: true,
        }
    }

    /// Reporter that logs step outcomes but captures no artifacts
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            screenshot_dir: PathBuf::from("screenshots"),
            capture_on_failure: false,
        }
    }

    /// Record one step outcome.
    ///
    /// Logs a line per result; on a failed step, captures a screenshot
    /// named `<flow>-<step>-<timestamp>.png` before the result is
    /// appended to the run. Capture errors never mask the step failure.
    pub async fn on_step_complete(
        &self,
        flow: &str,
        result: &mut StepResult,
        session: &BrowserSession,
    ) {
        match result.outcome {
            StepOutcome::Passed => {
                tracing::info!(
                    flow,
                    step = %result.step.name,
                    duration_ms = result.duration_ms,
                    "step passed"
                );
            }
            StepOutcome::Failed => {
                tracing::warn!(
                    flow,
                    step = %result.step.name,
                    duration_ms = result.duration_ms,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "step failed"
                );
                if self.capture_on_failure {
                    match self.capture_screenshot(flow, &result.step.name, session).await {
                        Ok(path) => result.screenshot_path = Some(path),
                        Err(e) => {
                            tracing::warn!(
                                flow,
                                step = %result.step.name,
                                error = %e,
                                "failure screenshot could not be captured"
                            );
                        }
                    }
                }
            }
            StepOutcome::Skipped => {
                tracing::info!(flow, step = %result.step.name, "step skipped");
            }
        }
    }

    async fn capture_screenshot(
        &self,
        flow: &str,
        step: &str,
        session: &BrowserSession,
    ) -> FlowResult<String> {
        let png = session.driver().screenshot_png().await?;
        tokio::fs::create_dir_all(&self.screenshot_dir).await?;
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
        let filename = format!(
            "{}-{}-{}.png",
            sanitize(flow),
            sanitize(step),
            timestamp
        );
        let path = self.screenshot_dir.join(filename);
        tokio::fs::write(&path, png).await?;
        Ok(path.to_string_lossy().into_owned())
    }

    /// Compute pass/fail/skip counts and failure reasons for a run.
    ///
    /// Pure function over the run's step results.
    #[must_use]
    pub fn summarize(run: &FlowRun) -> Summary {
        let passed = run.steps.iter().filter(|r| r.is_passed()).count();
        let failed = run.steps.iter().filter(|r| r.is_failed()).count();
        let skipped = run
            .steps
            .iter()
            .filter(|r| r.outcome == StepOutcome::Skipped)
            .count();
        let failures = run
            .steps
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| {
                format!(
                    "{}: {}",
                    r.step.name,
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        Summary {
            flow: run.flow.clone(),
            total: run.steps.len(),
            passed,
            failed,
            skipped,
            duration_ms: run.duration_ms,
            failures,
        }
    }

    /// Serialize a run into stable, diffable JSON.
    ///
    /// # Errors
    /// Returns a JSON error if serialization fails.
    pub fn export_json(run: &FlowRun) -> FlowResult<String> {
        Ok(serde_json::to_string_pretty(run)?)
    }

    /// Parse a run back from its JSON export.
    ///
    /// Round-trips preserve step ordering, outcomes, and durations.
    ///
    /// # Errors
    /// Returns a JSON error on malformed input.
    pub fn parse_run(json: &str) -> FlowResult<FlowRun> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write a run's JSON export to a file.
    ///
    /// # Errors
    /// Returns serialization or I/O errors.
    pub async fn write_json(run: &FlowRun, path: &Path) -> FlowResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, Self::export_json(run)?).await?;
        Ok(())
    }
}

/// Keep filenames portable: alphanumerics and dashes only
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ScriptedPage;
    use crate::runner::{Flow, FlowRunner, RunOptions, RunStatus};
    use crate::session::SessionConfig;
    use crate::step::FlowStep;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use std::sync::Arc;

    fn session_over(page: Arc<ScriptedPage>) -> BrowserSession {
        BrowserSession::with_driver(SessionConfig::default(), page)
    }

    async fn run_flow(flow: &Flow, page: ScriptedPage, options: RunOptions) -> FlowRun {
        let session = session_over(Arc::new(page));
        FlowRunner::new()
            .with_options(options)
            .run(flow, &session)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn summary_accounts_for_every_step() {
        let flow = Flow::new("mixed")
            .step(FlowStep::click("a", "#a").with_timeout_ms(500))
            .step(FlowStep::click("b", "#b").with_timeout_ms(500))
            .step(FlowStep::click("c", "#c").with_timeout_ms(500));
        let page = ScriptedPage::new().with_element("#a", "");
        let run = run_flow(&flow, page, RunOptions::new()).await;

        let summary = Reporter::summarize(&run);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].starts_with("b:"));
    }

    #[tokio::test(start_paused = true)]
    async fn json_round_trip_preserves_the_run() {
        let flow = Flow::new("round-trip")
            .step(FlowStep::click("a", "#a").with_timeout_ms(500))
            .step(FlowStep::click("b", "#b").with_timeout_ms(500));
        let page = ScriptedPage::new().with_element("#a", "");
        let run = run_flow(&flow, page, RunOptions::new()).await;

        let json = Reporter::export_json(&run).unwrap();
        let parsed = Reporter::parse_run(&json).unwrap();

        assert_eq!(parsed, run);
        assert_eq!(parsed.id, run.id);
        assert_eq!(parsed.status, RunStatus::Failed);
        let outcomes: Vec<_> = parsed.steps.iter().map(|r| r.outcome).collect();
        let original: Vec<_> = run.steps.iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, original);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_screenshot_lands_in_the_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(
            ScriptedPage::new().with_screenshot_bytes(vec![0x89, b'P', b'N', b'G']),
        );
        let session = session_over(page);
        let flow = Flow::new("booking")
            .step(FlowStep::click("pick-first-time-slot", ".time-slot").with_timeout_ms(500));

        let run = FlowRunner::new()
            .with_reporter(Reporter::new(dir.path()))
            .run(&flow, &session)
            .await
            .unwrap();

        let path = run.steps[0].screenshot_path.as_deref().unwrap();
        assert!(path.contains("booking-pick-first-time-slot-"));
        assert!(path.ends_with(".png"));
        assert!(std::path::Path::new(path).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn screenshot_failure_does_not_mask_the_step_failure() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(ScriptedPage::new().with_failing_screenshots());
        let session = session_over(page);
        let flow =
            Flow::new("booking").step(FlowStep::click("confirm", "#confirm").with_timeout_ms(500));

        let run = FlowRunner::new()
            .with_reporter(Reporter::new(dir.path()))
            .run(&flow, &session)
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.steps[0].is_failed());
        assert!(run.steps[0].screenshot_path.is_none());
        // The original failure reason survives
        assert!(run.steps[0].error.as_deref().unwrap().contains("#confirm"));
    }

    #[tokio::test(start_paused = true)]
    async fn write_json_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let flow = Flow::new("tiny").step(FlowStep::click("a", "#a").with_timeout_ms(500));
        let page = ScriptedPage::new().with_element("#a", "");
        let run = run_flow(&flow, page, RunOptions::new()).await;

        let path = dir.path().join("reports/run.json");
        Reporter::write_json(&run, &path).await.unwrap();

        let parsed = Reporter::parse_run(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, run);
    }

    #[test]
    fn sanitize_strips_awkward_characters() {
        assert_eq!(sanitize("pay by cash?"), "pay-by-cash-");
        assert_eq!(sanitize("pick_slot-2"), "pick_slot-2");
    }

    proptest! {
        /// Accounting invariant: total equals the step count and the
        /// outcome counts always add up.
        #[test]
        fn summary_counts_always_add_up(
            pass_first in 0usize..4,
            fail in 0usize..2,
            trailing in 0usize..4,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            rt.block_on(async {
                let mut page = ScriptedPage::new();
                let mut flow = Flow::new("prop");
                for i in 0..pass_first {
                    let sel = format!("#ok-{i}");
                    page = page.with_element(&sel, "");
                    flow = flow.step(FlowStep::click(format!("ok-{i}"), sel.as_str()).with_timeout_ms(500));
                }
                for i in 0..fail {
                    flow = flow.step(
                        FlowStep::click(format!("bad-{i}"), "#missing").with_timeout_ms(500),
                    );
                }
                for i in 0..trailing {
                    let sel = format!("#tail-{i}");
                    page = page.with_element(&sel, "");
                    flow = flow.step(
                        FlowStep::click(format!("tail-{i}"), sel.as_str()).with_timeout_ms(500),
                    );
                }
                let run = run_flow(&flow, page, RunOptions::new()).await;
                let summary = Reporter::summarize(&run);

                prop_assert_eq!(summary.total, flow.len());
                prop_assert_eq!(
                    summary.passed + summary.failed + summary.skipped,
                    summary.total
                );
                prop_assert_eq!(summary.failed, summary.failures.len());
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
