//! Flow composition and the run state machine.
//!
//! A [`Flow`] is a named, ordered step sequence; prefixes are reused via
//! [`Flow::extended`] so variant journeys (pay by cash vs. pay by card)
//! share their common steps instead of copy-pasting them. The
//! [`FlowRunner`] drives a flow through a [`BrowserSession`] one step at a
//! time and produces a [`FlowRun`], an append-only result log with a
//! `running -> passed | failed | aborted` status machine.

use crate::executor::execute_step;
use crate::report::Reporter;
use crate::result::{FlowError, FlowResult};
use crate::session::BrowserSession;
use crate::step::{FlowStep, StepResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

// =============================================================================
// FLOW
// =============================================================================

/// A named, ordered sequence of steps modeling one user journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    name: String,
    steps: Vec<FlowStep>,
}

impl Flow {
    /// Create an empty flow
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Create a flow from a step list
    #[must_use]
    pub fn with_steps(name: impl Into<String>, steps: Vec<FlowStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: FlowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Build a new flow that reuses this flow's steps as a prefix.
    ///
    /// This is the sharing mechanism for journey variants: define "reach
    /// payment" once and extend it per payment method.
    #[must_use]
    pub fn extended(&self, name: impl Into<String>, steps: Vec<FlowStep>) -> Self {
        let mut combined = self.steps.clone();
        combined.extend(steps);
        Self {
            name: name.into(),
            steps: combined,
        }
    }

    /// Flow name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[FlowStep] {
        &self.steps
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the flow has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Validate every step definition and check name uniqueness.
    ///
    /// # Errors
    /// Returns the first `FlowError::InvalidStep` found; invalid
    /// definitions are rejected before any browser interaction.
    pub fn validate(&self) -> FlowResult<()> {
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            step.validate()?;
            if !seen.insert(step.name.as_str()) {
                return Err(FlowError::InvalidStep {
                    step: step.name.clone(),
                    message: "duplicate step name within flow".to_string(),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// FLOW RUN
// =============================================================================

/// Run status state machine: `Running -> Passed | Failed | Aborted`.
///
/// `Aborted` is reserved for unrecoverable session conditions (launch
/// failure, closed session, deadline, concurrent access), never for an
/// ordinary step failure. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Steps are still executing
    Running,
    /// Every step passed
    Passed,
    /// At least one step failed
    Failed,
    /// The session died or the run was cancelled
    Aborted,
}

impl RunStatus {
    /// Whether this status is terminal
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        write!(f, "{label}")
    }
}

/// One execution of a flow: an append-only log of step results plus the
/// final status. Immutable once finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRun {
    /// Unique run identifier
    pub id: Uuid,
    /// Name of the flow that ran
    pub flow: String,
    /// Run start time (UTC)
    pub started_at: DateTime<Utc>,
    /// Run end time, set when the run finalizes
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Total wall-clock duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,
    /// Step results in execution order
    pub steps: Vec<StepResult>,
    /// Run status
    pub status: RunStatus,
}

impl FlowRun {
    fn new(flow: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            flow: flow.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
            steps: Vec::new(),
            status: RunStatus::Running,
        }
    }

    fn record(&mut self, result: StepResult) {
        debug_assert_eq!(self.status, RunStatus::Running);
        self.steps.push(result);
    }

    fn finalize(&mut self, halted_as: Option<RunStatus>, elapsed: Duration) {
        // Terminal states never retransition
        if self.status.is_terminal() {
            return;
        }
        self.status = match halted_as {
            Some(RunStatus::Aborted) => RunStatus::Aborted,
            _ if self.steps.iter().any(StepResult::is_failed) => RunStatus::Failed,
            _ => RunStatus::Passed,
        };
        self.finished_at = Some(Utc::now());
        self.duration_ms = elapsed.as_millis() as u64;
    }

    /// Whether the run passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }
}

// =============================================================================
// RUN OPTIONS AND RUNNER
// =============================================================================

/// Runner policy knobs
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Keep executing after a failed step (diagnostic runs)
    pub continue_on_failure: bool,
    /// Whole-flow re-runs after a non-passing run (default 0; the runner
    /// never retries flows on its own)
    pub max_flow_retries: u32,
    /// Whole-run deadline; when exceeded the session is closed and the
    /// run finalizes `Aborted`
    pub run_deadline_ms: Option<u64>,
}

impl RunOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep executing remaining steps after a failure
    #[must_use]
    pub const fn with_continue_on_failure(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }

    /// Set the whole-flow retry budget
    #[must_use]
    pub const fn with_max_flow_retries(mut self, retries: u32) -> Self {
        self.max_flow_retries = retries;
        self
    }

    /// Set a whole-run deadline in milliseconds
    #[must_use]
    pub const fn with_run_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.run_deadline_ms = Some(deadline_ms);
        self
    }
}

/// Drives flows through a browser session and produces run records
#[derive(Debug, Default)]
pub struct FlowRunner {
    options: RunOptions,
    reporter: Reporter,
}

impl FlowRunner {
    /// Create a runner with default options and a reporter that logs but
    /// captures no artifacts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set runner options
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the reporter (enables failure screenshots)
    #[must_use]
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Execute a flow against a session.
    ///
    /// Steps run strictly in order. A failed step marks the remaining
    /// steps `Skipped` and the run `Failed` unless `continue_on_failure`
    /// is set; session-fatal failures abort instead. The session is
    /// closed before returning on every path, success or not.
    ///
    /// # Errors
    /// Only definition-time validation failures surface as `Err`;
    /// expected step failures are encoded in the returned [`FlowRun`].
    pub async fn run(&self, flow: &Flow, session: &BrowserSession) -> FlowResult<FlowRun> {
        if let Err(e) = flow.validate() {
            session.close().await;
            return Err(e);
        }

        let mut run = self.run_once(flow, session).await;
        let mut flow_attempt: u32 = 0;
        while run.status != RunStatus::Passed
            && flow_attempt < self.options.max_flow_retries
            && !session.is_closed()
        {
            flow_attempt += 1;
            tracing::info!(
                flow = %flow.name(),
                attempt = flow_attempt + 1,
                "re-running flow after non-passing run"
            );
            run = self.run_once(flow, session).await;
        }

        session.close().await;
        Ok(run)
    }

    async fn run_once(&self, flow: &Flow, session: &BrowserSession) -> FlowRun {
        let started = Instant::now();
        let mut run = FlowRun::new(flow.name());
        let deadline = self
            .options
            .run_deadline_ms
            .map(|ms| started + Duration::from_millis(ms));
        // Once set, the remaining steps are recorded as skipped
        let mut halted_as: Option<RunStatus> = None;

        for step in flow.steps() {
            if halted_as.is_some() {
                run.record(StepResult::skipped(step.clone()));
                continue;
            }
            if session.is_closed() {
                // Cancellation observed between steps
                halted_as = Some(RunStatus::Aborted);
                run.record(StepResult::skipped(step.clone()));
                continue;
            }

            let step_started = Instant::now();
            let mut result = match self.bounded_step(step, session, deadline).await {
                Some(result) => result,
                None => {
                    // Run deadline exhausted before or during this step
                    session.close().await;
                    halted_as = Some(RunStatus::Aborted);
                    let deadline_err = FlowError::FlowAborted {
                        message: format!(
                            "run deadline of {}ms exceeded at step '{}'",
                            self.options.run_deadline_ms.unwrap_or(0),
                            step.name
                        ),
                    };
                    run.record(StepResult::failed(
                        step.clone(),
                        step_started.elapsed(),
                        &deadline_err,
                    ));
                    continue;
                }
            };

            self.reporter
                .on_step_complete(flow.name(), &mut result, session)
                .await;

            let failed = result.is_failed();
            let aborts = result.aborts_run();
            run.record(result);

            if aborts {
                halted_as = Some(RunStatus::Aborted);
            } else if failed && !self.options.continue_on_failure {
                halted_as = Some(RunStatus::Failed);
            }
        }

        run.finalize(halted_as, started.elapsed());
        tracing::info!(
            flow = %run.flow,
            run_id = %run.id,
            status = %run.status,
            steps = run.steps.len(),
            duration_ms = run.duration_ms,
            "flow run finished"
        );
        run
    }

    /// Execute one step, bounded by the remaining run deadline.
    ///
    /// Returns `None` when the deadline is already spent or fires
    /// mid-step.
    async fn bounded_step(
        &self,
        step: &FlowStep,
        session: &BrowserSession,
        deadline: Option<Instant>,
    ) -> Option<StepResult> {
        match deadline {
            None => Some(execute_step(session, step).await),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return None;
                }
                tokio::time::timeout(remaining, execute_step(session, step))
                    .await
                    .ok()
            }
        }
    }
}
