//! Flow step definitions and per-step results.
//!
//! A [`FlowStep`] is one atomic page interaction with an explicit timeout
//! and retry budget. Steps are validated when a flow is assembled and are
//! immutable afterwards; execution produces an append-only [`StepResult`].

use crate::result::{ErrorKind, FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-attempt timeout (10 seconds)
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;

/// Default retry budget (no retries)
pub const DEFAULT_STEP_RETRIES: u32 = 0;

// =============================================================================
// SELECTOR
// =============================================================================

/// An ordered list of candidate CSS selectors.
///
/// Resolution tries candidates in declaration order and acts on the first
/// candidate with a match (match index 0). The fallback chain is part of
/// the step definition, never ad-hoc runtime branching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SelectorRepr", into = "Vec<String>")]
pub struct Selector {
    /// Candidate selectors, tried in order
    candidates: Vec<String>,
}

impl From<Selector> for Vec<String> {
    fn from(selector: Selector) -> Self {
        selector.candidates
    }
}

/// Accepts either a bare selector string or a candidate list in flow files.
#[derive(Deserialize)]
#[serde(untagged)]
enum SelectorRepr {
    One(String),
    Many(Vec<String>),
}

impl From<SelectorRepr> for Selector {
    fn from(repr: SelectorRepr) -> Self {
        match repr {
            SelectorRepr::One(s) => Self {
                candidates: vec![s],
            },
            SelectorRepr::Many(candidates) => Self { candidates },
        }
    }
}

impl Selector {
    /// Create a selector with a single candidate
    #[must_use]
    pub fn new(css: impl Into<String>) -> Self {
        Self {
            candidates: vec![css.into()],
        }
    }

    /// Create a selector from an ordered candidate list
    #[must_use]
    pub fn any<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a fallback candidate
    #[must_use]
    pub fn or(mut self, css: impl Into<String>) -> Self {
        self.candidates.push(css.into());
        self
    }

    /// Candidates in resolution order
    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Whether the candidate list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.candidates.join(" | "))
    }
}

impl From<&str> for Selector {
    fn from(css: &str) -> Self {
        Self::new(css)
    }
}

// =============================================================================
// ACTIONS AND POST-CONDITIONS
// =============================================================================

/// The interaction a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Click the first element matching the resolved selector
    Click,
    /// Clear and type into an input (requires `value`)
    Fill,
    /// Choose an option in a `<select>` (requires `value`)
    Select,
    /// Wait until any candidate selector matches
    WaitForSelector,
    /// Evaluate an in-page script (script carried in `value`)
    Evaluate,
}

impl StepAction {
    /// Action name as it appears in flow files and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Select => "select",
            Self::WaitForSelector => "wait_for_selector",
            Self::Evaluate => "evaluate",
        }
    }

    /// Whether this action needs a `value` in the step definition
    #[must_use]
    pub const fn requires_value(&self) -> bool {
        matches!(self, Self::Fill | Self::Select | Self::Evaluate)
    }
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Explicit page-state assertion evaluated after a step's action.
///
/// Replaces the ad-hoc success heuristics of throwaway probe scripts
/// (global flags, console-log scraping) with declarative checks. A failed
/// post-condition surfaces as `UnexpectedState` and is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostCondition {
    /// Element must be present
    ElementExists {
        /// CSS selector to check
        selector: String,
    },
    /// Element must be absent (e.g. a modal that should have closed)
    ElementAbsent {
        /// CSS selector to check
        selector: String,
    },
    /// Element text must contain a substring
    TextContains {
        /// CSS selector to read
        selector: String,
        /// Required substring
        substring: String,
    },
    /// Current URL must contain a fragment
    UrlContains {
        /// Required URL fragment
        fragment: String,
    },
    /// In-page expression must evaluate to `true`
    ScriptTrue {
        /// JavaScript expression
        expression: String,
    },
}

impl PostCondition {
    /// Human-readable description for logs and error messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ElementExists { selector } => format!("element exists: {selector}"),
            Self::ElementAbsent { selector } => format!("element absent: {selector}"),
            Self::TextContains {
                selector,
                substring,
            } => format!("text of {selector} contains '{substring}'"),
            Self::UrlContains { fragment } => format!("url contains '{fragment}'"),
            Self::ScriptTrue { expression } => format!("script is true: {expression}"),
        }
    }
}

// =============================================================================
// FLOW STEP
// =============================================================================

/// One named, retryable unit of page interaction.
///
/// Invariants enforced by [`FlowStep::validate`]: `timeout_ms > 0`, a
/// non-empty selector candidate list, and a `value` for actions that
/// require one. Retries apply only to transient failures; exhausting the
/// budget always yields a failed result, never a silent continue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    /// Step name, unique within a flow
    pub name: String,
    /// Interaction to perform
    pub action: StepAction,
    /// Target selector with optional fallback candidates
    pub target: Selector,
    /// Action payload (fill text, select option, script source)
    #[serde(default)]
    pub value: Option<String>,
    /// Per-attempt timeout in milliseconds (must be > 0)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Additional attempts after the first failure
    #[serde(default)]
    pub retries: u32,
    /// Page-state assertion checked after a successful action
    #[serde(default)]
    pub post_condition: Option<PostCondition>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

impl FlowStep {
    /// Define a click step
    #[must_use]
    pub fn click(name: impl Into<String>, target: impl Into<Selector>) -> Self {
        Self::new(name, StepAction::Click, target, None)
    }

    /// Define a fill step
    #[must_use]
    pub fn fill(
        name: impl Into<String>,
        target: impl Into<Selector>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(name, StepAction::Fill, target, Some(value.into()))
    }

    /// Define a select-option step
    #[must_use]
    pub fn select(
        name: impl Into<String>,
        target: impl Into<Selector>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(name, StepAction::Select, target, Some(value.into()))
    }

    /// Define a wait-for-selector step
    #[must_use]
    pub fn wait_for(name: impl Into<String>, target: impl Into<Selector>) -> Self {
        Self::new(name, StepAction::WaitForSelector, target, None)
    }

    /// Define an evaluate step running an in-page script
    #[must_use]
    pub fn evaluate(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self::new(
            name,
            StepAction::Evaluate,
            Selector::new("html"),
            Some(script.into()),
        )
    }

    fn new(
        name: impl Into<String>,
        action: StepAction,
        target: impl Into<Selector>,
        value: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            action,
            target: target.into(),
            value,
            timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            retries: DEFAULT_STEP_RETRIES,
            post_condition: None,
        }
    }

    /// Set the per-attempt timeout in milliseconds
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the retry budget (additional attempts after the first)
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Attach a post-condition checked after the action succeeds
    #[must_use]
    pub fn with_post_condition(mut self, post_condition: PostCondition) -> Self {
        self.post_condition = Some(post_condition);
        self
    }

    /// Per-attempt timeout as a `Duration`
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Total attempts this step may make (`retries + 1`)
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Check the step definition invariants.
    ///
    /// # Errors
    /// Returns `FlowError::InvalidStep` for a zero timeout, an empty
    /// selector list, an empty name, or a missing required value. A zero
    /// timeout is rejected here, never treated as "no timeout".
    pub fn validate(&self) -> FlowResult<()> {
        if self.name.trim().is_empty() {
            return Err(FlowError::InvalidStep {
                step: "<unnamed>".to_string(),
                message: "step name must not be empty".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(FlowError::InvalidStep {
                step: self.name.clone(),
                message: "timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.target.is_empty() {
            return Err(FlowError::InvalidStep {
                step: self.name.clone(),
                message: "selector candidate list must not be empty".to_string(),
            });
        }
        if self.action.requires_value() && self.value.as_deref().unwrap_or("").is_empty() {
            return Err(FlowError::InvalidStep {
                step: self.name.clone(),
                message: format!("action '{}' requires a value", self.action),
            });
        }
        Ok(())
    }
}

// =============================================================================
// STEP RESULTS
// =============================================================================

/// Outcome of one executed (or skipped) step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Action and post-condition succeeded
    Passed,
    /// Retry budget exhausted or a non-retryable error occurred
    Failed,
    /// Not executed because an earlier step failed or the run aborted
    Skipped,
}

impl StepOutcome {
    /// Outcome label as printed by the CLI
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of one step execution, appended to a run's result log.
///
/// Never mutated after the reporter finalizes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// The step definition that was executed
    pub step: FlowStep,
    /// Execution outcome
    pub outcome: StepOutcome,
    /// Wall-clock duration across all attempts, in milliseconds
    pub duration_ms: u64,
    /// Error message for failed steps
    #[serde(default)]
    pub error: Option<String>,
    /// Machine-readable error classification
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    /// Screenshot captured on failure, if any
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

impl StepResult {
    /// Record a passed step
    #[must_use]
    pub fn passed(step: FlowStep, duration: Duration) -> Self {
        Self {
            step,
            outcome: StepOutcome::Passed,
            duration_ms: duration.as_millis() as u64,
            error: None,
            error_kind: None,
            screenshot_path: None,
        }
    }

    /// Record a failed step
    #[must_use]
    pub fn failed(step: FlowStep, duration: Duration, error: &FlowError) -> Self {
        Self {
            step,
            outcome: StepOutcome::Failed,
            duration_ms: duration.as_millis() as u64,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            screenshot_path: None,
        }
    }

    /// Record a step that never ran
    #[must_use]
    pub fn skipped(step: FlowStep) -> Self {
        Self {
            step,
            outcome: StepOutcome::Skipped,
            duration_ms: 0,
            error: None,
            error_kind: None,
            screenshot_path: None,
        }
    }

    /// Whether the step passed
    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.outcome == StepOutcome::Passed
    }

    /// Whether the step failed
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.outcome == StepOutcome::Failed
    }

    /// Whether this failure invalidates the session
    #[must_use]
    pub fn aborts_run(&self) -> bool {
        self.error_kind.is_some_and(|k| k.aborts_run())
    }
}
