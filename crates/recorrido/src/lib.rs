//! Recorrido: Reusable Booking-Flow Browser Test Harness
//!
//! Recorrido (Spanish: "journey") replaces one-off browser probe scripts
//! with declarative flows: named sequences of retryable page steps that
//! run against a single browser session and produce a structured,
//! exportable run report.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   RECORRIDO Architecture                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌─────────┐  │
//! │  │ Flow     │   │ FlowRunner │   │ Browser  │   │ Headless│  │
//! │  │ (steps)  │──►│ + Reporter │──►│ Session  │──►│ Chromium│  │
//! │  └──────────┘   └────────────┘   └──────────┘   └─────────┘  │
//! │        ▲                                 │                    │
//! │        │                                 ▼ (tests)            │
//! │   flow files                        ScriptedPage              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `browser` feature enables real Chromium control over CDP; without
//! it, flows run against any [`PageDriver`] implementation, including the
//! deterministic [`ScriptedPage`] used throughout the test suite.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Prebuilt steps and flows for the booking journey
pub mod booking;
/// Page driver seam and the scripted in-memory page
pub mod driver;
/// Single-step execution with timeouts and retries
pub mod executor;
/// Flow definitions loaded from JSON or YAML files
pub mod flowfile;
/// Run summaries, logging, and failure screenshots
pub mod report;
/// Error taxonomy
pub mod result;
/// Flow model and the flow runner
pub mod runner;
/// Browser session lifecycle and the CDP backend
pub mod session;
/// Step model: actions, selectors, post-conditions, results
pub mod step;

pub use driver::{PageDriver, ScriptedPage};
pub use executor::execute_step;
pub use flowfile::{FlowFile, FLOW_FILE_VERSION};
pub use report::{Reporter, Summary};
pub use result::{ErrorKind, FlowError, FlowResult};
pub use runner::{Flow, FlowRun, FlowRunner, RunOptions, RunStatus};
pub use session::{BrowserSession, SessionConfig, StepGuard};
pub use step::{
    FlowStep, PostCondition, Selector, StepAction, StepOutcome, StepResult,
    DEFAULT_STEP_RETRIES, DEFAULT_STEP_TIMEOUT_MS,
};
