//! Step execution with timeout, bounded retry, and post-condition checks.
//!
//! One attempt = selector resolution + action + declared post-condition,
//! all bounded by the step's `timeout_ms`. Only transient failures
//! (`SelectorNotFound`, `ActionTimeout`) consume the retry budget; there
//! are no hidden retries beyond the declared count, and exhausting the
//! budget always yields a failed result.

use crate::driver::PageDriver;
use crate::result::{FlowError, FlowResult};
use crate::session::BrowserSession;
use crate::step::{FlowStep, PostCondition, Selector, StepAction, StepResult};
use std::time::{Duration, Instant};

/// Fixed backoff between retry attempts (500ms)
pub const RETRY_BACKOFF_MS: u64 = 500;

/// Polling interval for `WaitForSelector` (50ms)
pub const WAIT_POLL_INTERVAL_MS: u64 = 50;

/// Execute one step against the session's page.
///
/// Claims the session's exclusive step slot first; overlapping executions
/// surface as a failed result with `ConcurrentAccess`, which aborts the
/// run. Never panics and never throws past the step boundary: every
/// outcome is encoded in the returned [`StepResult`].
pub async fn execute_step(session: &BrowserSession, step: &FlowStep) -> StepResult {
    let started = Instant::now();
    let _guard = match session.begin_step() {
        Ok(guard) => guard,
        Err(e) => return StepResult::failed(step.clone(), started.elapsed(), &e),
    };

    let driver = session.driver();
    let mut attempt: u32 = 0;
    let result = loop {
        attempt += 1;
        let attempt_result =
            tokio::time::timeout(step.timeout(), run_attempt(driver.as_ref(), step)).await;

        let err = match attempt_result {
            Ok(Ok(())) => break Ok(()),
            Ok(Err(e)) => e,
            Err(_) => timeout_error(step),
        };

        // Cancellation via session close wins over whatever the attempt
        // happened to report.
        let err = if session.is_closed() {
            FlowError::FlowAborted {
                message: format!("session closed during step '{}'", step.name),
            }
        } else {
            err
        };

        if err.is_retryable() && attempt < step.max_attempts() {
            tracing::debug!(
                step = %step.name,
                attempt,
                max_attempts = step.max_attempts(),
                error = %err,
                "step attempt failed, backing off"
            );
            tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS)).await;
            continue;
        }
        break Err(err);
    };

    match result {
        Ok(()) => StepResult::passed(step.clone(), started.elapsed()),
        Err(e) => StepResult::failed(step.clone(), started.elapsed(), &e),
    }
}

/// Classify an expired per-attempt timeout.
///
/// For `WaitForSelector` the element is simply absent after the timeout;
/// for every other action the element was found but the action did not
/// complete.
fn timeout_error(step: &FlowStep) -> FlowError {
    if step.action == StepAction::WaitForSelector {
        FlowError::SelectorNotFound {
            selector: step.target.to_string(),
        }
    } else {
        FlowError::ActionTimeout {
            step: step.name.clone(),
            timeout_ms: step.timeout_ms,
        }
    }
}

async fn run_attempt(driver: &dyn PageDriver, step: &FlowStep) -> FlowResult<()> {
    match step.action {
        StepAction::Click => {
            let selector = resolve(driver, &step.target).await?;
            driver.click(&selector).await?;
        }
        StepAction::Fill => {
            let selector = resolve(driver, &step.target).await?;
            driver.fill(&selector, required_value(step)?).await?;
        }
        StepAction::Select => {
            let selector = resolve(driver, &step.target).await?;
            driver
                .select_option(&selector, required_value(step)?)
                .await?;
        }
        StepAction::WaitForSelector => {
            // Bounded by the outer per-attempt timeout
            loop {
                if try_resolve(driver, &step.target).await?.is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
            }
        }
        StepAction::Evaluate => {
            driver.evaluate(required_value(step)?).await?;
        }
    }

    if let Some(post_condition) = &step.post_condition {
        check_post_condition(driver, post_condition).await?;
    }
    Ok(())
}

fn required_value(step: &FlowStep) -> FlowResult<&str> {
    step.value.as_deref().ok_or_else(|| FlowError::InvalidStep {
        step: step.name.clone(),
        message: format!("action '{}' requires a value", step.action),
    })
}

/// Resolve a selector to its first matching candidate.
///
/// Candidates are tried in declaration order; the step then acts on match
/// index 0 of the winning candidate.
async fn resolve(driver: &dyn PageDriver, selector: &Selector) -> FlowResult<String> {
    try_resolve(driver, selector)
        .await?
        .ok_or_else(|| FlowError::SelectorNotFound {
            selector: selector.to_string(),
        })
}

async fn try_resolve(driver: &dyn PageDriver, selector: &Selector) -> FlowResult<Option<String>> {
    for candidate in selector.candidates() {
        if driver.element_exists(candidate).await? {
            return Ok(Some(candidate.clone()));
        }
    }
    Ok(None)
}

/// Check a declared post-condition against the current page state.
///
/// # Errors
/// Returns `FlowError::UnexpectedState` (non-retryable) when the check
/// does not hold; driver errors propagate as-is.
pub async fn check_post_condition(
    driver: &dyn PageDriver,
    post_condition: &PostCondition,
) -> FlowResult<()> {
    let held = match post_condition {
        PostCondition::ElementExists { selector } => driver.element_exists(selector).await?,
        PostCondition::ElementAbsent { selector } => !driver.element_exists(selector).await?,
        PostCondition::TextContains {
            selector,
            substring,
        } => match driver.text_content(selector).await {
            Ok(text) => text.contains(substring.as_str()),
            Err(FlowError::SelectorNotFound { .. }) => false,
            Err(e) => return Err(e),
        },
        PostCondition::UrlContains { fragment } => {
            driver.current_url().await?.contains(fragment.as_str())
        }
        PostCondition::ScriptTrue { expression } => {
            driver.evaluate(expression).await?.as_bool().unwrap_or(false)
        }
    };

    if held {
        Ok(())
    } else {
        Err(FlowError::UnexpectedState {
            message: post_condition.describe(),
        })
    }
}
