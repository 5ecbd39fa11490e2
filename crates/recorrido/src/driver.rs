//! Abstract page driver seam between the harness and a browser.
//!
//! The executor and runner only ever talk to a [`PageDriver`]. The real
//! CDP implementation lives in [`crate::session`] behind the `browser`
//! feature; [`ScriptedPage`] is an in-memory driver for unit and scenario
//! tests that need deterministic page behavior without a browser process.

use crate::result::{FlowError, FlowResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Async page operations the harness needs from a browser backend.
///
/// Every method reports failures through the harness error taxonomy so the
/// executor can classify retryable versus fatal conditions uniformly.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load a URL and wait for the page to be ready.
    ///
    /// Returns the final HTTP status of the main document when the
    /// backend can observe one, `None` otherwise (about:blank, backends
    /// without network visibility). The session maps non-2xx/3xx
    /// statuses to `Navigation` errors.
    async fn goto(&self, url: &str) -> FlowResult<Option<u16>>;

    /// Click the first element matching the selector
    async fn click(&self, selector: &str) -> FlowResult<()>;

    /// Clear and type into the first matching input
    async fn fill(&self, selector: &str, value: &str) -> FlowResult<()>;

    /// Choose an option by value in the first matching `<select>`
    async fn select_option(&self, selector: &str, value: &str) -> FlowResult<()>;

    /// Whether any element currently matches the selector
    async fn element_exists(&self, selector: &str) -> FlowResult<bool>;

    /// Text content of the first matching element
    async fn text_content(&self, selector: &str) -> FlowResult<String>;

    /// Evaluate an in-page expression and return its JSON value
    async fn evaluate(&self, expression: &str) -> FlowResult<Value>;

    /// Current page URL
    async fn current_url(&self) -> FlowResult<String>;

    /// Capture a PNG screenshot of the page
    async fn screenshot_png(&self) -> FlowResult<Vec<u8>>;

    /// Tear down the underlying page/browser
    async fn close(&self) -> FlowResult<()>;
}

impl std::fmt::Debug for dyn PageDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PageDriver")
    }
}

// =============================================================================
// SCRIPTED PAGE (test driver)
// =============================================================================

/// Long enough that a hanging action always loses to the step timeout.
const HANG: Duration = Duration::from_secs(3600);

#[derive(Debug, Default)]
struct ScriptedElement {
    text: String,
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    elements: HashMap<String, ScriptedElement>,
    /// Selectors that only start matching after N existence queries
    appear_after: HashMap<String, u32>,
    /// Elements added to the page when a selector is clicked
    click_effects: HashMap<String, Vec<(String, String)>>,
    /// Selectors whose click/fill never resolves
    hanging: HashSet<String>,
    /// Remaining injected click failures per selector
    failing_clicks: HashMap<String, u32>,
    /// HTTP status reported for navigations (None = not observed)
    response_status: Option<u16>,
    eval_results: VecDeque<Value>,
    eval_error: Option<String>,
    screenshot: Vec<u8>,
    fail_screenshots: bool,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    selections: Vec<(String, String)>,
    navigations: Vec<String>,
    exists_queries: HashMap<String, u32>,
    closed: bool,
}

/// Deterministic in-memory page for tests.
///
/// Models just enough of a page for the harness: a set of matching
/// selectors, elements that appear after a number of polls, elements that
/// appear as a click side effect, hanging actions, and injected failures.
/// All interactions are recorded for assertions.
#[derive(Debug, Default)]
pub struct ScriptedPage {
    state: Mutex<PageState>,
}

impl ScriptedPage {
    /// Create an empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element that matches `selector` from the start
    #[must_use]
    pub fn with_element(self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.elements.insert(
                selector.into(),
                ScriptedElement { text: text.into() },
            );
        }
        self
    }

    /// Add an element that only matches after `polls` existence queries
    #[must_use]
    pub fn with_appearing_element(
        self,
        selector: impl Into<String>,
        text: impl Into<String>,
        polls: u32,
    ) -> Self {
        let selector = selector.into();
        {
            let mut state = self.state.lock().unwrap();
            state
                .elements
                .insert(selector.clone(), ScriptedElement { text: text.into() });
            state.appear_after.insert(selector, polls);
        }
        self
    }

    /// When `selector` is clicked, make `appears` start matching
    #[must_use]
    pub fn with_click_effect(
        self,
        selector: impl Into<String>,
        appears: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .click_effects
                .entry(selector.into())
                .or_default()
                .push((appears.into(), text.into()));
        }
        self
    }

    /// Make clicks and fills on `selector` hang until the step timeout fires
    #[must_use]
    pub fn with_hanging_element(self, selector: impl Into<String>) -> Self {
        let selector = selector.into();
        {
            let mut state = self.state.lock().unwrap();
            state
                .elements
                .insert(selector.clone(), ScriptedElement::default());
            state.hanging.insert(selector);
        }
        self
    }

    /// Make the next `count` clicks on `selector` fail with `ActionTimeout`
    #[must_use]
    pub fn with_failing_clicks(self, selector: impl Into<String>, count: u32) -> Self {
        let selector = selector.into();
        {
            let mut state = self.state.lock().unwrap();
            state
                .elements
                .insert(selector.clone(), ScriptedElement::default());
            state.failing_clicks.insert(selector, count);
        }
        self
    }

    /// Report `status` as the final response for every navigation
    #[must_use]
    pub fn with_response_status(self, status: u16) -> Self {
        self.state.lock().unwrap().response_status = Some(status);
        self
    }

    /// Queue a result for the next `evaluate` call
    #[must_use]
    pub fn with_eval_result(self, value: Value) -> Self {
        self.state.lock().unwrap().eval_results.push_back(value);
        self
    }

    /// Make every `evaluate` call fail with an in-page error
    #[must_use]
    pub fn with_eval_error(self, message: impl Into<String>) -> Self {
        self.state.lock().unwrap().eval_error = Some(message.into());
        self
    }

    /// Set the PNG bytes returned by screenshots
    #[must_use]
    pub fn with_screenshot_bytes(self, bytes: Vec<u8>) -> Self {
        self.state.lock().unwrap().screenshot = bytes;
        self
    }

    /// Make screenshot capture fail
    #[must_use]
    pub fn with_failing_screenshots(self) -> Self {
        self.state.lock().unwrap().fail_screenshots = true;
        self
    }

    /// Selectors clicked, in order
    #[must_use]
    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    /// (selector, value) pairs filled, in order
    #[must_use]
    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    /// (selector, value) pairs selected, in order
    #[must_use]
    pub fn selections(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().selections.clone()
    }

    /// URLs navigated to, in order
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    /// How many times `selector` existence was queried
    #[must_use]
    pub fn exists_queries(&self, selector: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .exists_queries
            .get(selector)
            .copied()
            .unwrap_or(0)
    }

    fn check_open(state: &PageState) -> FlowResult<()> {
        if state.closed {
            return Err(FlowError::SessionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn goto(&self, url: &str) -> FlowResult<Option<u16>> {
        let mut state = self.state.lock().unwrap();
        Self::check_open(&state)?;
        state.url = url.to_string();
        state.navigations.push(url.to_string());
        Ok(state.response_status)
    }

    async fn click(&self, selector: &str) -> FlowResult<()> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            Self::check_open(&state)?;
            state.clicks.push(selector.to_string());
            if state.hanging.contains(selector) {
                true
            } else {
                if let Some(remaining) = state.failing_clicks.get_mut(selector) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(FlowError::ActionTimeout {
                            step: selector.to_string(),
                            timeout_ms: 0,
                        });
                    }
                }
                if !state.elements.contains_key(selector) {
                    return Err(FlowError::SelectorNotFound {
                        selector: selector.to_string(),
                    });
                }
                if let Some(effects) = state.click_effects.get(selector).cloned() {
                    for (appears, text) in effects {
                        state.elements.insert(appears, ScriptedElement { text });
                    }
                }
                false
            }
        };
        if hang {
            tokio::time::sleep(HANG).await;
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> FlowResult<()> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            Self::check_open(&state)?;
            state.fills.push((selector.to_string(), value.to_string()));
            if state.hanging.contains(selector) {
                true
            } else {
                if !state.elements.contains_key(selector) {
                    return Err(FlowError::SelectorNotFound {
                        selector: selector.to_string(),
                    });
                }
                if let Some(el) = state.elements.get_mut(selector) {
                    el.text = value.to_string();
                }
                false
            }
        };
        if hang {
            tokio::time::sleep(HANG).await;
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> FlowResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_open(&state)?;
        state
            .selections
            .push((selector.to_string(), value.to_string()));
        if !state.elements.contains_key(selector) {
            return Err(FlowError::SelectorNotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }

    async fn element_exists(&self, selector: &str) -> FlowResult<bool> {
        let mut state = self.state.lock().unwrap();
        Self::check_open(&state)?;
        *state
            .exists_queries
            .entry(selector.to_string())
            .or_insert(0) += 1;
        if let Some(remaining) = state.appear_after.get_mut(selector) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(false);
            }
        }
        Ok(state.elements.contains_key(selector))
    }

    async fn text_content(&self, selector: &str) -> FlowResult<String> {
        let state = self.state.lock().unwrap();
        Self::check_open(&state)?;
        state
            .elements
            .get(selector)
            .map(|el| el.text.clone())
            .ok_or_else(|| FlowError::SelectorNotFound {
                selector: selector.to_string(),
            })
    }

    async fn evaluate(&self, expression: &str) -> FlowResult<Value> {
        let mut state = self.state.lock().unwrap();
        Self::check_open(&state)?;
        if let Some(message) = &state.eval_error {
            return Err(FlowError::Evaluation {
                message: format!("{message} (while evaluating '{expression}')"),
            });
        }
        Ok(state.eval_results.pop_front().unwrap_or(Value::Null))
    }

    async fn current_url(&self) -> FlowResult<String> {
        let state = self.state.lock().unwrap();
        Self::check_open(&state)?;
        Ok(state.url.clone())
    }

    async fn screenshot_png(&self) -> FlowResult<Vec<u8>> {
        let state = self.state.lock().unwrap();
        Self::check_open(&state)?;
        if state.fail_screenshots {
            return Err(FlowError::Screenshot {
                message: "scripted screenshot failure".to_string(),
            });
        }
        Ok(state.screenshot.clone())
    }

    async fn close(&self) -> FlowResult<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}
