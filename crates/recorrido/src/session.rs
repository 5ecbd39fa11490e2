//! Browser session ownership and lifecycle.
//!
//! A [`BrowserSession`] owns one browser process and page for the duration
//! of a run. The real CDP (Chrome DevTools Protocol) backend uses
//! chromiumoxide and is gated behind the `browser` feature; without it,
//! sessions are built over any [`PageDriver`] (see
//! [`BrowserSession::with_driver`]), which is how the test suites run.
//!
//! Lifecycle guarantees:
//! - `close()` is idempotent and never attempts a second process teardown.
//! - Step execution is exclusive per session; overlapping executions fail
//!   fast with `ConcurrentAccess` instead of queueing.

use crate::driver::PageDriver;
use crate::result::{FlowError, FlowResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Browser session configuration, read-only for the session's lifetime
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Artificial delay after each page action (debugging aid)
    pub slow_mo_ms: u64,
    /// Extra arguments passed to the browser process
    pub launch_args: Vec<String>,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            slow_mo_ms: 0,
            launch_args: Vec::new(),
            chromium_path: None,
        }
    }
}

impl SessionConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set the per-action slow-motion delay
    #[must_use]
    pub const fn with_slow_mo_ms(mut self, slow_mo_ms: u64) -> Self {
        self.slow_mo_ms = slow_mo_ms;
        self
    }

    /// Append a browser launch argument
    #[must_use]
    pub fn with_launch_arg(mut self, arg: impl Into<String>) -> Self {
        self.launch_args.push(arg.into());
        self
    }

    /// Set the chromium binary path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }
}

/// One browser process + page under the harness's exclusive control.
#[derive(Debug)]
pub struct BrowserSession {
    config: SessionConfig,
    driver: Arc<dyn PageDriver>,
    closed: AtomicBool,
    in_step: AtomicBool,
}

impl BrowserSession {
    /// Launch a browser with the given configuration.
    ///
    /// # Errors
    /// Returns `FlowError::Launch` if the browser binary cannot start or
    /// the CDP handshake fails.
    #[cfg(feature = "browser")]
    pub async fn open(config: SessionConfig) -> FlowResult<Self> {
        let driver = cdp::CdpDriver::launch(&config).await?;
        Ok(Self::with_driver(config, Arc::new(driver)))
    }

    /// Launch a browser with the given configuration.
    ///
    /// # Errors
    /// Always fails without the `browser` feature; there is no backend to
    /// launch. Tests and embedders construct sessions over a driver with
    /// [`BrowserSession::with_driver`].
    #[cfg(not(feature = "browser"))]
    pub async fn open(_config: SessionConfig) -> FlowResult<Self> {
        Err(FlowError::Launch {
            message: "no browser backend compiled in; enable the 'browser' feature".to_string(),
        })
    }

    /// Build a session over an existing page driver
    #[must_use]
    pub fn with_driver(config: SessionConfig, driver: Arc<dyn PageDriver>) -> Self {
        Self {
            config,
            driver,
            closed: AtomicBool::new(false),
            in_step: AtomicBool::new(false),
        }
    }

    /// Session configuration
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying page driver
    #[must_use]
    pub fn driver(&self) -> Arc<dyn PageDriver> {
        Arc::clone(&self.driver)
    }

    /// Load a URL, bounded by `timeout_ms`.
    ///
    /// # Errors
    /// Returns `FlowError::Navigation` on load failure, timeout, or a
    /// final response status outside 2xx/3xx, and
    /// `FlowError::SessionClosed` on a closed session.
    pub async fn navigate(&self, url: &str, timeout_ms: u64) -> FlowResult<()> {
        if self.is_closed() {
            return Err(FlowError::SessionClosed);
        }
        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.driver.goto(url)).await
        {
            Ok(Ok(Some(status))) if !(200..400).contains(&status) => {
                Err(FlowError::Navigation {
                    url: url.to_string(),
                    message: format!("final response status {status}"),
                })
            }
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(FlowError::Navigation {
                url: url.to_string(),
                message: format!("did not reach ready state within {timeout_ms}ms"),
            }),
        }
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear down the browser. Idempotent: the second and later calls are
    /// no-ops and never attempt another process termination. Teardown
    /// failures are logged, not surfaced, so close can sit on every exit
    /// path.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.driver.close().await {
            tracing::warn!(error = %e, "browser teardown failed");
        }
    }

    /// Claim the session for one step execution.
    ///
    /// # Errors
    /// `FlowError::SessionClosed` on a closed session,
    /// `FlowError::ConcurrentAccess` if another step is already running.
    pub fn begin_step(&self) -> FlowResult<StepGuard<'_>> {
        if self.is_closed() {
            return Err(FlowError::SessionClosed);
        }
        if self
            .in_step
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FlowError::ConcurrentAccess);
        }
        Ok(StepGuard { session: self })
    }
}

/// Releases the session's step slot on drop
#[derive(Debug)]
pub struct StepGuard<'a> {
    session: &'a BrowserSession,
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        self.session.in_step.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// CDP backend (behind the `browser` feature)
// =============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::{FlowError, FlowResult, PageDriver, SessionConfig};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// How long to wait for buffered network events after a load settles
    const RESPONSE_DRAIN: Duration = Duration::from_millis(250);

    /// Quote a string as a JavaScript literal
    fn js_string(s: &str) -> String {
        serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
    }

    /// CDP-backed page driver over chromiumoxide
    pub(super) struct CdpDriver {
        browser: Mutex<CdpBrowser>,
        page: CdpPage,
        slow_mo: Duration,
        #[allow(dead_code)]
        handle: tokio::task::JoinHandle<()>,
    }

    impl CdpDriver {
        pub(super) async fn launch(config: &SessionConfig) -> FlowResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height);

            // chromiumoxide launches headless by default
            if !config.headless {
                builder = builder.with_head();
            }
            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }
            for arg in &config.launch_args {
                builder = builder.arg(arg);
            }

            let cdp_config = builder.build().map_err(|e| FlowError::Launch {
                message: e.to_string(),
            })?;

            let (browser, mut handler) =
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| FlowError::Launch {
                        message: e.to_string(),
                    })?;

            // Drive CDP events until the connection drops
            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| FlowError::Launch {
                    message: format!("could not open initial page: {e}"),
                })?;

            Ok(Self {
                browser: Mutex::new(browser),
                page,
                slow_mo: Duration::from_millis(config.slow_mo_ms),
                handle,
            })
        }

        async fn pace(&self) {
            if !self.slow_mo.is_zero() {
                tokio::time::sleep(self.slow_mo).await;
            }
        }
    }

    #[async_trait]
    impl PageDriver for CdpDriver {
        async fn goto(&self, url: &str) -> FlowResult<Option<u16>> {
            let nav_err = |message: String| FlowError::Navigation {
                url: url.to_string(),
                message,
            };
            // Subscribe before the request goes out so the document
            // response cannot be missed.
            let mut responses = self
                .page
                .event_listener::<EventResponseReceived>()
                .await
                .map_err(|e| nav_err(e.to_string()))?;
            self.page
                .goto(url)
                .await
                .map_err(|e| nav_err(e.to_string()))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| nav_err(e.to_string()))?;

            // The document response event lands before the load event
            // settles; drain the buffered events and keep the last
            // main-frame document status.
            let main_frame = self.page.mainframe().await.ok().flatten();
            let mut status = None;
            while let Ok(Some(event)) =
                tokio::time::timeout(RESPONSE_DRAIN, responses.next()).await
            {
                if event.r#type != ResourceType::Document {
                    continue;
                }
                if main_frame.is_some() && event.frame_id != main_frame {
                    continue;
                }
                status = u16::try_from(event.response.status).ok();
            }
            Ok(status)
        }

        async fn click(&self, selector: &str) -> FlowResult<()> {
            let element =
                self.page
                    .find_element(selector)
                    .await
                    .map_err(|_| FlowError::SelectorNotFound {
                        selector: selector.to_string(),
                    })?;
            element.click().await.map_err(|e| FlowError::Evaluation {
                message: format!("click on {selector} failed: {e}"),
            })?;
            self.pace().await;
            Ok(())
        }

        async fn fill(&self, selector: &str, value: &str) -> FlowResult<()> {
            let element =
                self.page
                    .find_element(selector)
                    .await
                    .map_err(|_| FlowError::SelectorNotFound {
                        selector: selector.to_string(),
                    })?;
            element.click().await.map_err(|e| FlowError::Evaluation {
                message: format!("focus on {selector} failed: {e}"),
            })?;
            // Clear any prior content before typing
            self.page
                .evaluate(format!(
                    "(() => {{ const el = document.querySelector({sel}); if (el) el.value = ''; }})()",
                    sel = js_string(selector)
                ))
                .await
                .map_err(|e| FlowError::Evaluation {
                    message: e.to_string(),
                })?;
            element
                .type_str(value)
                .await
                .map_err(|e| FlowError::Evaluation {
                    message: format!("typing into {selector} failed: {e}"),
                })?;
            self.pace().await;
            Ok(())
        }

        async fn select_option(&self, selector: &str, value: &str) -> FlowResult<()> {
            if !self.element_exists(selector).await? {
                return Err(FlowError::SelectorNotFound {
                    selector: selector.to_string(),
                });
            }
            let script = format!(
                "(() => {{ const el = document.querySelector({sel}); \
                 el.value = {val}; \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); }})()",
                sel = js_string(selector),
                val = js_string(value)
            );
            self.page
                .evaluate(script)
                .await
                .map_err(|e| FlowError::Evaluation {
                    message: format!("select on {selector} failed: {e}"),
                })?;
            self.pace().await;
            Ok(())
        }

        async fn element_exists(&self, selector: &str) -> FlowResult<bool> {
            Ok(self.page.find_element(selector).await.is_ok())
        }

        async fn text_content(&self, selector: &str) -> FlowResult<String> {
            let element =
                self.page
                    .find_element(selector)
                    .await
                    .map_err(|_| FlowError::SelectorNotFound {
                        selector: selector.to_string(),
                    })?;
            let text = element
                .inner_text()
                .await
                .map_err(|e| FlowError::Evaluation {
                    message: e.to_string(),
                })?;
            Ok(text.unwrap_or_default())
        }

        async fn evaluate(&self, expression: &str) -> FlowResult<Value> {
            let result =
                self.page
                    .evaluate(expression)
                    .await
                    .map_err(|e| FlowError::Evaluation {
                        message: e.to_string(),
                    })?;
            Ok(result.value().cloned().unwrap_or(Value::Null))
        }

        async fn current_url(&self) -> FlowResult<String> {
            let url = self.page.url().await.map_err(|e| FlowError::Evaluation {
                message: e.to_string(),
            })?;
            Ok(url.unwrap_or_default())
        }

        async fn screenshot_png(&self) -> FlowResult<Vec<u8>> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let screenshot =
                self.page
                    .execute(params)
                    .await
                    .map_err(|e| FlowError::Screenshot {
                        message: e.to_string(),
                    })?;
            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| FlowError::Screenshot {
                    message: e.to_string(),
                })
        }

        async fn close(&self) -> FlowResult<()> {
            let mut browser = self.browser.lock().await;
            browser.close().await.map_err(|e| FlowError::Launch {
                message: format!("browser shutdown failed: {e}"),
            })?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ScriptedPage;

    fn session_over(page: ScriptedPage) -> BrowserSession {
        BrowserSession::with_driver(SessionConfig::default(), Arc::new(page))
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let session = session_over(ScriptedPage::new());
        assert!(!session.is_closed());
        session.close().await;
        assert!(session.is_closed());
        // Second close must not attempt another teardown or panic
        session.close().await;
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn navigate_after_close_fails() {
        let session = session_over(ScriptedPage::new());
        session.close().await;
        let err = session.navigate("http://localhost/book", 1000).await;
        assert!(matches!(err, Err(FlowError::SessionClosed)));
    }

    #[tokio::test]
    async fn navigate_records_url() {
        let page = Arc::new(ScriptedPage::new());
        let session = BrowserSession::with_driver(SessionConfig::default(), page.clone());
        session.navigate("http://localhost/book", 1000).await.unwrap();
        assert_eq!(page.navigations(), ["http://localhost/book"]);
    }

    #[tokio::test]
    async fn navigate_rejects_an_error_status_page() {
        let session = session_over(ScriptedPage::new().with_response_status(404));
        let err = session
            .navigate("http://localhost/missing", 1000)
            .await
            .unwrap_err();
        match err {
            FlowError::Navigation { message, .. } => assert!(message.contains("404")),
            other => panic!("expected Navigation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn navigate_accepts_success_and_redirect_statuses() {
        for status in [200_u16, 302] {
            let session = session_over(ScriptedPage::new().with_response_status(status));
            assert!(session.navigate("http://localhost/book", 1000).await.is_ok());
        }
    }

    #[tokio::test]
    async fn overlapping_step_claims_fail_fast() {
        let session = session_over(ScriptedPage::new());
        let guard = session.begin_step().unwrap();
        let err = session.begin_step().unwrap_err();
        assert!(matches!(err, FlowError::ConcurrentAccess));
        drop(guard);
        assert!(session.begin_step().is_ok());
    }

    #[tokio::test]
    async fn begin_step_on_closed_session_fails() {
        let session = session_over(ScriptedPage::new());
        session.close().await;
        assert!(matches!(
            session.begin_step().unwrap_err(),
            FlowError::SessionClosed
        ));
    }

    #[test]
    fn config_builders() {
        let config = SessionConfig::default()
            .with_headless(false)
            .with_viewport(390, 844)
            .with_slow_mo_ms(250)
            .with_launch_arg("--disable-gpu");
        assert!(!config.headless);
        assert_eq!(config.viewport_width, 390);
        assert_eq!(config.slow_mo_ms, 250);
        assert_eq!(config.launch_args, ["--disable-gpu"]);
    }
}
