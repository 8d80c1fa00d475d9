use crate::error::RenderError;
use crate::scrapers::traits::{PageRequest, Renderer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Renderer backed by a headless Chrome instance.
///
/// Each call opens a fresh tab with the request's identity, waits for
/// navigation plus a settle period and returns `outerHTML`. The tab is closed
/// whether or not the render succeeded.
pub struct ChromeRenderer {
    browser: Arc<Browser>,
    timeout: Duration,
    settle: Duration,
}

impl ChromeRenderer {
    /// Launch headless Chrome
    pub fn new(timeout: Duration, settle: Duration) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .idle_browser_timeout(timeout.max(Duration::from_secs(60)))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser: Arc::new(browser),
            timeout,
            settle,
        })
    }

    fn render_blocking(
        browser: &Browser,
        request: &PageRequest,
        timeout: Duration,
        settle: Duration,
    ) -> Result<String, RenderError> {
        let url = request.url.as_str();
        let tab = browser.new_tab().map_err(|e| classify(url, e))?;
        run_then_close(
            || Self::drive_tab(&tab, request, timeout, settle),
            || {
                if let Err(e) = tab.close(true) {
                    warn!("Failed to close tab for {}: {}", url, e);
                }
            },
        )
    }

    fn drive_tab(
        tab: &Tab,
        request: &PageRequest,
        timeout: Duration,
        settle: Duration,
    ) -> Result<String, RenderError> {
        let url = request.url.as_str();
        tab.set_default_timeout(timeout);

        if let Some(ua) = request.header("User-Agent") {
            tab.set_user_agent(ua, request.header("Accept-Language"), None)
                .map_err(|e| classify(url, e))?;
        }
        let extra: HashMap<&str, &str> = request
            .headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("User-Agent"))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if !extra.is_empty() {
            tab.set_extra_http_headers(extra).map_err(|e| classify(url, e))?;
        }

        tab.navigate_to(url).map_err(|e| classify(url, e))?;
        tab.wait_until_navigated().map_err(|e| classify(url, e))?;

        let status = tab
            .evaluate(NAVIGATION_STATUS_JS, false)
            .ok()
            .and_then(|remote| remote.value)
            .and_then(|v| v.as_u64());
        check_status(url, status)?;

        // Let client-side rendering finish before reading the DOM
        thread::sleep(settle);

        // Dismiss the cookie banner if present
        let _ = tab.evaluate(
            r#"
            const button = document.querySelector('button[id*="accept"], #onetrust-accept-btn-handler');
            if (button) button.click();
            "#,
            false,
        );

        Ok(tab
            .evaluate("document.documentElement.outerHTML", false)
            .map_err(|e| classify(url, e))?
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }
}

/// Status of the main document response; 0 when the browser does not report one
const NAVIGATION_STATUS_JS: &str =
    "(performance.getEntriesByType('navigation')[0] || {}).responseStatus || 0";

/// Runs `body`, then `close`, on every outcome of `body`
fn run_then_close<T>(body: impl FnOnce() -> T, close: impl FnOnce()) -> T {
    let outcome = body();
    close();
    outcome
}

/// Non-2xx main-document status is a failure; an unreported status (0 or absent) is not
fn check_status(url: &str, status: Option<u64>) -> Result<(), RenderError> {
    match status {
        Some(code) if code != 0 && !(200..300).contains(&code) => Err(RenderError::HttpStatus {
            status: u16::try_from(code).unwrap_or(u16::MAX),
            url: url.to_string(),
        }),
        _ => Ok(()),
    }
}

fn classify(url: &str, err: anyhow::Error) -> RenderError {
    let message = format!("{:#}", err);
    if message.to_ascii_lowercase().contains("timed out") {
        RenderError::Timeout {
            url: url.to_string(),
        }
    } else {
        RenderError::Browser(message)
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, request: &PageRequest) -> Result<String, RenderError> {
        let browser = Arc::clone(&self.browser);
        let owned = request.clone();
        let (timeout, settle) = (self.timeout, self.settle);

        debug!("Rendering {} in headless Chrome", request.url);

        tokio::task::spawn_blocking(move || Self::render_blocking(&browser, &owned, timeout, settle))
            .await
            .map_err(|e| RenderError::Browser(format!("render task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "chrome"
    }
}
