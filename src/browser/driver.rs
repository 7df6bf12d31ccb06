//! Thin ordered wrapper over one headless browser instance.

use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide_cdp::cdp::browser_protocol::emulation::SetScriptExecutionDisabledParams;
use chromiumoxide_cdp::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, PrintToPdfParams,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::launch::launch_browser;
use crate::error::{ServiceError, ServiceResult};

/// Page margins in inches for PDF generation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfMargins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// PDF generation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    /// Paper format: `a4` or `letter`.
    pub format: String,
    pub landscape: bool,
    pub print_background: bool,
    pub margin: PdfMargins,
    /// Extra settle time before rendering the PDF.
    pub wait_for_ms: u64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            format: "a4".to_string(),
            landscape: false,
            print_background: true,
            margin: PdfMargins::default(),
            wait_for_ms: 0,
        }
    }
}

impl PdfOptions {
    /// Paper size in inches for the configured format.
    fn paper_size(&self) -> (f64, f64) {
        match self.format.to_lowercase().as_str() {
            "letter" => (8.5, 11.0),
            "legal" => (8.5, 14.0),
            _ => (8.27, 11.69), // a4
        }
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationStatus {
    Loaded,
    /// The hard timeout fired; the page now shows the synthetic error
    /// document so downstream capture still has defined behavior.
    TimedOut,
}

/// Owns one browser instance and its single active page.
///
/// All operations suspend while the browser works; `close` is idempotent
/// and releases the underlying process even after earlier failures.
pub struct BrowserDriver {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    page: Option<Page>,
    user_data_dir: Option<PathBuf>,
    js_enabled: bool,
}

impl BrowserDriver {
    /// Launch a browser and open a blank page.
    pub async fn start(js_enabled: bool, headless: bool) -> ServiceResult<Self> {
        let (browser, handler, user_data_dir) = launch_browser(headless)
            .await
            .map_err(|e| ServiceError::BrowserError(format!("{e:#}")))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ServiceError::BrowserError(format!("failed to open page: {e}")))?;

        if !js_enabled {
            page.execute(SetScriptExecutionDisabledParams { value: true })
                .await
                .map_err(|e| {
                    ServiceError::BrowserError(format!("failed to disable scripting: {e}"))
                })?;
        }

        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
            page: Some(page),
            user_data_dir: Some(user_data_dir),
            js_enabled,
        })
    }

    #[must_use]
    pub fn js_enabled(&self) -> bool {
        self.js_enabled
    }

    fn page(&self) -> ServiceResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ServiceError::BrowserError("driver is closed".into()))
    }

    /// Navigate and wait for document ready, bounded by `timeout`.
    ///
    /// Contract: "document ready or timeout". On timeout the page body is
    /// replaced with a synthetic error document and `TimedOut` is returned;
    /// navigation errors (DNS, refused connections) are real failures.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> ServiceResult<NavigationStatus> {
        let page = self.page()?;

        let navigation = async {
            page.goto(url)
                .await
                .map_err(|e| ServiceError::NavigationFailed(e.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| ServiceError::NavigationFailed(e.to_string()))?;
            Ok::<(), ServiceError>(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => {
                debug!(url, "navigation complete");
                Ok(NavigationStatus::Loaded)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(url, timeout_ms = timeout.as_millis() as u64, "navigation timed out");
                let synthetic = synthetic_timeout_page(url, timeout.as_millis() as u64);
                if let Err(e) = page.set_content(synthetic).await {
                    warn!(url, error = %e, "failed to install synthetic timeout page");
                }
                Ok(NavigationStatus::TimedOut)
            }
        }
    }

    /// Plain delay, used for settle waits around script injection.
    pub async fn wait(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Evaluate a script and return its JSON value.
    ///
    /// Caller-supplied code must already be wrapped in the harness
    /// (`harness::wrap_script`); this method does not add protection.
    pub async fn evaluate(&self, script: &str) -> ServiceResult<Value> {
        let page = self.page()?;
        let evaluation = page
            .evaluate(script)
            .await
            .map_err(|e| ServiceError::ScriptError(e.to_string()))?;
        evaluation
            .into_value::<Value>()
            .map_err(|e| ServiceError::ScriptError(format!("non-JSON script result: {e}")))
    }

    /// Capture a PNG screenshot of the viewport or the full page.
    pub async fn screenshot(&self, full_page: bool) -> ServiceResult<Vec<u8>> {
        let page = self.page()?;
        let params = CaptureScreenshotParams {
            format: Some(CaptureScreenshotFormat::Png),
            capture_beyond_viewport: Some(full_page),
            ..Default::default()
        };
        page.screenshot(params)
            .await
            .map_err(|e| ServiceError::ScreenshotError(e.to_string()))
    }

    /// Render the page to PDF.
    pub async fn pdf(&self, options: &PdfOptions) -> ServiceResult<Vec<u8>> {
        let page = self.page()?;
        if options.wait_for_ms > 0 {
            self.wait(options.wait_for_ms).await;
        }
        let (width, height) = options.paper_size();
        let params = PrintToPdfParams {
            landscape: Some(options.landscape),
            print_background: Some(options.print_background),
            paper_width: Some(width),
            paper_height: Some(height),
            margin_top: Some(options.margin.top),
            margin_right: Some(options.margin.right),
            margin_bottom: Some(options.margin.bottom),
            margin_left: Some(options.margin.left),
            ..Default::default()
        };
        page.pdf(params)
            .await
            .map_err(|e| ServiceError::PdfError(e.to_string()))
    }

    /// Current document HTML.
    pub async fn content(&self) -> ServiceResult<String> {
        let page = self.page()?;
        page.content()
            .await
            .map_err(|e| ServiceError::BrowserError(format!("failed to read content: {e}")))
    }

    /// Current document title (empty when the page has none).
    pub async fn title(&self) -> ServiceResult<String> {
        let page = self.page()?;
        let title = page
            .get_title()
            .await
            .map_err(|e| ServiceError::BrowserError(format!("failed to read title: {e}")))?;
        Ok(title.unwrap_or_default())
    }

    /// Tear down the browser. Safe to call repeatedly; later calls are
    /// no-ops. Always releases the process and the profile directory.
    pub async fn close(&mut self) {
        self.page = None;

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "browser close failed");
            }
            if let Err(e) = browser.wait().await {
                debug!(error = %e, "browser wait after close failed");
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        if let Some(dir) = self.user_data_dir.take() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                debug!(dir = %dir.display(), error = %e, "failed to remove profile dir");
            }
        }
    }
}

impl Drop for BrowserDriver {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if let Some(dir) = self.user_data_dir.take() {
            let _ = std::fs::remove_dir_all(&dir);
        }
    }
}

fn synthetic_timeout_page(url: &str, timeout_ms: u64) -> String {
    format!(
        r"<html><head><title>Navigation Timeout</title></head><body>
<h1>Navigation Timeout</h1>
<p>The page at {url} did not finish loading within {timeout_ms}ms.</p>
</body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_paper_sizes() {
        let a4 = PdfOptions::default();
        assert_eq!(a4.paper_size(), (8.27, 11.69));
        let letter = PdfOptions {
            format: "Letter".into(),
            ..Default::default()
        };
        assert_eq!(letter.paper_size(), (8.5, 11.0));
    }

    #[test]
    fn synthetic_page_names_the_url() {
        let page = synthetic_timeout_page("https://slow.example", 30_000);
        assert!(page.contains("https://slow.example"));
        assert!(page.contains("Navigation Timeout"));
    }
}
