//! Per-request crawl options.

use serde::{Deserialize, Serialize};

use crate::browser::PdfOptions;
use crate::markdown::{ContentFilter, MarkdownMode};
use crate::utils::constants::{DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_SCRIPT_TIMEOUT_MS};

/// Screenshot capture area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotMode {
    Viewport,
    #[default]
    Full,
}

/// How much of a capture the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Full,
    ContentOnly,
    Minimal,
    Llm,
}

/// The recognized crawl option keys.
///
/// Everything is optional with service-level defaults; unknown keys in
/// incoming JSON are rejected so typos surface as `InvalidInput` instead of
/// silently doing nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlOptions {
    /// Enable JavaScript in the browser context.
    pub javascript: bool,
    /// Capture a screenshot after load.
    pub screenshot: bool,
    pub screenshot_mode: ScreenshotMode,
    /// Generate a PDF of the page.
    pub pdf: bool,
    pub pdf_options: Option<PdfOptions>,
    pub markdown_extraction: MarkdownMode,
    /// Post-markdown content filter (pruning or bm25).
    pub filter: Option<ContentFilter>,
    /// Run OCR over the screenshot. Silently dropped without a screenshot.
    pub ocr_extraction: bool,
    /// User script evaluated after load (requires `javascript`).
    pub javascript_payload: Option<String>,
    pub wait_before_script_ms: u64,
    pub wait_after_script_ms: u64,
    pub script_timeout_ms: u64,
    /// Post-load settle delay; defaults to the per-host hint table.
    pub wait_ms: Option<u64>,
    /// Hard navigation timeout.
    pub timeout_ms: u64,
    /// Multi-page crawl depth (0 = single page).
    pub depth: u8,
    pub max_pages: Option<usize>,
    /// Regex restricting which discovered links a multi-page crawl follows.
    pub follow_pattern: Option<String>,
    pub response_format: ResponseFormat,
    /// Skip the estimator and run inline.
    pub force_sync: bool,
    /// Reuse (or create) a named browser session.
    pub session_id: Option<String>,
    /// Treat a navigation timeout as a failure instead of capturing the
    /// synthetic page.
    pub fail_on_timeout: bool,
    /// Batch-mode policy: keep crawling after a navigation failure.
    pub continue_on_failure: bool,
    /// Batch-mode policy: abort the batch at the first failed URL.
    pub stop_on_error: bool,
    /// Post-crawl summarization provider (`anthropic`).
    pub llm_provider: Option<String>,
    pub llm_token: Option<String>,
    pub llm_model: Option<String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            javascript: false,
            screenshot: false,
            screenshot_mode: ScreenshotMode::default(),
            pdf: false,
            pdf_options: None,
            markdown_extraction: MarkdownMode::default(),
            filter: None,
            ocr_extraction: false,
            javascript_payload: None,
            wait_before_script_ms: 0,
            wait_after_script_ms: 0,
            script_timeout_ms: DEFAULT_SCRIPT_TIMEOUT_MS,
            wait_ms: None,
            timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            depth: 0,
            max_pages: None,
            follow_pattern: None,
            response_format: ResponseFormat::default(),
            force_sync: false,
            session_id: None,
            fail_on_timeout: false,
            continue_on_failure: false,
            stop_on_error: false,
            llm_provider: None,
            llm_token: None,
            llm_model: None,
        }
    }
}

impl CrawlOptions {
    /// Whether the summarization/OCR provider is configured.
    #[must_use]
    pub fn has_provider(&self) -> bool {
        self.llm_provider.is_some() && self.llm_token.is_some()
    }
}

/// One crawl request: target, options, optional session and user identity.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    #[serde(default)]
    pub options: CrawlOptions,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl CrawlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: CrawlOptions::default(),
            session_id: None,
            user_id: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CrawlOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Session id from the request envelope or the options bag.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .or(self.options.session_id.as_deref())
    }
}
