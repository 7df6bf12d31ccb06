//! Crawl orchestration.
//!
//! One crawl is: resolve a browser (session or fresh) → navigate → settle →
//! inject script → capture title/content/screenshot/pdf → markdown pipeline
//! → optional provider enrichment → artifact writes → `CrawlOutcome`.
//! Steps before capture run in strict order on the same browser; artifact
//! writes fan out concurrently before return.

mod batch;
mod multi;
mod options;
mod result;
mod settle;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::browser::{
    BrowserDriver, NavigationStatus, ScriptOutcome, parse_outcome, validate_script, wrap_script,
};
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::llm;
use crate::markdown::{self, MarkdownMode};
use crate::session::BrowserSessionPool;
use crate::storage::ArtifactWriter;

pub use batch::BatchPolicy;
pub use options::{CrawlOptions, CrawlRequest, ResponseFormat, ScreenshotMode};
pub use result::{BatchItem, BatchOutcome, CrawlOutcome, PageCapture, collate_markdown};
pub use settle::settle_delay;

/// Executes crawls. The orchestrator is the production implementation;
/// the dispatcher and job worker depend on this seam so they can be tested
/// without a browser.
#[async_trait]
pub trait CrawlExecutor: Send + Sync {
    /// Crawl a single page.
    async fn run_page(&self, request: &CrawlRequest) -> CrawlOutcome;

    /// Multi-page expansion from a root URL (`depth > 0`).
    async fn run_span(&self, request: &CrawlRequest) -> BatchOutcome;

    /// Crawl a list of URLs with bounded concurrency.
    async fn run_batch(
        &self,
        urls: &[String],
        options: &CrawlOptions,
        user_id: Option<&str>,
    ) -> BatchOutcome;
}

/// Drives browsers through the full capture pipeline.
pub struct CrawlOrchestrator {
    config: Arc<ServiceConfig>,
    sessions: Arc<BrowserSessionPool>,
    artifacts: Arc<ArtifactWriter>,
}

impl CrawlOrchestrator {
    pub fn new(
        config: Arc<ServiceConfig>,
        sessions: Arc<BrowserSessionPool>,
        artifacts: Arc<ArtifactWriter>,
    ) -> Self {
        Self {
            config,
            sessions,
            artifacts,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<BrowserSessionPool> {
        &self.sessions
    }

    #[must_use]
    pub fn config(&self) -> &Arc<ServiceConfig> {
        &self.config
    }

    /// Crawl one page, converting every failure into a tagged outcome.
    pub async fn crawl(&self, request: &CrawlRequest) -> CrawlOutcome {
        if !crate::utils::is_valid_url(&request.url) {
            return CrawlOutcome::failure(
                crate::error::ErrorKind::InvalidInput,
                format!("not a crawlable URL: {}", request.url),
            );
        }

        match self.crawl_page(request).await {
            Ok(capture) => CrawlOutcome::Success(Box::new(capture)),
            Err(e) => {
                warn!(url = %request.url, error = %e, "crawl failed");
                CrawlOutcome::Failure {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        }
    }

    async fn crawl_page(&self, request: &CrawlRequest) -> ServiceResult<PageCapture> {
        let started = Instant::now();
        let options = &request.options;
        let requested_session = request.session_id().map(str::to_string);

        // Step 1: resolve a browser. Session reuse when the id is live, a
        // fresh launch otherwise; fresh browsers are registered with the
        // pool only when the caller asked for a durable session.
        let (driver, from_pool) = match &requested_session {
            Some(id) => match self.sessions.get(id).await {
                Some(handle) => {
                    debug!(session_id = %id, "reusing browser session");
                    (handle, true)
                }
                None => {
                    let fresh =
                        BrowserDriver::start(options.javascript, self.config.headless()).await?;
                    let id = self.sessions.create(Some(id.clone()), fresh).await;
                    let handle = self
                        .sessions
                        .get(&id)
                        .await
                        .ok_or_else(|| ServiceError::SessionGone(id.clone()))?;
                    (handle, true)
                }
            },
            None => {
                let fresh =
                    BrowserDriver::start(options.javascript, self.config.headless()).await?;
                (Arc::new(Mutex::new(fresh)), false)
            }
        };

        // Holding the session lock for the whole crawl serializes
        // concurrent operations targeting the same session.
        let mut guard = driver.lock().await;

        let capture = self
            .capture_page(&guard, request, requested_session.clone(), started)
            .await;

        if from_pool {
            if let (Some(id), Ok(page)) = (&requested_session, &capture) {
                let mut fragment = serde_json::Map::new();
                fragment.insert("current_url".into(), request.url.clone().into());
                fragment.insert("title".into(), page.title.clone().into());
                self.sessions.update_metadata(id, fragment).await;
            }
        } else {
            // Locally created browser: always released, success or not.
            guard.close().await;
        }
        drop(guard);

        capture
    }

    async fn capture_page(
        &self,
        driver: &BrowserDriver,
        request: &CrawlRequest,
        session_id: Option<String>,
        started: Instant,
    ) -> ServiceResult<PageCapture> {
        let options = &request.options;
        let url = request.url.as_str();

        // Step 2: navigate with the hard timeout, then settle.
        let timeout = std::time::Duration::from_millis(options.timeout_ms);
        match driver.navigate(url, timeout).await {
            Ok(NavigationStatus::Loaded) => {}
            Ok(NavigationStatus::TimedOut) => {
                if options.fail_on_timeout {
                    return Err(ServiceError::NavigationTimeout(options.timeout_ms));
                }
                // Synthetic page installed by the driver; capture proceeds.
            }
            Err(e) => {
                if options.continue_on_failure {
                    warn!(url, error = %e, "navigation failed, continuing per batch policy");
                } else {
                    return Err(e);
                }
            }
        }

        let settle = settle_delay(url, options.wait_ms, self.config.settle_delay());
        driver.wait(settle.as_millis() as u64).await;

        // Step 3: script injection inside the harness.
        let mut script_result: Option<ScriptOutcome> = None;
        if let Some(code) = &options.javascript_payload {
            if driver.js_enabled() {
                driver.wait(options.wait_before_script_ms).await;
                script_result = Some(self.run_script(driver, code, options).await);
                driver.wait(options.wait_after_script_ms).await;
            } else {
                debug!(url, "script payload ignored: javascript disabled");
            }
        }

        // Step 4: capture title and post-script HTML, then optional
        // screenshot and PDF; capture errors embed, they never abort.
        let title = driver.title().await.unwrap_or_default();
        let html = driver.content().await?;

        let (screenshot, screenshot_error) = if options.screenshot {
            let full = options.screenshot_mode == ScreenshotMode::Full;
            match driver.screenshot(full).await {
                Ok(bytes) => (Some(bytes), None),
                Err(e) => {
                    warn!(url, error = %e, "screenshot failed");
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        let (pdf, pdf_error) = if options.pdf {
            let pdf_options = options.pdf_options.clone().unwrap_or_default();
            match driver.pdf(&pdf_options).await {
                Ok(bytes) => (Some(bytes), None),
                Err(e) => {
                    warn!(url, error = %e, "pdf generation failed");
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        // Step 5: markdown pipeline.
        let rendering = markdown::render(
            &html,
            url,
            options.markdown_extraction,
            options.filter.as_ref(),
        );
        let extracted_text = if options.markdown_extraction == MarkdownMode::None {
            None
        } else {
            Some(markdown::extract_text(&html))
        };
        let word_count = extracted_text
            .as_deref()
            .map(markdown::word_count)
            .unwrap_or(0);

        let mut capture = PageCapture {
            url: url.to_string(),
            title,
            html,
            markdown: rendering.as_ref().map(|r| r.markdown.clone()),
            references: rendering.as_ref().and_then(|r| {
                (!r.references.is_empty()).then(|| r.references.clone())
            }),
            fit_markdown: rendering.as_ref().and_then(|r| r.fit_markdown.clone()),
            extracted_text,
            screenshot,
            screenshot_error,
            pdf,
            pdf_error,
            script_execution_ms: script_result.as_ref().map(|s| s.execution_ms),
            script_result,
            ocr_text: None,
            summary: None,
            session_id,
            word_count,
            elapsed_ms: 0,
            artifacts: Vec::new(),
        };

        // Step 6: provider enrichment. OCR needs a screenshot and a
        // provider; summarization needs a provider. Neither failure mode
        // ever fails the crawl.
        self.enrich(&mut capture, options).await;

        // Step 7: artifact writes, fanned out concurrently.
        self.write_artifacts(&mut capture, request).await;

        capture.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            url,
            title = %capture.title,
            elapsed_ms = capture.elapsed_ms,
            artifacts = capture.artifacts.len(),
            "crawl complete"
        );
        Ok(capture)
    }

    async fn run_script(
        &self,
        driver: &BrowserDriver,
        code: &str,
        options: &CrawlOptions,
    ) -> ScriptOutcome {
        if let Err(e) = validate_script(code) {
            return ScriptOutcome::failed(e.to_string());
        }
        let wrapped = wrap_script(code, options.script_timeout_ms);
        match driver.evaluate(&wrapped).await {
            Ok(value) => parse_outcome(value),
            Err(e) => ScriptOutcome::failed(e.to_string()),
        }
    }

    async fn enrich(&self, capture: &mut PageCapture, options: &CrawlOptions) {
        if !options.has_provider() {
            return;
        }
        let (Some(name), Some(token)) = (&options.llm_provider, &options.llm_token) else {
            return;
        };
        let provider = match llm::provider_for(name, token) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(provider = %name, error = %e, "provider unavailable, skipping enrichment");
                return;
            }
        };
        let model = options.llm_model.as_deref();
        let max_tokens = self.config.provider_max_tokens();

        if options.ocr_extraction {
            if let Some(png) = &capture.screenshot {
                match llm::image_text(provider.as_ref(), model, png, max_tokens).await {
                    Ok(text) => capture.ocr_text = Some(text),
                    Err(e) => warn!(error = %e, "ocr extraction failed"),
                }
            }
            // No screenshot: OCR is silently dropped.
        }

        let content = capture.best_content();
        let excerpt: String = content.chars().take(8_000).collect();
        match llm::summarize(provider.as_ref(), model, &excerpt, max_tokens).await {
            Ok(summary) if !summary.trim().is_empty() => capture.summary = Some(summary),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "summarization failed"),
        }
    }

    async fn write_artifacts(&self, capture: &mut PageCapture, request: &CrawlRequest) {
        let user = request.user_id.as_deref();
        let url = &capture.url;
        let title = (!capture.title.is_empty()).then_some(capture.title.as_str());

        let markdown_doc = capture.markdown.as_ref().map(|markdown| {
            match &capture.references {
                Some(references) => format!("{markdown}{references}"),
                None => markdown.clone(),
            }
        });
        // Binary fields are #[serde(skip)], so this is the full result
        // minus the raw image/pdf bytes, which get their own artifacts.
        let dump_bytes = serde_json::to_vec_pretty(&*capture).unwrap_or_default();

        let markdown_write = async {
            match &markdown_doc {
                Some(doc) => {
                    self.artifacts
                        .write_lossy(user, url, title, "md", doc.as_bytes())
                        .await
                }
                None => None,
            }
        };
        let json_write = async {
            self.artifacts
                .write_lossy(user, url, title, "json", &dump_bytes)
                .await
        };
        let html_write = async {
            self.artifacts
                .write_lossy(user, url, title, "html", capture.html.as_bytes())
                .await
        };
        let screenshot_write = async {
            match &capture.screenshot {
                Some(bytes) => {
                    self.artifacts
                        .write_lossy(user, url, title, "png", bytes)
                        .await
                }
                None => None,
            }
        };
        let pdf_write = async {
            match &capture.pdf {
                Some(bytes) => {
                    self.artifacts
                        .write_lossy(user, url, title, "pdf", bytes)
                        .await
                }
                None => None,
            }
        };

        let (md, json_ref, html, png, pdf) = tokio::join!(
            markdown_write,
            json_write,
            html_write,
            screenshot_write,
            pdf_write
        );
        capture.artifacts = [md, json_ref, html, png, pdf]
            .into_iter()
            .flatten()
            .collect();
    }
}

#[async_trait]
impl CrawlExecutor for CrawlOrchestrator {
    async fn run_page(&self, request: &CrawlRequest) -> CrawlOutcome {
        self.crawl(request).await
    }

    async fn run_span(&self, request: &CrawlRequest) -> BatchOutcome {
        multi::crawl_span(self, request).await
    }

    async fn run_batch(
        &self,
        urls: &[String],
        options: &CrawlOptions,
        user_id: Option<&str>,
    ) -> BatchOutcome {
        let policy = BatchPolicy {
            concurrency: self.config.batch_concurrency(),
            per_url_timeout: self.config.batch_per_url_timeout(),
            stop_on_error: options.stop_on_error,
        };
        batch::run_batch(self, urls, options, user_id, &policy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionPool;
    use crate::storage::{ArtifactWriter, LocalStore};

    fn orchestrator_over(dir: &std::path::Path) -> (CrawlOrchestrator, Arc<ArtifactWriter>) {
        let store = Arc::new(LocalStore::new(dir, "/storage"));
        let artifacts = Arc::new(ArtifactWriter::new(store));
        let orchestrator = CrawlOrchestrator::new(
            Arc::new(ServiceConfig::default().with_storage_root(dir)),
            SessionPool::with_defaults(),
            Arc::clone(&artifacts),
        );
        (orchestrator, artifacts)
    }

    #[tokio::test]
    async fn artifact_fanout_persists_html_and_the_full_dump() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, artifacts) = orchestrator_over(dir.path());

        let mut capture = PageCapture {
            url: "https://example.com/page".into(),
            title: "Example Page".into(),
            html: "<html><body><p>persisted body</p></body></html>".into(),
            markdown: Some("persisted body".into()),
            references: Some("\n\n## References\n\n\u{27e8}1\u{27e9} https://a.com\n".into()),
            summary: Some("a short summary".into()),
            session_id: Some("s1".into()),
            screenshot: Some(vec![0x89, 0x50, 0x4e, 0x47]),
            word_count: 2,
            ..PageCapture::default()
        };
        let request =
            CrawlRequest::new("https://example.com/page").with_user("alice@example.com");

        orchestrator.write_artifacts(&mut capture, &request).await;

        let by_ext = |ext: &str| {
            capture
                .artifacts
                .iter()
                .find(|a| a.filename.ends_with(ext))
                .cloned()
        };
        let html_ref = by_ext(".html").expect("html artifact");
        let json_ref = by_ext(".json").expect("json artifact");
        let md_ref = by_ext(".md").expect("markdown artifact");
        assert!(by_ext(".png").is_some());
        // No PDF was produced, so none is written.
        assert!(by_ext(".pdf").is_none());
        assert!(html_ref.storage_path.starts_with("users/"));

        // The page HTML is stored verbatim.
        let html_bytes = artifacts.store().get(&html_ref.storage_path).await.unwrap();
        assert_eq!(html_bytes, capture.html.as_bytes());

        // The JSON dump is the full result, not a curated subset.
        let dump_bytes = artifacts.store().get(&json_ref.storage_path).await.unwrap();
        let dump: serde_json::Value = serde_json::from_slice(&dump_bytes).unwrap();
        assert_eq!(dump["html"], capture.html);
        assert_eq!(dump["title"], "Example Page");
        assert_eq!(dump["summary"], "a short summary");
        assert_eq!(dump["session_id"], "s1");
        assert_eq!(dump["word_count"], 2);
        // Raw image bytes never serialize into the dump.
        assert!(dump.get("screenshot").is_none());

        // The markdown artifact carries the references block.
        let md_bytes = artifacts.store().get(&md_ref.storage_path).await.unwrap();
        let md = String::from_utf8(md_bytes).unwrap();
        assert!(md.starts_with("persisted body"));
        assert!(md.contains("## References"));
    }

    #[tokio::test]
    async fn markdown_artifact_is_skipped_when_no_markdown_was_produced() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _artifacts) = orchestrator_over(dir.path());

        let mut capture = PageCapture {
            url: "https://example.com".into(),
            title: "Bare".into(),
            html: "<html><body>x</body></html>".into(),
            ..PageCapture::default()
        };
        let request = CrawlRequest::new("https://example.com");

        orchestrator.write_artifacts(&mut capture, &request).await;

        let extensions: Vec<&str> = capture
            .artifacts
            .iter()
            .filter_map(|a| a.filename.rsplit('.').next())
            .collect();
        assert!(extensions.contains(&"html"));
        assert!(extensions.contains(&"json"));
        assert!(!extensions.contains(&"md"));
        assert!(!extensions.contains(&"png"));
    }
}
