//! Crawl-facing tools: the operations a model uses to fetch pages,
//! capture screenshots, and poll jobs.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{SchemaBuilder, Tool, ToolContext};
use crate::crawler::{
    CrawlExecutor, CrawlOptions, CrawlRequest, ResponseFormat, ScreenshotMode,
};
use crate::dispatch::{Dispatch, Dispatcher};
use crate::jobs::{JobRegistry, JobStatus};
use crate::markdown::MarkdownMode;

/// Split tool arguments into a URL and the remaining crawl options.
fn parse_request(args: &Value, ctx: &ToolContext) -> anyhow::Result<CrawlRequest> {
    let url = args["url"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("'url' is required"))?
        .to_string();

    let mut rest = args.as_object().cloned().unwrap_or_default();
    rest.remove("url");
    let options: CrawlOptions = serde_json::from_value(Value::Object(rest))
        .map_err(|e| anyhow::anyhow!("invalid crawl options: {e}"))?;

    Ok(CrawlRequest {
        url,
        session_id: options.session_id.clone(),
        options,
        user_id: ctx.user_id.clone(),
    })
}

/// Crawl a page through the dispatcher: cheap requests return content
/// inline, expensive ones return a job handle.
pub struct CrawlWebpageTool {
    dispatcher: Arc<Dispatcher>,
}

impl CrawlWebpageTool {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Tool for CrawlWebpageTool {
    fn name(&self) -> &str {
        "crawl_webpage"
    }

    fn description(&self) -> &str {
        "Crawl a web page and return its content as markdown. Fast crawls \
         return content directly; slow ones return a job_id to poll with \
         check_job_status."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("url", "The URL to crawl")
            .optional_bool("javascript", "Enable JavaScript execution", false)
            .optional_bool("screenshot", "Capture a screenshot after load", false)
            .optional_string(
                "markdown_extraction",
                "Markdown mode: none, basic or enhanced",
                "enhanced",
            )
            .optional_string(
                "response_format",
                "Result shape: full, content_only, minimal or llm",
                "full",
            )
            .optional_integer("depth", "Follow same-site links this many levels deep", 0)
            .optional_bool("force_sync", "Run inline even when estimated slow", false)
            .optional_string("session_id", "Reuse a named browser session", "")
            .build()
    }

    async fn execute(&self, mut args: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        // An empty session_id default means "no session".
        if args["session_id"].as_str() == Some("") {
            if let Some(object) = args.as_object_mut() {
                object.remove("session_id");
            }
        }
        let request = parse_request(&args, ctx)?;
        let format = request.options.response_format;

        match self.dispatcher.dispatch(request).await? {
            Dispatch::Inline(outcome) => Ok(outcome.to_response(format)),
            Dispatch::InlineSpan(batch) => Ok(json!({
                "success": true,
                "batch": serde_json::to_value(&*batch)?,
            })),
            Dispatch::Queued(ticket) => Ok(serde_json::to_value(&ticket)?),
        }
    }
}

/// Crawl inside a durable browser session so later tool calls observe the
/// cookies and page state this call establishes.
pub struct CrawlWithSessionTool {
    executor: Arc<dyn CrawlExecutor>,
}

impl CrawlWithSessionTool {
    pub fn new(executor: Arc<dyn CrawlExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for CrawlWithSessionTool {
    fn name(&self) -> &str {
        "crawl_with_session"
    }

    fn description(&self) -> &str {
        "Crawl a page inside a persistent browser session. Returns the \
         session_id; pass it to later calls to reuse cookies and login \
         state."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("url", "The URL to crawl")
            .optional_string("session_id", "Existing session to reuse", "")
            .optional_bool("javascript", "Enable JavaScript execution", true)
            .optional_string("javascript_payload", "Script to run after load", "")
            .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let url = args["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'url' is required"))?
            .to_string();
        let session_id = match args["session_id"].as_str() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let payload = args["javascript_payload"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let options = CrawlOptions {
            javascript: args["javascript"].as_bool().unwrap_or(true),
            javascript_payload: payload,
            session_id: Some(session_id.clone()),
            response_format: ResponseFormat::ContentOnly,
            ..CrawlOptions::default()
        };
        let request = CrawlRequest {
            url,
            session_id: Some(session_id),
            options,
            user_id: ctx.user_id.clone(),
        };

        let outcome = self.executor.run_page(&request).await;
        Ok(outcome.to_response(ResponseFormat::ContentOnly))
    }
}

/// Screenshot a page, storing the image as an artifact.
pub struct CaptureScreenshotTool {
    executor: Arc<dyn CrawlExecutor>,
}

impl CaptureScreenshotTool {
    pub fn new(executor: Arc<dyn CrawlExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for CaptureScreenshotTool {
    fn name(&self) -> &str {
        "capture_screenshot"
    }

    fn description(&self) -> &str {
        "Capture a screenshot of a web page and return the stored image's \
         retrieval URL."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("url", "The URL to screenshot")
            .optional_bool("full_page", "Capture the full page, not just the viewport", true)
            .optional_string("session_id", "Reuse a named browser session", "")
            .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let url = args["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'url' is required"))?
            .to_string();
        let session_id = args["session_id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let options = CrawlOptions {
            screenshot: true,
            screenshot_mode: if args["full_page"].as_bool().unwrap_or(true) {
                ScreenshotMode::Full
            } else {
                ScreenshotMode::Viewport
            },
            markdown_extraction: MarkdownMode::None,
            session_id: session_id.clone(),
            ..CrawlOptions::default()
        };
        let request = CrawlRequest {
            url,
            session_id,
            options,
            user_id: ctx.user_id.clone(),
        };

        let outcome = self.executor.run_page(&request).await;
        let Some(capture) = outcome.capture() else {
            return Ok(outcome.to_response(ResponseFormat::Minimal));
        };

        let image = capture
            .artifacts
            .iter()
            .find(|a| a.filename.ends_with(".png"));
        let mut response = json!({
            "success": true,
            "url": capture.url,
            "title": capture.title,
        });
        if let Some(image) = image {
            response["screenshot_url"] = json!(image.url);
            response["filename"] = json!(image.filename);
        }
        if let Some(error) = &capture.screenshot_error {
            response["screenshot_error"] = json!(error);
        }
        if let Some(session) = &capture.session_id {
            response["session_id"] = json!(session);
        }
        Ok(response)
    }
}

/// Run a script in a page and return what it evaluated to.
pub struct InjectJavascriptTool {
    executor: Arc<dyn CrawlExecutor>,
}

impl InjectJavascriptTool {
    pub fn new(executor: Arc<dyn CrawlExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for InjectJavascriptTool {
    fn name(&self) -> &str {
        "inject_javascript"
    }

    fn description(&self) -> &str {
        "Load a page and run JavaScript in it. Returns the script's result \
         envelope; a failing script still returns the page title."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("url", "The page to run the script in")
            .required_string("script", "JavaScript to evaluate after load")
            .optional_integer("script_timeout_ms", "Script timeout in milliseconds", 30_000)
            .optional_string("session_id", "Reuse a named browser session", "")
            .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let url = args["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'url' is required"))?
            .to_string();
        let script = args["script"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'script' is required"))?
            .to_string();
        let session_id = args["session_id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let options = CrawlOptions {
            javascript: true,
            javascript_payload: Some(script),
            script_timeout_ms: args["script_timeout_ms"].as_u64().unwrap_or(30_000),
            markdown_extraction: MarkdownMode::None,
            session_id: session_id.clone(),
            ..CrawlOptions::default()
        };
        let request = CrawlRequest {
            url,
            session_id,
            options,
            user_id: ctx.user_id.clone(),
        };

        let outcome = self.executor.run_page(&request).await;
        let Some(capture) = outcome.capture() else {
            return Ok(outcome.to_response(ResponseFormat::Minimal));
        };

        let mut response = json!({
            "success": true,
            "url": capture.url,
            "title": capture.title,
            "script_result": serde_json::to_value(&capture.script_result)?,
        });
        if let Some(ms) = capture.script_execution_ms {
            response["script_execution_ms"] = json!(ms);
        }
        if let Some(session) = &capture.session_id {
            response["session_id"] = json!(session);
        }
        Ok(response)
    }
}

/// Poll an asynchronous crawl job.
pub struct CheckJobStatusTool {
    jobs: Arc<JobRegistry>,
}

impl CheckJobStatusTool {
    pub fn new(jobs: Arc<JobRegistry>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Tool for CheckJobStatusTool {
    fn name(&self) -> &str {
        "check_job_status"
    }

    fn description(&self) -> &str {
        "Check the status of an asynchronous crawl job by job_id. Completed \
         jobs include their result."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("job_id", "The job id returned by an async crawl")
            .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let job_id = args["job_id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'job_id' is required"))?;

        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job '{job_id}' not found"))?;

        let mut response = json!({
            "success": true,
            "job_id": job.id,
            "type": job.kind,
            "status": job.status,
            "progress": job.progress,
            "created_at": job.created_at.to_rfc3339(),
            "updated_at": job.updated_at.to_rfc3339(),
            "check_url": job.check_url(),
        });
        match job.status {
            JobStatus::Completed => {
                response["result"] = job.result.unwrap_or(Value::Null);
            }
            JobStatus::Failed => {
                response["error"] = json!(job.error.unwrap_or_default());
            }
            _ => {}
        }
        Ok(response)
    }
}
