//! Shared test doubles: a scripted crawl executor and a scripted LLM
//! provider, so dispatcher, worker and toolbag behavior can be exercised
//! without a browser or network.
//
// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use lamprey::crawler::{
    BatchItem, BatchOutcome, CrawlExecutor, CrawlOptions, CrawlOutcome, CrawlRequest, PageCapture,
};
use lamprey::error::{ErrorKind, ServiceResult};
use lamprey::llm::{ChatRequest, ContentBlock, LlmProvider, ProviderResponse, Usage};

/// A successful capture for `url` with predictable fields.
#[allow(dead_code)]
pub fn capture_for(url: &str) -> CrawlOutcome {
    CrawlOutcome::Success(Box::new(PageCapture {
        url: url.to_string(),
        title: format!("Title: {url}"),
        html: "<html><body><p>stub body</p></body></html>".to_string(),
        markdown: Some("stub markdown body".to_string()),
        extracted_text: Some("stub body".to_string()),
        word_count: 2,
        elapsed_ms: 42,
        ..PageCapture::default()
    }))
}

/// Crawl executor that never touches a browser.
///
/// URLs containing `fail` produce failures; everything else succeeds.
pub struct StubExecutor {
    pub pages_run: AtomicUsize,
}

#[allow(dead_code)]
impl StubExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pages_run: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CrawlExecutor for StubExecutor {
    async fn run_page(&self, request: &CrawlRequest) -> CrawlOutcome {
        self.pages_run.fetch_add(1, Ordering::SeqCst);
        if request.url.contains("fail") {
            CrawlOutcome::failure(ErrorKind::Fatal, "stub failure")
        } else {
            let mut outcome = capture_for(&request.url);
            if let CrawlOutcome::Success(capture) = &mut outcome {
                capture.session_id = request.session_id().map(str::to_string);
            }
            outcome
        }
    }

    async fn run_span(&self, request: &CrawlRequest) -> BatchOutcome {
        let urls = vec![
            request.url.clone(),
            format!("{}/child-a", request.url.trim_end_matches('/')),
            format!("{}/child-b", request.url.trim_end_matches('/')),
        ];
        let mut items = Vec::new();
        for url in &urls {
            let outcome = self.run_page(&CrawlRequest::new(url.clone())).await;
            items.push(BatchItem::from_outcome(url, &outcome));
        }
        BatchOutcome::aggregate(items, 3.0)
    }

    async fn run_batch(
        &self,
        urls: &[String],
        _options: &CrawlOptions,
        _user_id: Option<&str>,
    ) -> BatchOutcome {
        let mut items = Vec::new();
        for url in urls {
            let outcome = self.run_page(&CrawlRequest::new(url.clone())).await;
            items.push(BatchItem::from_outcome(url, &outcome));
        }
        BatchOutcome::aggregate(items, urls.len() as f64)
    }
}

/// Provider response containing a single tool invocation.
#[allow(dead_code)]
pub fn tool_use_response(id: &str, name: &str, input: Value) -> ProviderResponse {
    ProviderResponse {
        blocks: vec![
            ContentBlock::Text {
                text: format!("calling {name}"),
            },
            ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            },
        ],
        usage: Usage::default(),
        stop_reason: Some("tool_use".to_string()),
    }
}

/// Plain text provider response.
#[allow(dead_code)]
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        blocks: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        usage: Usage::default(),
        stop_reason: Some("end_turn".to_string()),
    }
}

/// LLM provider that replays a script of canned responses.
///
/// When the script runs dry it returns plain text, ending any loop. When
/// `always_call` is set it instead keeps requesting the named tool for as
/// long as that tool is offered in the request's schema list.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    pub requests: Mutex<Vec<ChatRequest>>,
    always_call: Option<String>,
    counter: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            always_call: None,
            counter: AtomicUsize::new(0),
        }
    }

    /// A provider that calls `tool` whenever it is offered.
    pub fn eager(tool: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            always_call: Some(tool.to_string()),
            counter: AtomicUsize::new(0),
        }
    }

    /// Tool names offered to the model on the `nth` request.
    pub async fn offered_tools(&self, nth: usize) -> Vec<String> {
        let requests = self.requests.lock().await;
        requests[nth]
            .tools
            .iter()
            .filter_map(|t| t["name"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, request: ChatRequest) -> ServiceResult<ProviderResponse> {
        let offered: Vec<String> = request
            .tools
            .iter()
            .filter_map(|t| t["name"].as_str().map(str::to_string))
            .collect();
        self.requests.lock().await.push(request);

        if let Some(tool) = &self.always_call {
            if offered.iter().any(|name| name == tool) {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                return Ok(tool_use_response(
                    &format!("use-{n}"),
                    tool,
                    json!({"expression": "1 + 1"}),
                ));
            }
            return Ok(text_response("no tools left to call"));
        }

        let mut responses = self.responses.lock().await;
        Ok(responses
            .pop_front()
            .unwrap_or_else(|| text_response("script exhausted")))
    }
}
