//! Anthropic messages-API implementation of the provider interface.

use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatRequest, ContentBlock, LlmProvider, ProviderResponse, ToolChoice, TurnBlock, Usage};
use crate::error::{ServiceError, ServiceResult};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";

/// Retry policy for transient provider failures.
#[derive(Debug, Clone)]
struct RetryConfig {
    max_retries: usize,
    initial_delay_ms: u64,
    backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            backoff_multiplier: 2.0,
        }
    }
}

pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryConfig,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Point at a different endpoint (local stub in tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn render_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    super::Role::User => "user",
                    super::Role::Assistant => "assistant",
                };
                let content: Vec<Value> = turn.blocks.iter().map(render_block).collect();
                json!({"role": role, "content": content})
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": messages,
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if !request.tools.is_empty() && request.tool_choice == ToolChoice::Auto {
            body["tools"] = Value::Array(request.tools.clone());
            body["tool_choice"] = json!({"type": "auto"});
        }
        body
    }

    async fn post_once(&self, body: &Value) -> ServiceResult<Value> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| self.error(format!("request failed: {e}")))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| self.error(format!("invalid response body: {e}")))?;

        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .unwrap_or("unknown API error")
                .to_string();
            return Err(self.error(format!("HTTP {status}: {message}")));
        }
        Ok(payload)
    }

    fn error(&self, message: String) -> ServiceError {
        ServiceError::ProviderError {
            provider: self.name().to_string(),
            message,
        }
    }
}

fn render_block(block: &TurnBlock) -> Value {
    match block {
        TurnBlock::Text { text } => json!({"type": "text", "text": text}),
        TurnBlock::ToolUse { id, name, input } => {
            json!({"type": "tool_use", "id": id, "name": name, "input": input})
        }
        TurnBlock::ToolResult {
            tool_use_id,
            content,
        } => json!({"type": "tool_result", "tool_use_id": tool_use_id, "content": content}),
        TurnBlock::Image { media_type, data } => json!({
            "type": "image",
            "source": {"type": "base64", "media_type": media_type, "data": data}
        }),
    }
}

fn parse_response(payload: &Value) -> ProviderResponse {
    let blocks = payload["content"]
        .as_array()
        .map(|content| {
            content
                .iter()
                .filter_map(|block| match block["type"].as_str() {
                    Some("text") => Some(ContentBlock::Text {
                        text: block["text"].as_str().unwrap_or_default().to_string(),
                    }),
                    Some("tool_use") => Some(ContentBlock::ToolUse {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        input: block["input"].clone(),
                    }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    ProviderResponse {
        blocks,
        usage: Usage {
            input_tokens: payload["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: payload["usage"]["output_tokens"].as_u64().unwrap_or(0),
        },
        stop_reason: payload["stop_reason"].as_str().map(str::to_string),
    }
}

/// Transient failures worth retrying: network errors and 429/5xx.
fn is_transient(err: &ServiceError) -> bool {
    let message = err.to_string();
    message.contains("request failed")
        || message.contains("HTTP 429")
        || message.contains("HTTP 5")
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn generate(&self, request: ChatRequest) -> ServiceResult<ProviderResponse> {
        let body = self.render_body(&request);
        let mut last_error = None;

        for attempt in 0..=self.retry.max_retries {
            match self.post_once(&body).await {
                Ok(payload) => {
                    let response = parse_response(&payload);
                    debug!(
                        model = %request.model,
                        blocks = response.blocks.len(),
                        stop_reason = ?response.stop_reason,
                        "provider call complete"
                    );
                    return Ok(response);
                }
                Err(e) if is_transient(&e) && attempt < self.retry.max_retries => {
                    let delay = (self.retry.initial_delay_ms as f64
                        * self.retry.backoff_multiplier.powi(attempt as i32))
                        as u64;
                    warn!(attempt, delay_ms = delay, error = %e, "retrying provider call");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| self.error("all retry attempts failed".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatTurn, Role};

    #[test]
    fn body_includes_tools_only_when_offered() {
        let provider = AnthropicProvider::new("key");
        let mut request = ChatRequest {
            model: DEFAULT_MODEL.into(),
            system: None,
            messages: vec![ChatTurn::user_text("hi")],
            tools: vec![json!({"name": "crawl_webpage"})],
            tool_choice: ToolChoice::Auto,
            max_tokens: 64,
        };
        let body = provider.render_body(&request);
        assert_eq!(body["tool_choice"]["type"], "auto");
        assert_eq!(body["tools"][0]["name"], "crawl_webpage");

        request.tool_choice = ToolChoice::None;
        let body = provider.render_body(&request);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn turns_render_in_wire_shape() {
        let provider = AnthropicProvider::new("key");
        let request = ChatRequest {
            model: DEFAULT_MODEL.into(),
            system: Some("be brief".into()),
            messages: vec![
                ChatTurn::user_text("crawl example.com"),
                ChatTurn {
                    role: Role::Assistant,
                    blocks: vec![TurnBlock::ToolUse {
                        id: "t1".into(),
                        name: "crawl_webpage".into(),
                        input: json!({"url": "https://example.com"}),
                    }],
                },
                ChatTurn::tool_results(vec![("t1".into(), "{\"success\":true}".into())]),
            ],
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
            max_tokens: 64,
        };
        let body = provider.render_body(&request);
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(
            body["messages"][2]["content"][0]["tool_use_id"],
            "t1"
        );
    }

    #[test]
    fn parses_text_and_tool_use_blocks() {
        let payload = json!({
            "content": [
                {"type": "text", "text": "looking"},
                {"type": "tool_use", "id": "t9", "name": "crawl_webpage",
                 "input": {"url": "https://example.com"}}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 20},
            "stop_reason": "tool_use"
        });
        let response = parse_response(&payload);
        assert_eq!(response.text(), "looking");
        assert_eq!(response.tool_uses().len(), 1);
        assert_eq!(response.usage.output_tokens, 20);
    }
}
