//! LLM provider interface.
//!
//! The toolbag and the post-crawl enrichment steps depend only on this
//! shape: a `generate` call taking messages plus tool schemas and returning
//! text and `tool_use` content blocks. One concrete HTTP implementation
//! ships in-tree (`anthropic`); tests substitute scripted providers.

mod anthropic;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};

pub use anthropic::AnthropicProvider;

/// Content block in a provider response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
}

/// Message block sent to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Base64-encoded inline image, used for OCR over screenshots.
    Image {
        media_type: String,
        data: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub blocks: Vec<TurnBlock>,
}

impl ChatTurn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![TurnBlock::Text { text: text.into() }],
        }
    }

    #[must_use]
    pub fn assistant(blocks: Vec<TurnBlock>) -> Self {
        Self {
            role: Role::Assistant,
            blocks,
        }
    }

    /// Synthetic user turn carrying tool results back to the model.
    #[must_use]
    pub fn tool_results(results: Vec<(String, String)>) -> Self {
        Self {
            role: Role::User,
            blocks: results
                .into_iter()
                .map(|(tool_use_id, content)| TurnBlock::ToolResult {
                    tool_use_id,
                    content,
                })
                .collect(),
        }
    }
}

/// Tool selection policy passed through to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
}

/// One `generate` call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatTurn>,
    /// Wire-format tool schemas: `{name, description, input_schema}`.
    pub tools: Vec<Value>,
    pub tool_choice: ToolChoice,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Parsed provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub blocks: Vec<ContentBlock>,
    pub usage: Usage,
    pub stop_reason: Option<String>,
}

impl ProviderResponse {
    /// Concatenated text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool invocations requested by the model, in emission order.
    #[must_use]
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                ContentBlock::Text { .. } => None,
            })
            .collect()
    }
}

/// A tool-calling LLM provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    async fn generate(&self, request: ChatRequest) -> ServiceResult<ProviderResponse>;
}

/// Resolve a provider by name.
pub fn provider_for(name: &str, api_key: &str) -> ServiceResult<Arc<dyn LlmProvider>> {
    match name.to_lowercase().as_str() {
        "anthropic" => Ok(Arc::new(AnthropicProvider::new(api_key))),
        other => Err(ServiceError::ProviderError {
            provider: other.to_string(),
            message: "unsupported provider".to_string(),
        }),
    }
}

/// Summarize page content with a plain text request.
pub async fn summarize(
    provider: &dyn LlmProvider,
    model: Option<&str>,
    content: &str,
    max_tokens: u32,
) -> ServiceResult<String> {
    let prompt = format!(
        "Summarize the following web page content in a few short paragraphs. \
         Keep concrete facts, names and numbers.\n\n{content}"
    );
    let response = provider
        .generate(ChatRequest {
            model: model.unwrap_or(provider.default_model()).to_string(),
            system: None,
            messages: vec![ChatTurn::user_text(prompt)],
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
            max_tokens,
        })
        .await?;
    Ok(response.text())
}

/// Extract visible text from a PNG screenshot via the provider's vision path.
pub async fn image_text(
    provider: &dyn LlmProvider,
    model: Option<&str>,
    png_bytes: &[u8],
    max_tokens: u32,
) -> ServiceResult<String> {
    use base64::Engine;
    let data = base64::engine::general_purpose::STANDARD.encode(png_bytes);
    let turn = ChatTurn {
        role: Role::User,
        blocks: vec![
            TurnBlock::Image {
                media_type: "image/png".to_string(),
                data,
            },
            TurnBlock::Text {
                text: "Transcribe all readable text in this screenshot. \
                       Return only the text, top to bottom."
                    .to_string(),
            },
        ],
    };
    let response = provider
        .generate(ChatRequest {
            model: model.unwrap_or(provider.default_model()).to_string(),
            system: None,
            messages: vec![turn],
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
            max_tokens,
        })
        .await?;
    Ok(response.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_splits_text_and_tool_uses() {
        let response = ProviderResponse {
            blocks: vec![
                ContentBlock::Text {
                    text: "thinking ".into(),
                },
                ContentBlock::ToolUse {
                    id: "t1".into(),
                    name: "crawl_webpage".into(),
                    input: json!({"url": "https://example.com"}),
                },
                ContentBlock::Text {
                    text: "done".into(),
                },
            ],
            usage: Usage::default(),
            stop_reason: Some("tool_use".into()),
        };
        assert_eq!(response.text(), "thinking done");
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "crawl_webpage");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(provider_for("frontier-9000", "key").is_err());
        assert!(provider_for("anthropic", "key").is_ok());
    }
}
