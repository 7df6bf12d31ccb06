//! Anthropic provider wire behavior against a local HTTP stub.

use serde_json::json;

use lamprey::llm::{AnthropicProvider, ChatRequest, ChatTurn, LlmProvider, ToolChoice};

fn request() -> ChatRequest {
    ChatRequest {
        model: "test-model".into(),
        system: None,
        messages: vec![ChatTurn::user_text("crawl example.com")],
        tools: vec![json!({
            "name": "crawl_webpage",
            "description": "crawl a page",
            "input_schema": {"type": "object", "properties": {}, "required": []}
        })],
        tool_choice: ToolChoice::Auto,
        max_tokens: 128,
    }
}

#[tokio::test]
async fn parses_tool_use_responses() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "content": [
                    {"type": "text", "text": "fetching now"},
                    {"type": "tool_use", "id": "toolu_1", "name": "crawl_webpage",
                     "input": {"url": "https://example.com"}}
                ],
                "usage": {"input_tokens": 12, "output_tokens": 34},
                "stop_reason": "tool_use"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = AnthropicProvider::new("test-key").with_base_url(server.url());
    let response = provider.generate(request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.text(), "fetching now");
    let uses = response.tool_uses();
    assert_eq!(uses.len(), 1);
    assert_eq!(uses[0].1, "crawl_webpage");
    assert_eq!(uses[0].2["url"], "https://example.com");
    assert_eq!(response.usage.output_tokens, 34);
}

#[tokio::test]
async fn auth_failures_surface_as_provider_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"error": {"type": "authentication_error", "message": "invalid x-api-key"}})
                .to_string(),
        )
        .create_async()
        .await;

    let provider = AnthropicProvider::new("bad-key").with_base_url(server.url());
    let err = provider.generate(request()).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("anthropic"));
    assert!(message.contains("invalid x-api-key"));
}
