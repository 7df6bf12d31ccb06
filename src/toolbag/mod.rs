//! Tool-dispatch engine.
//!
//! Turns a user query plus a tool list into a looped LLM-and-tool
//! interaction: call the model, execute the `tool_use` blocks it emits,
//! feed the results back, repeat until the model stops asking or the
//! iteration cap fires. Per-chain usage budgets ("pop" mechanics) retire
//! tools from the model's menu as they exhaust; a retired tool cannot
//! reappear within the same chain.

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ServiceResult;
use crate::llm::{self, ChatRequest, ChatTurn, ContentBlock, LlmProvider, ToolChoice, TurnBlock};
use crate::tools::{ToolContext, ToolRegistry};
use crate::utils::constants::{DEFAULT_MAX_TOOL_ITERATIONS, DEFAULT_PROVIDER_MAX_TOKENS};

/// Per-chain mutable state. Never shared across concurrent chains; each
/// `execute_chain` call owns its own.
#[derive(Debug, Default)]
pub struct ChainState {
    usage_counts: HashMap<String, u32>,
    context: Map<String, Value>,
    session_store: HashMap<String, Map<String, Value>>,
}

impl ChainState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn usage(&self, tool: &str) -> u32 {
        self.usage_counts.get(tool).copied().unwrap_or(0)
    }

    fn is_exhausted(&self, tool: &str, limits: &HashMap<String, u32>) -> bool {
        match limits.get(tool) {
            Some(limit) => self.usage(tool) >= *limit,
            None => false,
        }
    }

    /// Reserve one use of a tool; refuses at the limit.
    fn try_acquire(&mut self, tool: &str, limits: &HashMap<String, u32>) -> bool {
        if self.is_exhausted(tool, limits) {
            return false;
        }
        *self.usage_counts.entry(tool.to_string()).or_insert(0) += 1;
        true
    }

    /// Persist a session surfaced by a tool result so later tools in the
    /// chain can name it.
    fn remember_session(&mut self, session_id: &str, result: &Value) {
        let data = result["session_data"]
            .as_object()
            .cloned()
            .unwrap_or_default();
        self.session_store.insert(session_id.to_string(), data);
    }
}

/// One tool invocation made during an execution.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub result: Value,
}

/// Result of one `execute` (a single model/tool loop).
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteOutcome {
    pub success: bool,
    /// Final assistant text.
    pub response: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub iterations: usize,
    /// The iteration cap fired while the model still wanted tools.
    pub truncated: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Chain abort policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainMode {
    /// A failed step logs and the chain continues (default).
    #[default]
    Continue,
    /// A failed step aborts the chain.
    Strict,
}

/// Result shape of `execute_chain`.
#[derive(Debug, Serialize)]
pub struct ChainResult {
    pub success: bool,
    pub results: Vec<Value>,
    pub tools_executed: usize,
    pub final_context: Map<String, Value>,
    pub session_store: HashMap<String, Map<String, Value>>,
}

/// Inputs for one `execute` call.
pub struct ExecuteSpec<'a> {
    pub tools: Vec<String>,
    pub query: &'a str,
    pub system: Option<&'a str>,
    pub model: Option<&'a str>,
    pub previous_result: Option<&'a Value>,
    pub user_id: Option<&'a str>,
}

/// The engine. Holds the registry by reference plus the per-tool budgets.
pub struct Toolbag {
    registry: Arc<ToolRegistry>,
    limits: HashMap<String, u32>,
    max_iterations: usize,
    max_tokens: u32,
}

impl Toolbag {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            limits: HashMap::new(),
            max_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            max_tokens: DEFAULT_PROVIDER_MAX_TOKENS,
        }
    }

    /// Apply the stock budget profile: session initialization once per
    /// chain, expensive analysis three times, screenshots ten.
    #[must_use]
    pub fn with_default_limits(mut self) -> Self {
        self.limits.insert("crawl_with_session".into(), 1);
        self.limits.insert("summarize_content".into(), 3);
        self.limits.insert("capture_screenshot".into(), 10);
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Cap how many times one tool may run within a single chain.
    pub fn set_tool_limit(&mut self, tool: impl Into<String>, max_uses: u32) {
        self.limits.insert(tool.into(), max_uses);
    }

    #[must_use]
    pub fn limit(&self, tool: &str) -> Option<u32> {
        self.limits.get(tool).copied()
    }

    /// Requested tools that are registered and not exhausted.
    fn available(&self, requested: &[String], state: &ChainState) -> Vec<String> {
        requested
            .iter()
            .filter(|name| self.registry.contains(name))
            .filter(|name| !state.is_exhausted(name, &self.limits))
            .cloned()
            .collect()
    }

    /// One model/tool loop against an already-resolved provider.
    pub async fn execute_with(
        &self,
        provider: &dyn LlmProvider,
        spec: ExecuteSpec<'_>,
        state: &mut ChainState,
    ) -> ExecuteOutcome {
        let model = spec
            .model
            .unwrap_or_else(|| provider.default_model())
            .to_string();
        let ctx = ToolContext {
            user_id: spec.user_id.map(str::to_string),
            previous_result: spec.previous_result.cloned(),
        };

        let mut messages = vec![ChatTurn::user_text(render_query(
            spec.query,
            spec.previous_result,
        ))];
        let mut invocations: Vec<ToolInvocation> = Vec::new();
        let mut session_id: Option<String> = None;
        let mut response_text = String::new();
        let mut truncated = false;
        let mut iteration = 0;

        loop {
            // Exhausted tools disappear from the menu on every turn.
            let offered = self.available(&spec.tools, state);
            let schemas = self.registry.schemas_for(&offered);

            let response = match provider
                .generate(ChatRequest {
                    model: model.clone(),
                    system: spec.system.map(str::to_string),
                    messages: messages.clone(),
                    tools: schemas,
                    tool_choice: ToolChoice::Auto,
                    max_tokens: self.max_tokens,
                })
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    return ExecuteOutcome {
                        success: false,
                        response: response_text,
                        tool_calls: invocations,
                        iterations: iteration,
                        truncated: false,
                        provider: provider.name().to_string(),
                        error: Some(e.to_string()),
                        session_id,
                    };
                }
            };

            response_text = response.text();
            let requested_uses: Vec<(String, String, Value)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if requested_uses.is_empty() {
                break;
            }
            if iteration + 1 >= self.max_iterations {
                debug!(iteration, "iteration cap reached with tool calls pending");
                truncated = true;
                break;
            }

            messages.push(ChatTurn::assistant(blocks_to_turn(&response.blocks)));

            // Tool executions within one iteration run sequentially so the
            // model sees an ordered result list.
            let mut results: Vec<(String, String)> = Vec::new();
            for (id, name, input) in requested_uses {
                let result = if state.try_acquire(&name, &self.limits) {
                    self.registry.execute(&name, input.clone(), &ctx).await
                } else {
                    warn!(tool = %name, "refusing exhausted tool requested by the model");
                    json!({
                        "success": false,
                        "error": format!("tool '{name}' has reached its usage limit"),
                    })
                };

                if let Some(sid) = result["session_id"].as_str() {
                    state.remember_session(sid, &result);
                    session_id = Some(sid.to_string());
                }

                results.push((
                    id.clone(),
                    serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string()),
                ));
                invocations.push(ToolInvocation {
                    id,
                    name,
                    input,
                    result,
                });
            }
            messages.push(ChatTurn::tool_results(results));
            iteration += 1;
        }

        ExecuteOutcome {
            success: true,
            response: response_text,
            tool_calls: invocations,
            iterations: iteration,
            truncated,
            provider: provider.name().to_string(),
            error: None,
            session_id,
        }
    }

    /// One model/tool loop, resolving the provider by name. Fresh state.
    pub async fn execute(
        &self,
        tools: Vec<String>,
        query: &str,
        provider: &str,
        model: Option<&str>,
        api_key: &str,
        previous_result: Option<&Value>,
    ) -> ServiceResult<ExecuteOutcome> {
        let provider = llm::provider_for(provider, api_key)?;
        let mut state = ChainState::new();
        Ok(self
            .execute_with(
                provider.as_ref(),
                ExecuteSpec {
                    tools,
                    query,
                    system: None,
                    model,
                    previous_result,
                    user_id: None,
                },
                &mut state,
            )
            .await)
    }

    /// Execute a tool sequence with context threading.
    ///
    /// Each step runs `execute` for one tool, forwarding the prior step's
    /// result. Exhausted tools are skipped with a warning; failed steps
    /// abort only in [`ChainMode::Strict`].
    pub async fn execute_chain_with(
        &self,
        provider: &dyn LlmProvider,
        tools: &[String],
        query: &str,
        mode: ChainMode,
        model: Option<&str>,
        user_id: Option<&str>,
    ) -> ChainResult {
        // Usage counts reset on every new chain.
        let mut state = ChainState::new();
        let mut results: Vec<Value> = Vec::new();
        let mut executed = 0;
        let mut previous: Option<Value> = None;
        let mut success = true;

        for (position, tool) in tools.iter().enumerate() {
            if state.is_exhausted(tool, &self.limits) {
                warn!(tool = %tool, position, "skipping exhausted tool in chain");
                continue;
            }

            let outcome = self
                .execute_with(
                    provider,
                    ExecuteSpec {
                        tools: vec![tool.clone()],
                        query,
                        system: None,
                        model,
                        previous_result: previous.as_ref(),
                        user_id,
                    },
                    &mut state,
                )
                .await;

            let step_failed = !outcome.success;
            let rendered = serde_json::to_value(&outcome).unwrap_or(Value::Null);
            executed += 1;

            if outcome.success {
                state
                    .context
                    .insert(format!("tool_{position}_{tool}"), rendered.clone());
            } else {
                warn!(tool = %tool, position, error = ?outcome.error, "chain step failed");
            }

            previous = Some(rendered.clone());
            results.push(rendered);

            if step_failed && mode == ChainMode::Strict {
                success = false;
                break;
            }
        }

        info!(
            steps = tools.len(),
            executed, success, "chain execution finished"
        );
        ChainResult {
            success,
            results,
            tools_executed: executed,
            final_context: state.context,
            session_store: state.session_store,
        }
    }

    /// Chain entry point resolving the provider by name.
    pub async fn execute_chain(
        &self,
        tools: &[String],
        query: &str,
        mode: ChainMode,
        provider: &str,
        model: Option<&str>,
        api_key: &str,
    ) -> ServiceResult<ChainResult> {
        let provider = llm::provider_for(provider, api_key)?;
        Ok(self
            .execute_chain_with(provider.as_ref(), tools, query, mode, model, None)
            .await)
    }
}

fn render_query(query: &str, previous: Option<&Value>) -> String {
    match previous {
        Some(value) => {
            let rendered =
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            format!("{query}\n\nResult of the previous step:\n```json\n{rendered}\n```")
        }
        None => query.to_string(),
    }
}

fn blocks_to_turn(blocks: &[ContentBlock]) -> Vec<TurnBlock> {
    blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => TurnBlock::Text { text: text.clone() },
            ContentBlock::ToolUse { id, name, input } => TurnBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_state_enforces_limits() {
        let mut limits = HashMap::new();
        limits.insert("crawl".to_string(), 2);
        let mut state = ChainState::new();

        assert!(state.try_acquire("crawl", &limits));
        assert!(state.try_acquire("crawl", &limits));
        assert!(!state.try_acquire("crawl", &limits));
        assert_eq!(state.usage("crawl"), 2);

        // Unlimited tools never exhaust.
        for _ in 0..10 {
            assert!(state.try_acquire("calculate", &limits));
        }
    }

    #[test]
    fn previous_results_are_rendered_into_the_query() {
        let previous = json!({"success": true, "response": "found it"});
        let rendered = render_query("continue", Some(&previous));
        assert!(rendered.starts_with("continue"));
        assert!(rendered.contains("found it"));
        assert_eq!(render_query("fresh", None), "fresh");
    }
}
