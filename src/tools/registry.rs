//! Tool registry: append-only map of named operations.

use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Tool, ToolContext};
use crate::error::{ServiceError, ServiceResult};

/// One registry value constructed at startup and handed to the toolbag by
/// reference. Additions are allowed while wiring up; replacements are not.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Re-registering a name is an error, not a
    /// replacement.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> ServiceResult<()> {
        let name = tool.name().to_string();
        if name.is_empty() || name.len() > 128 || name.chars().any(char::is_control) {
            return Err(ServiceError::InvalidInput(format!(
                "invalid tool name: {name:?}"
            )));
        }
        if self.tools.contains_key(&name) {
            return Err(ServiceError::InvalidInput(format!(
                "tool '{name}' is already registered"
            )));
        }
        debug!(tool = %name, "tool registered");
        self.tools.insert(name, tool);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted tool names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Public wire schemas (no executor references), sorted by name.
    #[must_use]
    pub fn schemas(&self) -> Vec<Value> {
        let mut schemas: Vec<(String, Value)> = self
            .tools
            .values()
            .map(|tool| {
                (
                    tool.name().to_string(),
                    json!({
                        "name": tool.name(),
                        "description": tool.description(),
                        "input_schema": tool.input_schema(),
                    }),
                )
            })
            .collect();
        schemas.sort_by(|a, b| a.0.cmp(&b.0));
        schemas.into_iter().map(|(_, schema)| schema).collect()
    }

    /// Wire schemas for a subset of tools, preserving the requested order.
    #[must_use]
    pub fn schemas_for(&self, names: &[String]) -> Vec<Value> {
        names
            .iter()
            .filter_map(|name| self.get(name))
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "input_schema": tool.input_schema(),
                })
            })
            .collect()
    }

    /// Execute a tool, capturing every failure into an error envelope the
    /// model can read.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> Value {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "unknown tool requested");
            return json!({
                "success": false,
                "error": format!("unknown tool '{name}'"),
                "error_kind": "tool_unknown",
            });
        };

        match tool.execute(args, ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "tool execution failed");
                json!({
                    "success": false,
                    "error": format!("{e:#}"),
                    "error_kind": "tool_exec_error",
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the arguments back"
        }
        fn input_schema(&self) -> Value {
            crate::tools::SchemaBuilder::new()
                .required_string("text", "text to echo")
                .build()
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
            let text = args["text"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("missing text"))?;
            Ok(json!({"success": true, "echo": text}))
        }
    }

    #[tokio::test]
    async fn register_execute_and_reject_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        assert!(registry.register(Arc::new(EchoTool)).is_err());

        let ctx = ToolContext::default();
        let result = registry
            .execute("echo", json!({"text": "hi"}), &ctx)
            .await;
        assert_eq!(result["echo"], "hi");
    }

    #[tokio::test]
    async fn failures_become_envelopes() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let ctx = ToolContext::default();

        let unknown = registry.execute("nope", json!({}), &ctx).await;
        assert_eq!(unknown["success"], false);
        assert_eq!(unknown["error_kind"], "tool_unknown");

        let bad_args = registry.execute("echo", json!({}), &ctx).await;
        assert_eq!(bad_args["success"], false);
        assert_eq!(bad_args["error_kind"], "tool_exec_error");
    }

    #[test]
    fn schemas_have_the_wire_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0]["name"], "echo");
        assert_eq!(schemas[0]["input_schema"]["type"], "object");
    }
}
