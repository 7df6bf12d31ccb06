//! Session management tools.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{SchemaBuilder, Tool, ToolContext};
use crate::session::BrowserSessionPool;

/// List the live browser sessions.
pub struct ListSessionsTool {
    sessions: Arc<BrowserSessionPool>,
}

impl ListSessionsTool {
    pub fn new(sessions: Arc<BrowserSessionPool>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Tool for ListSessionsTool {
    fn name(&self) -> &str {
        "list_sessions"
    }

    fn description(&self) -> &str {
        "List active browser sessions with their metadata and idle time."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new().build()
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let sessions = self.sessions.active_sessions().await;
        Ok(json!({
            "success": true,
            "count": sessions.len(),
            "sessions": serde_json::to_value(&sessions)?,
        }))
    }
}

/// Close one browser session.
pub struct CloseSessionTool {
    sessions: Arc<BrowserSessionPool>,
}

impl CloseSessionTool {
    pub fn new(sessions: Arc<BrowserSessionPool>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Tool for CloseSessionTool {
    fn name(&self) -> &str {
        "close_session"
    }

    fn description(&self) -> &str {
        "Close a browser session and release its browser."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("session_id", "The session to close")
            .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let session_id = args["session_id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'session_id' is required"))?;
        let closed = self.sessions.close(session_id).await;
        Ok(json!({
            "success": closed,
            "session_id": session_id,
            "error": if closed { Value::Null } else { json!("session not found") },
        }))
    }
}
