//! Schema-described operations an LLM can invoke.
//!
//! Tools register explicitly at startup into a [`ToolRegistry`] the toolbag
//! holds by reference; there is no global registry. Each tool declares a
//! JSON-schema for its inputs via [`SchemaBuilder`].

mod content;
mod crawl;
mod registry;
mod schema;
mod sessions;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::crawler::CrawlExecutor;
use crate::dispatch::Dispatcher;
use crate::error::ServiceResult;
use crate::jobs::JobRegistry;
use crate::session::BrowserSessionPool;

pub use content::{CalculateTool, ExtractMarkdownTool, SuggestUrlTool, SummarizeContentTool};
pub use crawl::{
    CaptureScreenshotTool, CheckJobStatusTool, CrawlWebpageTool, CrawlWithSessionTool,
    InjectJavascriptTool,
};
pub use registry::ToolRegistry;
pub use schema::SchemaBuilder;
pub use sessions::{CloseSessionTool, ListSessionsTool};

/// Per-execution context handed to every tool.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Identity whose storage bucket receives artifacts.
    pub user_id: Option<String>,
    /// Result of the previous step in a chain, when present.
    pub previous_result: Option<Value>,
}

/// A named, schema-described operation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON-schema object: `{type: "object", properties, required}`.
    fn input_schema(&self) -> Value;

    /// Execute with already-parsed arguments. Errors are captured into a
    /// `{success: false, error}` envelope by the registry, never thrown at
    /// the model.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value>;
}

/// Shared handles the built-in tools close over.
#[derive(Clone)]
pub struct ToolDeps {
    pub dispatcher: Arc<Dispatcher>,
    pub executor: Arc<dyn CrawlExecutor>,
    pub sessions: Arc<BrowserSessionPool>,
    pub jobs: Arc<JobRegistry>,
}

/// Register the built-in tool set.
pub fn register_default_tools(registry: &mut ToolRegistry, deps: &ToolDeps) -> ServiceResult<()> {
    registry.register(Arc::new(CrawlWebpageTool::new(deps.dispatcher.clone())))?;
    registry.register(Arc::new(CrawlWithSessionTool::new(deps.executor.clone())))?;
    registry.register(Arc::new(CaptureScreenshotTool::new(deps.executor.clone())))?;
    registry.register(Arc::new(InjectJavascriptTool::new(deps.executor.clone())))?;
    registry.register(Arc::new(CheckJobStatusTool::new(deps.jobs.clone())))?;
    registry.register(Arc::new(ExtractMarkdownTool))?;
    registry.register(Arc::new(SummarizeContentTool))?;
    registry.register(Arc::new(SuggestUrlTool))?;
    registry.register(Arc::new(CalculateTool))?;
    registry.register(Arc::new(ListSessionsTool::new(deps.sessions.clone())))?;
    registry.register(Arc::new(CloseSessionTool::new(deps.sessions.clone())))?;
    Ok(())
}
