pub mod browser;
pub mod config;
pub mod crawler;
pub mod dispatch;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod markdown;
pub mod session;
pub mod storage;
pub mod toolbag;
pub mod tools;
pub mod utils;
pub mod workflows;

pub use browser::{BrowserDriver, PdfOptions, ScriptOutcome};
pub use config::ServiceConfig;
pub use crawler::{
    BatchOutcome, CrawlExecutor, CrawlOptions, CrawlOrchestrator, CrawlOutcome, CrawlRequest,
    PageCapture, ResponseFormat,
};
pub use dispatch::{Dispatch, Dispatcher, JobTicket, estimate_seconds};
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use jobs::{Job, JobKind, JobRegistry, JobStatus, JobWorker};
pub use llm::{AnthropicProvider, LlmProvider};
pub use markdown::{ContentFilter, MarkdownMode, MarkdownRendering};
pub use session::{BrowserSessionPool, SessionPool, SessionResource};
pub use storage::{ArtifactRef, ArtifactWriter, BlobStore, LocalStore};
pub use toolbag::{ChainMode, ChainResult, ExecuteOutcome, Toolbag};
pub use tools::{ToolContext, ToolDeps, ToolRegistry, register_default_tools};
pub use workflows::{Workflow, workflow, workflow_names};

use std::sync::Arc;

/// Everything a running service needs, wired together.
pub struct Service {
    pub config: Arc<ServiceConfig>,
    pub sessions: Arc<BrowserSessionPool>,
    pub orchestrator: Arc<CrawlOrchestrator>,
    pub dispatcher: Arc<Dispatcher>,
    pub jobs: Arc<JobRegistry>,
    pub registry: Arc<ToolRegistry>,
    pub toolbag: Toolbag,
}

impl Service {
    /// Build the full service stack over local storage.
    pub async fn build(config: ServiceConfig) -> ServiceResult<Self> {
        let config = Arc::new(config);
        let store = Arc::new(LocalStore::new(
            config.storage_root(),
            config.public_url_prefix(),
        ));
        let artifacts = Arc::new(ArtifactWriter::new(store));
        let sessions =
            SessionPool::new(config.session_idle_ttl(), config.session_sweep_interval());
        let orchestrator = Arc::new(CrawlOrchestrator::new(
            Arc::clone(&config),
            Arc::clone(&sessions),
            artifacts,
        ));
        let jobs = Arc::new(JobRegistry::open(&config.jobs_db_path()).await?);
        let dispatcher = Arc::new(Dispatcher::new(
            orchestrator.clone() as Arc<dyn CrawlExecutor>,
            Arc::clone(&jobs),
            config.sync_threshold_secs(),
        ));

        let mut registry = ToolRegistry::new();
        let deps = ToolDeps {
            dispatcher: Arc::clone(&dispatcher),
            executor: orchestrator.clone() as Arc<dyn CrawlExecutor>,
            sessions: Arc::clone(&sessions),
            jobs: Arc::clone(&jobs),
        };
        register_default_tools(&mut registry, &deps)?;
        let registry = Arc::new(registry);
        let toolbag = Toolbag::new(Arc::clone(&registry))
            .with_max_iterations(config.max_tool_iterations())
            .with_default_limits();

        Ok(Self {
            config,
            sessions,
            orchestrator,
            dispatcher,
            jobs,
            registry,
            toolbag,
        })
    }

    /// Spawn the async job worker; returns its shutdown flag.
    pub fn start_worker(&self) -> Arc<std::sync::atomic::AtomicBool> {
        let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let worker = JobWorker::new(
            Arc::clone(&self.jobs),
            self.orchestrator.clone() as Arc<dyn CrawlExecutor>,
        );
        let flag = Arc::clone(&shutdown);
        tokio::spawn(async move {
            worker.run(flag).await;
        });
        shutdown
    }

    /// Tear down sessions and stop accepting work.
    pub async fn shutdown(&self) {
        self.sessions.close_all().await;
    }
}
