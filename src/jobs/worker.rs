//! Async job worker.
//!
//! Drains the registry: claim the oldest pending job, execute its body,
//! write the result or error back, repeat. A crash inside a job body marks
//! the job failed; partial work is discarded, the record stays consistent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{BatchJobRequest, Job, JobKind, JobRegistry};
use crate::crawler::{CrawlExecutor, CrawlOutcome, CrawlRequest};
use crate::error::ServiceResult;
use crate::utils::constants::WORKER_POLL_INTERVAL;

pub struct JobWorker {
    registry: Arc<JobRegistry>,
    executor: Arc<dyn CrawlExecutor>,
    poll_interval: Duration,
}

impl JobWorker {
    pub fn new(registry: Arc<JobRegistry>, executor: Arc<dyn CrawlExecutor>) -> Self {
        Self {
            registry,
            executor,
            poll_interval: WORKER_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Claim and execute at most one job. Returns whether a job ran.
    pub async fn tick(&self) -> ServiceResult<bool> {
        let Some(job) = self.registry.claim_next_pending().await? else {
            return Ok(false);
        };

        let job_id = job.id.clone();
        debug!(job_id = %job_id, kind = job.kind.as_str(), "executing job");

        // The body runs in its own task so a panic cannot take the worker
        // down with it; the job is failed instead.
        let registry = Arc::clone(&self.registry);
        let executor = Arc::clone(&self.executor);
        let handle = tokio::spawn(async move { execute_job(registry, executor, job).await });

        if let Err(join_err) = handle.await {
            error!(job_id = %job_id, error = %join_err, "job body crashed");
            if let Err(e) = self
                .registry
                .fail(&job_id, &format!("worker crashed: {join_err}"))
                .await
            {
                warn!(job_id = %job_id, error = %e, "failed to mark crashed job");
            }
        }
        Ok(true)
    }

    /// Drain jobs until `shutdown` flips.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        info!("job worker started");
        while !shutdown.load(Ordering::Relaxed) {
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    warn!(error = %e, "worker tick failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
        info!("job worker stopped");
    }
}

async fn execute_job(
    registry: Arc<JobRegistry>,
    executor: Arc<dyn CrawlExecutor>,
    job: Job,
) {
    if let Err(e) = registry.update_progress(&job.id, 10).await {
        warn!(job_id = %job.id, error = %e, "progress update failed");
    }

    let finished: Result<serde_json::Value, String> = match job.kind {
        JobKind::Crawl => match serde_json::from_value::<CrawlRequest>(job.metadata.clone()) {
            Ok(request) => {
                if request.options.depth > 0 {
                    let outcome = executor.run_span(&request).await;
                    serde_json::to_value(&outcome).map_err(|e| e.to_string())
                } else {
                    match executor.run_page(&request).await {
                        CrawlOutcome::Success(capture) => {
                            serde_json::to_value(&*capture).map_err(|e| e.to_string())
                        }
                        CrawlOutcome::Failure { kind, message } => {
                            Err(format!("{}: {message}", kind.as_str()))
                        }
                    }
                }
            }
            Err(e) => Err(format!("invalid crawl job metadata: {e}")),
        },
        JobKind::BatchCrawl => {
            match serde_json::from_value::<BatchJobRequest>(job.metadata.clone()) {
                Ok(request) => {
                    let outcome = executor
                        .run_batch(&request.urls, &request.options, request.user_id.as_deref())
                        .await;
                    serde_json::to_value(&outcome).map_err(|e| e.to_string())
                }
                Err(e) => Err(format!("invalid batch job metadata: {e}")),
            }
        }
    };

    let write = match finished {
        Ok(result) => registry.complete(&job.id, result).await,
        Err(message) => registry.fail(&job.id, &message).await,
    };
    if let Err(e) = write {
        error!(job_id = %job.id, error = %e, "failed to finalize job");
        // Last resort so the job does not stay running forever.
        let _ = registry
            .fail(&job.id, &format!("finalization failed: {e}"))
            .await;
    }
}

