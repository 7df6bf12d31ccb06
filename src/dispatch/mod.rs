//! Sync/async dispatch.
//!
//! A closed-form cost estimate routes each request: cheap crawls run
//! inline and return their result; expensive ones become jobs and return a
//! handle. Batches of more than one URL always queue.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::crawler::{BatchOutcome, CrawlExecutor, CrawlOptions, CrawlOutcome, CrawlRequest};
use crate::error::{ServiceError, ServiceResult};
use crate::jobs::{BatchJobRequest, JobKind, JobRegistry};
use crate::markdown::MarkdownMode;
use crate::utils::constants::{
    ESTIMATE_BASE_SECS, ESTIMATE_FULL_CONTENT_SECS, ESTIMATE_JS_SECS, ESTIMATE_SCREENSHOT_SECS,
};
use crate::utils::is_valid_url;

/// Predicted crawl duration in seconds for one URL.
///
/// Baseline page load, plus per-option surcharges, multiplied across the
/// pages a multi-page crawl will visit.
#[must_use]
pub fn estimate_seconds(options: &CrawlOptions) -> f64 {
    let mut estimate = ESTIMATE_BASE_SECS;
    if options.javascript {
        estimate += ESTIMATE_JS_SECS;
    }
    if options.screenshot {
        estimate += ESTIMATE_SCREENSHOT_SECS;
    }
    if options.markdown_extraction == MarkdownMode::Enhanced {
        estimate += ESTIMATE_FULL_CONTENT_SECS;
    }
    if options.depth > 0 {
        estimate *= f64::from(options.depth) + 1.0;
    }
    estimate
}

/// Where a request is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Inline,
    Queue,
}

/// Pure routing decision: forced-sync or under-threshold runs inline.
#[must_use]
pub fn route(options: &CrawlOptions, threshold_secs: f64) -> Route {
    if options.force_sync || estimate_seconds(options) < threshold_secs {
        Route::Inline
    } else {
        Route::Queue
    }
}

/// Handle returned for queued work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTicket {
    #[serde(rename = "async")]
    pub is_async: bool,
    pub job_id: String,
    pub status: String,
    pub estimated_time: f64,
    pub check_url: String,
}

impl JobTicket {
    fn pending(job_id: String, estimated_time: f64) -> Self {
        let check_url = format!("/jobs/{job_id}");
        Self {
            is_async: true,
            job_id,
            status: "pending".to_string(),
            estimated_time,
            check_url,
        }
    }
}

/// Result of dispatching one request.
#[derive(Debug)]
pub enum Dispatch {
    /// Ran inline; the crawl result is ready.
    Inline(Box<CrawlOutcome>),
    /// Ran inline as a multi-page span.
    InlineSpan(Box<BatchOutcome>),
    /// Queued; poll the job.
    Queued(JobTicket),
}

/// Front door for crawl execution.
pub struct Dispatcher {
    executor: Arc<dyn CrawlExecutor>,
    jobs: Arc<JobRegistry>,
    threshold_secs: f64,
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn CrawlExecutor>, jobs: Arc<JobRegistry>, threshold_secs: f64) -> Self {
        Self {
            executor,
            jobs,
            threshold_secs,
        }
    }

    #[must_use]
    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    /// Route one request to inline execution or the job queue.
    pub async fn dispatch(&self, request: CrawlRequest) -> ServiceResult<Dispatch> {
        if !is_valid_url(&request.url) {
            return Err(ServiceError::InvalidInput(format!(
                "not a crawlable URL: {}",
                request.url
            )));
        }

        let estimate = estimate_seconds(&request.options);
        match route(&request.options, self.threshold_secs) {
            Route::Inline => {
                debug!(url = %request.url, estimate, "dispatching inline");
                if request.options.depth > 0 {
                    let outcome = self.executor.run_span(&request).await;
                    Ok(Dispatch::InlineSpan(Box::new(outcome)))
                } else {
                    let outcome = self.executor.run_page(&request).await;
                    Ok(Dispatch::Inline(Box::new(outcome)))
                }
            }
            Route::Queue => {
                let metadata = serde_json::to_value(&request)
                    .map_err(|e| ServiceError::InvalidInput(format!("unserializable request: {e}")))?;
                let job_id = self.jobs.create(JobKind::Crawl, metadata).await?;
                info!(url = %request.url, job_id = %job_id, estimate, "crawl queued");
                Ok(Dispatch::Queued(JobTicket::pending(job_id, estimate)))
            }
        }
    }

    /// Queue a batch. Batches of more than one URL are always async.
    pub async fn dispatch_batch(
        &self,
        urls: Vec<String>,
        options: CrawlOptions,
        user_id: Option<String>,
    ) -> ServiceResult<JobTicket> {
        if urls.is_empty() {
            return Err(ServiceError::InvalidInput("empty URL list".into()));
        }
        if let Some(bad) = urls.iter().find(|u| !is_valid_url(u)) {
            return Err(ServiceError::InvalidInput(format!(
                "not a crawlable URL: {bad}"
            )));
        }

        let estimate = estimate_seconds(&options) * urls.len() as f64;
        let batch = BatchJobRequest {
            urls,
            options,
            user_id,
        };
        let metadata = serde_json::to_value(&batch)
            .map_err(|e| ServiceError::InvalidInput(format!("unserializable batch: {e}")))?;
        let job_id = self.jobs.create(JobKind::BatchCrawl, metadata).await?;
        info!(job_id = %job_id, urls = batch.urls.len(), estimate, "batch queued");
        Ok(JobTicket::pending(job_id, estimate))
    }
}
