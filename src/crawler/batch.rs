//! Batch execution: N URLs through the single-page pipeline with bounded
//! concurrency and per-URL timeouts. Per-URL failures are collected, not
//! fatal, unless the caller opted into stop-on-error.

use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

use super::options::{CrawlOptions, CrawlRequest};
use super::result::{BatchItem, BatchOutcome, CrawlOutcome};
use super::CrawlOrchestrator;
use crate::error::ErrorKind;

/// Execution policy for one batch.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    pub concurrency: usize,
    pub per_url_timeout: Duration,
    pub stop_on_error: bool,
}

pub(super) async fn run_batch(
    orchestrator: &CrawlOrchestrator,
    urls: &[String],
    options: &CrawlOptions,
    user_id: Option<&str>,
    policy: &BatchPolicy,
) -> BatchOutcome {
    let started = Instant::now();
    let aborted = Arc::new(AtomicBool::new(false));

    // Batch items run the single-page pipeline; concurrent URLs cannot
    // share one browser session.
    let mut page_options = options.clone();
    page_options.depth = 0;
    page_options.session_id = None;

    let items: Vec<BatchItem> = futures::stream::iter(urls.iter().cloned().map(|url| {
        let options = page_options.clone();
        let aborted = Arc::clone(&aborted);
        let user_id = user_id.map(str::to_string);
        let stop_on_error = policy.stop_on_error;
        let per_url_timeout = policy.per_url_timeout;
        async move {
            if stop_on_error && aborted.load(Ordering::Relaxed) {
                return BatchItem {
                    url,
                    success: false,
                    title: None,
                    markdown: None,
                    error: Some("skipped: batch aborted after earlier failure".into()),
                    word_count: 0,
                    char_count: 0,
                    elapsed_ms: 0,
                };
            }

            let request = CrawlRequest {
                url: url.clone(),
                options,
                session_id: None,
                user_id,
            };
            let outcome =
                match tokio::time::timeout(per_url_timeout, orchestrator.crawl(&request)).await {
                    Ok(outcome) => outcome,
                    Err(_) => CrawlOutcome::failure(
                        ErrorKind::NavigationTimeout,
                        format!(
                            "batch item exceeded {}s wall clock",
                            per_url_timeout.as_secs()
                        ),
                    ),
                };

            let item = BatchItem::from_outcome(&url, &outcome);
            if !item.success {
                warn!(url = %item.url, error = ?item.error, "batch item failed");
                if stop_on_error {
                    aborted.store(true, Ordering::Relaxed);
                }
            }
            item
        }
    }))
    .buffered(policy.concurrency.max(1))
    .collect()
    .await;

    BatchOutcome::aggregate(items, started.elapsed().as_secs_f64())
}
