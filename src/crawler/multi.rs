//! Multi-page expansion: bounded breadth-first crawl from a root URL.
//!
//! Follows same-host links only, optionally restricted by the caller's
//! follow pattern, up to the requested depth and page cap. Every visited
//! page runs the full single-page pipeline.

use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, warn};

use super::CrawlOrchestrator;
use super::options::CrawlRequest;
use super::result::{BatchItem, BatchOutcome};
use crate::utils::{absolutize, is_valid_url, same_host};

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("anchor selector must parse"));

/// Discover absolute, crawlable link targets in page HTML.
#[must_use]
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let absolute = absolutize(base_url, href.trim());
        // Drop intra-page fragments of the same document.
        let absolute = absolute.split('#').next().unwrap_or(&absolute).to_string();
        if is_valid_url(&absolute) && seen.insert(absolute.clone()) {
            links.push(absolute);
        }
    }
    links
}

pub(super) async fn crawl_span(
    orchestrator: &CrawlOrchestrator,
    request: &CrawlRequest,
) -> BatchOutcome {
    let started = Instant::now();
    let max_pages = request
        .options
        .max_pages
        .unwrap_or_else(|| orchestrator.config().max_pages())
        .max(1);
    let concurrency = orchestrator.config().batch_concurrency();

    let follow = match request.options.follow_pattern.as_deref() {
        Some(pattern) => match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                let item = BatchItem {
                    url: request.url.clone(),
                    success: false,
                    title: None,
                    markdown: None,
                    error: Some(format!("invalid follow_pattern: {e}")),
                    word_count: 0,
                    char_count: 0,
                    elapsed_ms: 0,
                };
                return BatchOutcome::aggregate(vec![item], started.elapsed().as_secs_f64());
            }
        },
        None => None,
    };

    // Pages inside the span run as single-page crawls; link following is
    // handled here, not recursively.
    let mut page_options = request.options.clone();
    page_options.depth = 0;
    page_options.session_id = None;
    // A page that fails to load should not abort the rest of the span.
    page_options.continue_on_failure = true;

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(request.url.clone());
    let mut frontier = vec![request.url.clone()];
    let mut results: Vec<BatchItem> = Vec::new();

    for depth in 0..=request.options.depth {
        if frontier.is_empty() || results.len() >= max_pages {
            break;
        }
        frontier.truncate(max_pages - results.len());
        debug!(depth, pages = frontier.len(), "crawling span level");

        let outcomes: Vec<(String, super::CrawlOutcome)> =
            futures::stream::iter(frontier.drain(..).map(|url| {
                let options = page_options.clone();
                let user_id = request.user_id.clone();
                async move {
                    let page_request = CrawlRequest {
                        url: url.clone(),
                        options,
                        session_id: None,
                        user_id,
                    };
                    let outcome = orchestrator.crawl(&page_request).await;
                    (url, outcome)
                }
            }))
            .buffered(concurrency)
            .collect()
            .await;

        let mut next_frontier = Vec::new();
        for (url, outcome) in outcomes {
            if depth < request.options.depth {
                if let Some(capture) = outcome.capture() {
                    for link in extract_links(&capture.html, &url) {
                        if !same_host(&request.url, &link) {
                            continue;
                        }
                        if let Some(pattern) = &follow {
                            if !pattern.is_match(&link) {
                                continue;
                            }
                        }
                        if visited.insert(link.clone()) {
                            next_frontier.push(link);
                        }
                    }
                }
            }
            if !outcome.is_success() {
                warn!(url = %url, "span page failed");
            }
            results.push(BatchItem::from_outcome(&url, &outcome));
        }
        frontier = next_frontier;
    }

    BatchOutcome::aggregate(results, started.elapsed().as_secs_f64())
}
