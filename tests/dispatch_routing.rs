//! Dispatcher routing: cheap requests run inline with a full result and
//! no job; expensive requests queue and return a handle.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::StubExecutor;
use lamprey::crawler::{CrawlOptions, CrawlRequest};
use lamprey::dispatch::{Dispatch, Dispatcher};
use lamprey::jobs::{JobKind, JobRegistry, JobStatus};
use lamprey::markdown::MarkdownMode;

async fn dispatcher() -> (Dispatcher, Arc<StubExecutor>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let jobs = Arc::new(JobRegistry::open(&dir.path().join("jobs.sqlite")).await.unwrap());
    let executor = StubExecutor::new();
    let dispatcher = Dispatcher::new(executor.clone(), jobs, 5.0);
    (dispatcher, executor, dir)
}

fn cheap_options() -> CrawlOptions {
    CrawlOptions {
        markdown_extraction: MarkdownMode::Basic,
        ..CrawlOptions::default()
    }
}

fn expensive_options() -> CrawlOptions {
    CrawlOptions {
        javascript: true,
        screenshot: true,
        markdown_extraction: MarkdownMode::Enhanced,
        ..CrawlOptions::default()
    }
}

#[tokio::test]
async fn under_threshold_requests_run_inline_with_no_job() {
    let (dispatcher, executor, _dir) = dispatcher().await;
    let request = CrawlRequest::new("https://example.com").with_options(cheap_options());

    match dispatcher.dispatch(request).await.unwrap() {
        Dispatch::Inline(outcome) => {
            let capture = outcome.capture().expect("inline result populated");
            assert_eq!(capture.url, "https://example.com");
            assert!(!capture.title.is_empty());
        }
        other => panic!("expected inline dispatch, got {other:?}"),
    }

    assert_eq!(executor.pages_run.load(Ordering::SeqCst), 1);
    assert!(dispatcher.jobs().list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn over_threshold_requests_queue_and_return_a_handle() {
    let (dispatcher, executor, _dir) = dispatcher().await;
    let request = CrawlRequest::new("https://example.com").with_options(expensive_options());

    let ticket = match dispatcher.dispatch(request).await.unwrap() {
        Dispatch::Queued(ticket) => ticket,
        other => panic!("expected queued dispatch, got {other:?}"),
    };

    assert!(ticket.is_async);
    assert_eq!(ticket.status, "pending");
    assert_eq!(ticket.check_url, format!("/jobs/{}", ticket.job_id));
    // Nothing ran inline.
    assert_eq!(executor.pages_run.load(Ordering::SeqCst), 0);

    let job = dispatcher
        .jobs()
        .get(&ticket.job_id)
        .await
        .unwrap()
        .expect("job exists");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.kind, JobKind::Crawl);
    // The metadata is the original request, verbatim.
    let stored: CrawlRequest = serde_json::from_value(job.metadata).unwrap();
    assert_eq!(stored.url, "https://example.com");
    assert!(stored.options.javascript);
}

#[tokio::test]
async fn force_sync_overrides_the_estimator() {
    let (dispatcher, _executor, _dir) = dispatcher().await;
    let mut options = expensive_options();
    options.force_sync = true;
    let request = CrawlRequest::new("https://example.com").with_options(options);

    assert!(matches!(
        dispatcher.dispatch(request).await.unwrap(),
        Dispatch::Inline(_)
    ));
}

#[tokio::test]
async fn shallow_spans_run_inline_as_batches()
{
    let (dispatcher, _executor, _dir) = dispatcher().await;
    let mut options = cheap_options();
    options.depth = 1; // estimate 1.5 * 2 = 3.0, still under threshold

    let request = CrawlRequest::new("https://example.com").with_options(options);
    match dispatcher.dispatch(request).await.unwrap() {
        Dispatch::InlineSpan(batch) => {
            assert!(batch.total >= 2);
            assert_eq!(batch.failed, 0);
        }
        other => panic!("expected inline span, got {other:?}"),
    }
}

#[tokio::test]
async fn batches_always_queue() {
    let (dispatcher, _executor, _dir) = dispatcher().await;
    let urls = vec![
        "https://a.example.com".to_string(),
        "https://b.example.com".to_string(),
    ];

    let ticket = dispatcher
        .dispatch_batch(urls, cheap_options(), Some("alice".into()))
        .await
        .unwrap();
    assert!(ticket.is_async);

    let job = dispatcher
        .jobs()
        .get(&ticket.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.kind, JobKind::BatchCrawl);
    assert_eq!(job.metadata["urls"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_work() {
    let (dispatcher, executor, _dir) = dispatcher().await;

    let bad = CrawlRequest::new("javascript:alert(1)");
    assert!(dispatcher.dispatch(bad).await.is_err());

    assert!(dispatcher
        .dispatch_batch(Vec::new(), cheap_options(), None)
        .await
        .is_err());
    assert!(dispatcher
        .dispatch_batch(vec!["not a url".into()], cheap_options(), None)
        .await
        .is_err());

    assert_eq!(executor.pages_run.load(Ordering::SeqCst), 0);
}
