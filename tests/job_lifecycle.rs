//! Job registry transitions, CAS claiming and worker execution.

mod common;

use serde_json::json;
use std::sync::Arc;

use common::StubExecutor;
use lamprey::crawler::{CrawlOptions, CrawlRequest};
use lamprey::jobs::{BatchJobRequest, JobKind, JobRegistry, JobStatus, JobWorker};

async fn registry() -> (Arc<JobRegistry>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let registry = JobRegistry::open(&dir.path().join("jobs.sqlite")).await.unwrap();
    (Arc::new(registry), dir)
}

fn crawl_metadata(url: &str) -> serde_json::Value {
    serde_json::to_value(CrawlRequest::new(url)).unwrap()
}

#[tokio::test]
async fn jobs_start_pending_and_claims_move_them_to_running() {
    let (registry, _dir) = registry().await;
    let id = registry
        .create(JobKind::Crawl, crawl_metadata("https://example.com"))
        .await
        .unwrap();

    let job = registry.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0);
    assert_eq!(job.check_url(), format!("/jobs/{id}"));

    let claimed = registry.claim_next_pending().await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status, JobStatus::Running);

    // The queue is now empty.
    assert!(registry.claim_next_pending().await.unwrap().is_none());
}

#[tokio::test]
async fn claims_are_oldest_first() {
    let (registry, _dir) = registry().await;
    let first = registry
        .create(JobKind::Crawl, crawl_metadata("https://a.com"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let _second = registry
        .create(JobKind::Crawl, crawl_metadata("https://b.com"))
        .await
        .unwrap();

    let claimed = registry.claim_next_pending().await.unwrap().unwrap();
    assert_eq!(claimed.id, first);
}

#[tokio::test]
async fn two_claimants_cannot_win_the_same_job() {
    let (registry, _dir) = registry().await;
    registry
        .create(JobKind::Crawl, crawl_metadata("https://example.com"))
        .await
        .unwrap();

    let a = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.claim_next_pending().await.unwrap() })
    };
    let b = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.claim_next_pending().await.unwrap() })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert!(a.is_some() ^ b.is_some(), "exactly one claimant must win");
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let (registry, _dir) = registry().await;
    let id = registry
        .create(JobKind::Crawl, crawl_metadata("https://example.com"))
        .await
        .unwrap();

    // pending -> completed is not a legal move.
    assert!(registry.complete(&id, json!({})).await.is_err());
    assert!(registry.fail(&id, "nope").await.is_err());
    assert!(registry.update_progress(&id, 50).await.is_err());

    registry.claim_next_pending().await.unwrap().unwrap();
    registry.update_progress(&id, 50).await.unwrap();
    registry.complete(&id, json!({"ok": true})).await.unwrap();

    let job = registry.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.result.unwrap()["ok"], true);

    // Terminal jobs are immutable.
    assert!(registry.fail(&id, "late failure").await.is_err());
    assert!(registry.complete(&id, json!({})).await.is_err());

    // Unknown ids surface as not-found.
    assert!(registry.get("missing").await.unwrap().is_none());
    assert!(registry.fail("missing", "x").await.is_err());
}

#[tokio::test]
async fn worker_completes_successful_crawl_jobs() {
    let (registry, _dir) = registry().await;
    let executor = StubExecutor::new();
    let worker = JobWorker::new(Arc::clone(&registry), executor);

    let id = registry
        .create(JobKind::Crawl, crawl_metadata("https://example.com"))
        .await
        .unwrap();

    assert!(worker.tick().await.unwrap());
    let job = registry.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result["url"], "https://example.com");
    assert_eq!(result["title"], "Title: https://example.com");

    // Nothing left to do.
    assert!(!worker.tick().await.unwrap());
}

#[tokio::test]
async fn worker_fails_jobs_whose_crawl_fails() {
    let (registry, _dir) = registry().await;
    let worker = JobWorker::new(Arc::clone(&registry), StubExecutor::new());

    let id = registry
        .create(JobKind::Crawl, crawl_metadata("https://fail.example.com"))
        .await
        .unwrap();

    worker.tick().await.unwrap();
    let job = registry.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("stub failure"));
}

#[tokio::test]
async fn worker_fails_jobs_with_malformed_metadata() {
    let (registry, _dir) = registry().await;
    let worker = JobWorker::new(Arc::clone(&registry), StubExecutor::new());

    let id = registry
        .create(JobKind::Crawl, json!({"not_a_request": true}))
        .await
        .unwrap();

    worker.tick().await.unwrap();
    let job = registry.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("invalid crawl job metadata"));
}

#[tokio::test]
async fn deep_crawl_jobs_report_span_statistics() {
    let (registry, _dir) = registry().await;
    let worker = JobWorker::new(Arc::clone(&registry), StubExecutor::new());

    let mut request = CrawlRequest::new("https://example.com");
    request.options.depth = 2;
    let id = registry
        .create(JobKind::Crawl, serde_json::to_value(&request).unwrap())
        .await
        .unwrap();

    worker.tick().await.unwrap();
    let job = registry.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert!(result["total"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn batch_jobs_collect_per_url_failures() {
    let (registry, _dir) = registry().await;
    let worker = JobWorker::new(Arc::clone(&registry), StubExecutor::new());

    let batch = BatchJobRequest {
        urls: vec![
            "https://ok-one.example.com".into(),
            "https://fail.example.com".into(),
            "https://ok-two.example.com".into(),
        ],
        options: CrawlOptions::default(),
        user_id: None,
    };
    let id = registry
        .create(JobKind::BatchCrawl, serde_json::to_value(&batch).unwrap())
        .await
        .unwrap();

    worker.tick().await.unwrap();
    let job = registry.get(&id).await.unwrap().unwrap();
    // Per-URL failures do not fail the batch job.
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result["total"], 3);
    assert_eq!(result["completed"], 2);
    assert_eq!(result["failed"], 1);
    assert!(
        result["collated_markdown"]
            .as_str()
            .unwrap()
            .contains("stub markdown body")
    );
}

#[tokio::test]
async fn observed_statuses_form_a_legal_prefix() {
    let (registry, _dir) = registry().await;
    let worker = JobWorker::new(Arc::clone(&registry), StubExecutor::new());

    let id = registry
        .create(JobKind::Crawl, crawl_metadata("https://example.com"))
        .await
        .unwrap();

    let mut observed = vec![registry.get(&id).await.unwrap().unwrap().status];
    worker.tick().await.unwrap();
    observed.push(registry.get(&id).await.unwrap().unwrap().status);

    for pair in observed.windows(2) {
        assert!(
            pair[0] == pair[1] || legal_path(pair[0], pair[1]),
            "illegal observed transition {pair:?}"
        );
    }
    assert_eq!(*observed.last().unwrap(), JobStatus::Completed);
}

/// Whether `to` is reachable from `from` via legal transitions.
fn legal_path(from: JobStatus, to: JobStatus) -> bool {
    match (from, to) {
        (JobStatus::Pending, JobStatus::Running)
        | (JobStatus::Pending, JobStatus::Completed)
        | (JobStatus::Pending, JobStatus::Failed)
        | (JobStatus::Running, JobStatus::Completed)
        | (JobStatus::Running, JobStatus::Failed) => true,
        _ => false,
    }
}
