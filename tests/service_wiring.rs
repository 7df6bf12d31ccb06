//! Full-stack wiring: building the service registers the tool set and the
//! toolbag budget profile over real (local) storage and job registry.

use lamprey::{Service, ServiceConfig};

#[tokio::test]
async fn build_wires_tools_jobs_and_budgets() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig::default().with_storage_root(dir.path());
    let service = Service::build(config).await.unwrap();

    let names = service.registry.names();
    for expected in [
        "calculate",
        "capture_screenshot",
        "check_job_status",
        "close_session",
        "crawl_webpage",
        "crawl_with_session",
        "extract_markdown",
        "inject_javascript",
        "list_sessions",
        "suggest_url",
        "summarize_content",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing tool {expected}");
    }

    // Public schemas carry the wire shape.
    let schemas = service.registry.schemas();
    let crawl = schemas
        .iter()
        .find(|s| s["name"] == "crawl_webpage")
        .expect("crawl_webpage schema");
    assert_eq!(crawl["input_schema"]["type"], "object");
    assert_eq!(crawl["input_schema"]["required"][0], "url");

    // Stock budget profile.
    assert_eq!(service.toolbag.limit("crawl_with_session"), Some(1));
    assert_eq!(service.toolbag.limit("summarize_content"), Some(3));
    assert_eq!(service.toolbag.limit("capture_screenshot"), Some(10));
    assert_eq!(service.toolbag.limit("calculate"), None);

    // The job registry is live in the configured storage root.
    assert!(service.jobs.list(None).await.unwrap().is_empty());
    assert!(dir.path().join(".lamprey").join("jobs.sqlite").exists());

    service.shutdown().await;
}
