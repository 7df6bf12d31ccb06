//! Core configuration types for the crawl service.
//!
//! `ServiceConfig` carries the tunables shared by the dispatcher, the
//! session pool, the job worker and the toolbag. Per-request knobs live in
//! `crawler::CrawlOptions`; this struct holds the process-wide defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::constants::{
    DEFAULT_BATCH_CONCURRENCY, DEFAULT_MAX_PAGES, DEFAULT_MAX_TOOL_ITERATIONS,
    DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_PROVIDER_MAX_TOKENS, DEFAULT_SCRIPT_TIMEOUT_MS,
    DEFAULT_SETTLE_MS, SESSION_IDLE_TTL, SESSION_SWEEP_INTERVAL, SYNC_THRESHOLD_SECS,
};

/// Process-wide configuration for the crawl service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root directory for stored artifacts and the job database.
    ///
    /// **INVARIANT:** treated as an absolute base; user buckets and the
    /// internal `.lamprey` directory are always joined beneath it.
    pub(crate) storage_root: PathBuf,

    /// Run browsers headless (on for service operation, off for debugging).
    pub(crate) headless: bool,

    /// Estimated seconds below which a crawl runs inline instead of queueing.
    pub(crate) sync_threshold_secs: f64,

    /// Hard cap in milliseconds for page navigation.
    pub(crate) navigation_timeout_ms: u64,

    /// Post-load settle delay in milliseconds before capture.
    pub(crate) settle_ms: u64,

    /// Default timeout in milliseconds for injected user scripts.
    pub(crate) script_timeout_ms: u64,

    /// Seconds a session may sit idle before the sweeper closes it.
    pub(crate) session_idle_ttl_secs: u64,

    /// Seconds between sweeper passes over the session pool.
    pub(crate) session_sweep_interval_secs: u64,

    /// Concurrent page limit for batch crawls and multi-page expansion.
    pub(crate) batch_concurrency: usize,

    /// Per-URL wall-clock cap in seconds inside a batch.
    pub(crate) batch_per_url_timeout_secs: u64,

    /// Page cap for multi-page crawls when the request gives none.
    pub(crate) max_pages: usize,

    /// Model/tool loop iteration cap for the toolbag.
    pub(crate) max_tool_iterations: usize,

    /// Max tokens requested per provider call.
    pub(crate) provider_max_tokens: u32,

    /// URL prefix reported for locally stored artifacts.
    pub(crate) public_url_prefix: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("storage"),
            headless: true,
            sync_threshold_secs: SYNC_THRESHOLD_SECS,
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            script_timeout_ms: DEFAULT_SCRIPT_TIMEOUT_MS,
            session_idle_ttl_secs: SESSION_IDLE_TTL.as_secs(),
            session_sweep_interval_secs: SESSION_SWEEP_INTERVAL.as_secs(),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            batch_per_url_timeout_secs: 120,
            max_pages: DEFAULT_MAX_PAGES,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            provider_max_tokens: DEFAULT_PROVIDER_MAX_TOKENS,
            public_url_prefix: "/storage".to_string(),
        }
    }
}
