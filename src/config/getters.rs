//! Read accessors for `ServiceConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::ServiceConfig;

impl ServiceConfig {
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn sync_threshold_secs(&self) -> f64 {
        self.sync_threshold_secs
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    #[must_use]
    pub fn script_timeout_ms(&self) -> u64 {
        self.script_timeout_ms
    }

    #[must_use]
    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }

    #[must_use]
    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    #[must_use]
    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }

    #[must_use]
    pub fn batch_per_url_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_per_url_timeout_secs)
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub fn max_tool_iterations(&self) -> usize {
        self.max_tool_iterations
    }

    #[must_use]
    pub fn provider_max_tokens(&self) -> u32 {
        self.provider_max_tokens
    }

    #[must_use]
    pub fn public_url_prefix(&self) -> &str {
        &self.public_url_prefix
    }

    /// Path of the SQLite job database beneath the storage root.
    #[must_use]
    pub fn jobs_db_path(&self) -> PathBuf {
        self.storage_root.join(".lamprey").join("jobs.sqlite")
    }
}
