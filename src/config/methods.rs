//! Builder-style setters for `ServiceConfig`.

use std::path::PathBuf;

use super::types::ServiceConfig;

impl ServiceConfig {
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn with_sync_threshold_secs(mut self, threshold: f64) -> Self {
        self.sync_threshold_secs = threshold;
        self
    }

    #[must_use]
    pub fn with_navigation_timeout_ms(mut self, ms: u64) -> Self {
        self.navigation_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn with_settle_ms(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    #[must_use]
    pub fn with_script_timeout_ms(mut self, ms: u64) -> Self {
        self.script_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn with_session_idle_ttl_secs(mut self, secs: u64) -> Self {
        self.session_idle_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn with_session_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.session_sweep_interval_secs = secs;
        self
    }

    #[must_use]
    pub fn with_batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_concurrency = limit.max(1);
        self
    }

    #[must_use]
    pub fn with_batch_per_url_timeout_secs(mut self, secs: u64) -> Self {
        self.batch_per_url_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max: usize) -> Self {
        self.max_pages = max.max(1);
        self
    }

    #[must_use]
    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max.max(1);
        self
    }

    #[must_use]
    pub fn with_provider_max_tokens(mut self, max: u32) -> Self {
        self.provider_max_tokens = max;
        self
    }

    #[must_use]
    pub fn with_public_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.public_url_prefix = prefix.into();
        self
    }
}
