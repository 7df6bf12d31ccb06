//! Shared configuration constants for lamprey
//!
//! Default values used throughout the codebase to ensure consistency and
//! avoid magic numbers.

use std::time::Duration;

/// Estimated crawl duration (seconds) below which a request runs inline.
///
/// Requests whose cost estimate is at or above this threshold are turned
/// into background jobs instead. Single tunable for the dispatcher.
pub const SYNC_THRESHOLD_SECS: f64 = 5.0;

/// Baseline page-load cost in seconds for the dispatcher estimate.
pub const ESTIMATE_BASE_SECS: f64 = 1.5;

/// Added estimate when JavaScript execution is enabled.
pub const ESTIMATE_JS_SECS: f64 = 2.0;

/// Added estimate when a screenshot is requested.
pub const ESTIMATE_SCREENSHOT_SECS: f64 = 1.0;

/// Added estimate for full-page content extraction (enhanced markdown).
pub const ESTIMATE_FULL_CONTENT_SECS: f64 = 0.5;

/// Hard timeout for page navigation.
///
/// On expiry the driver substitutes a synthetic error document so that
/// downstream capture still operates on a well-defined page.
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Default settle delay after the load event before capture begins.
///
/// JS-heavy hosts get a longer delay from the per-host hint table.
pub const DEFAULT_SETTLE_MS: u64 = 2_000;

/// Default timeout for injected user scripts.
pub const DEFAULT_SCRIPT_TIMEOUT_MS: u64 = 30_000;

/// Sessions idle longer than this are closed by the sweeper.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(300);

/// How often the session sweeper scans for idle sessions.
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Bounded concurrency for batch crawls and multi-page expansion.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;

/// Per-URL wall-clock cap inside a batch.
pub const BATCH_PER_URL_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum pages visited by a multi-page crawl when the caller gives none.
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Maximum model/tool iterations per toolbag execution.
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 3;

/// Default max tokens requested from the LLM provider.
pub const DEFAULT_PROVIDER_MAX_TOKENS: u32 = 1_024;

/// Polling interval for the async job worker when the queue is empty.
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Pruning filter cutoff when the caller does not supply one.
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 0.48;

/// Chrome user agent string for stealth mode.
///
/// Chrome releases new stable versions ~every 4 weeks; refresh this string
/// periodically to stay within a plausible version window.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Bucket name used for requests without a user identity.
///
/// The anonymous bucket is a real user bucket with a stable hash, not a
/// fallback path.
pub const ANONYMOUS_USER: &str = "anonymous";
