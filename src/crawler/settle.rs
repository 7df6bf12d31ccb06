//! Per-host settle hints.
//!
//! Some hosts are known to hydrate well after the load event; capturing
//! them too early yields skeleton markup. The hint table recommends a
//! longer settle delay for those hosts.

use std::time::Duration;
use url::Url;

/// Hosts that hydrate late, with their recommended settle delay in ms.
const LATE_HYDRATORS: &[(&str, u64)] = &[
    ("twitter.com", 5_000),
    ("x.com", 5_000),
    ("instagram.com", 5_000),
    ("linkedin.com", 4_000),
    ("reddit.com", 4_000),
    ("facebook.com", 4_000),
    ("youtube.com", 3_500),
    ("medium.com", 3_000),
    ("notion.site", 4_000),
];

/// Settle delay for a URL: the caller's explicit wait wins, then the host
/// hint table, then the service default.
#[must_use]
pub fn settle_delay(url: &str, explicit_ms: Option<u64>, default: Duration) -> Duration {
    if let Some(ms) = explicit_ms {
        return Duration::from_millis(ms);
    }

    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase));
    if let Some(host) = host {
        for (candidate, ms) in LATE_HYDRATORS {
            if host == *candidate || host.ends_with(&format!(".{candidate}")) {
                return Duration::from_millis(*ms);
            }
        }
    }

    default
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_millis(2_000);

    #[test]
    fn explicit_wait_wins() {
        assert_eq!(
            settle_delay("https://twitter.com/x", Some(100), DEFAULT),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn known_hosts_get_longer_settles() {
        assert_eq!(
            settle_delay("https://www.reddit.com/r/rust", None, DEFAULT),
            Duration::from_millis(4_000)
        );
        assert_eq!(
            settle_delay("https://mobile.twitter.com/a", None, DEFAULT),
            Duration::from_millis(5_000)
        );
    }

    #[test]
    fn unknown_hosts_use_the_default() {
        assert_eq!(settle_delay("https://example.com", None, DEFAULT), DEFAULT);
    }
}
