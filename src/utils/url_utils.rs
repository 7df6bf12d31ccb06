//! URL helpers shared by the crawler, storage and tool layers.

use url::Url;

/// Check that a URL is crawlable: parseable, http(s), and not a pseudo-scheme.
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    // Skip data URLs, javascript URLs, and other non-http schemes
    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Filesystem-safe host slug: lowercased host, `www.` stripped, dots
/// replaced with underscores. Unparseable URLs collapse to a fixed slug so
/// the caller still gets a deterministic name.
#[must_use]
pub fn host_slug(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase));

    match host {
        Some(h) => {
            let trimmed = h.strip_prefix("www.").unwrap_or(&h);
            trimmed.replace('.', "_")
        }
        None => "unknown_site".to_string(),
    }
}

/// Join a possibly-relative link against a base URL, returning an absolute
/// URL string. Already-absolute links pass through untouched.
#[must_use]
pub fn absolutize(base_url: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") || link.starts_with("mailto:") {
        return link.to_string();
    }
    match Url::parse(base_url).and_then(|base| base.join(link)) {
        Ok(joined) => joined.to_string(),
        Err(_) => link.to_string(),
    }
}

/// Whether two URLs share a host (subdomains count as different hosts).
#[must_use]
pub fn same_host(a: &str, b: &str) -> bool {
    let host = |u: &str| {
        Url::parse(u)
            .ok()
            .and_then(|p| p.host_str().map(str::to_lowercase))
    };
    match (host(a), host(b)) {
        (Some(ha), Some(hb)) => ha == hb,
        _ => false,
    }
}
