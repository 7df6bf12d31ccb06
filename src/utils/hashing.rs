//! Deterministic hashing for artifact names and user buckets.

use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::xxh3_64;

use super::constants::ANONYMOUS_USER;

/// Short content hash for artifact filenames.
///
/// The same `(url, title)` pair always yields the same 8-hex-char token, so
/// repeated crawls of a page overwrite their own artifacts instead of
/// accumulating duplicates.
#[must_use]
pub fn artifact_hash(url: &str, title: Option<&str>) -> String {
    let mut material = String::with_capacity(url.len() + 32);
    material.push_str(url);
    if let Some(t) = title {
        let t = t.trim();
        if !t.is_empty() {
            material.push('\n');
            material.push_str(t);
        }
    }
    let digest = xxh3_64(material.as_bytes());
    format!("{digest:016x}")[..8].to_string()
}

/// Stable 12-hex-char bucket hash for a user identity.
///
/// Requests without an identity land in the anonymous bucket, which is a
/// real bucket with the same stable derivation.
#[must_use]
pub fn user_bucket(user_id: Option<&str>) -> String {
    let identity = match user_id {
        Some(id) if !id.trim().is_empty() => id.trim().to_lowercase(),
        _ => ANONYMOUS_USER.to_string(),
    };
    let digest = Sha256::digest(identity.as_bytes());
    hex::encode(digest)[..12].to_string()
}
