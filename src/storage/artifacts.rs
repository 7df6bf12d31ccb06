//! Deterministic artifact naming and the writer used by the crawl pipeline.

use std::sync::Arc;
use tracing::warn;

use super::{ArtifactRef, BlobStore};
use crate::error::ServiceResult;
use crate::utils::{artifact_hash, host_slug, user_bucket};

/// Deterministic artifact filename for a crawled page.
///
/// `<host_slug>_<hash8>.<ext>` where the hash covers the URL and, when
/// present, the page title. Identical inputs always produce identical
/// names, so re-crawls overwrite in place.
#[must_use]
pub fn artifact_filename(url: &str, title: Option<&str>, extension: &str) -> String {
    let slug = host_slug(url);
    let hash = artifact_hash(url, title);
    let name = format!("{slug}_{hash}.{extension}");
    // Hosts are already underscore-normalized; this guards titles of
    // unparseable URLs and exotic extensions.
    sanitize_filename::sanitize(name)
}

/// Writes crawl artifacts into per-user buckets.
pub struct ArtifactWriter {
    store: Arc<dyn BlobStore>,
}

impl ArtifactWriter {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Storage path for one artifact in the caller's bucket.
    #[must_use]
    pub fn bucket_path(user_id: Option<&str>, filename: &str) -> String {
        format!("users/{}/{filename}", user_bucket(user_id))
    }

    /// Persist one artifact and return its reference.
    pub async fn write(
        &self,
        user_id: Option<&str>,
        url: &str,
        title: Option<&str>,
        extension: &str,
        bytes: &[u8],
    ) -> ServiceResult<ArtifactRef> {
        let filename = artifact_filename(url, title, extension);
        let storage_path = Self::bucket_path(user_id, &filename);
        self.store.save(&storage_path, bytes).await?;
        let url = self.store.signed_url(&storage_path);
        Ok(ArtifactRef {
            filename,
            storage_path,
            url,
        })
    }

    /// Persist one artifact, logging and swallowing storage failures.
    ///
    /// Used where a single artifact write must not fail the others.
    pub async fn write_lossy(
        &self,
        user_id: Option<&str>,
        url: &str,
        title: Option<&str>,
        extension: &str,
        bytes: &[u8],
    ) -> Option<ArtifactRef> {
        match self.write(user_id, url, title, extension, bytes).await {
            Ok(reference) => Some(reference),
            Err(e) => {
                warn!(url, extension, error = %e, "artifact write failed");
                None
            }
        }
    }
}
