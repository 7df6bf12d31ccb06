//! Artifact storage.
//!
//! The service talks to storage through the narrow [`BlobStore`] trait so a
//! cloud object store can replace the filesystem implementation without the
//! crawler noticing; filenames and returned URLs must match bit-for-bit,
//! differing only in prefix.

mod artifacts;
mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

pub use artifacts::{ArtifactWriter, artifact_filename};
pub use local::LocalStore;

/// A stored artifact and how to retrieve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Bare filename, deterministic for a given `(url, title, extension)`.
    pub filename: String,
    /// Full storage path including the user bucket.
    pub storage_path: String,
    /// Retrieval URL (signed URL or local path, prefix differs per backend).
    pub url: String,
}

/// Narrow blob interface over the storage backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, path: &str, bytes: &[u8]) -> ServiceResult<()>;

    async fn get(&self, path: &str) -> ServiceResult<Vec<u8>>;

    /// Returns true when the blob existed.
    async fn delete(&self, path: &str) -> ServiceResult<bool>;

    async fn list(&self, prefix: &str) -> ServiceResult<Vec<String>>;

    /// Retrieval URL for a stored path. Local stores return a path-style
    /// URL; object stores return a signed URL.
    fn signed_url(&self, path: &str) -> String;
}
