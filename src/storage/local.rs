//! Filesystem implementation of the blob interface.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::BlobStore;
use crate::error::{ServiceError, ServiceResult};

/// Blob store rooted at a local directory.
pub struct LocalStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    /// Resolve a storage path beneath the root, rejecting traversal.
    fn resolve(&self, path: &str) -> ServiceResult<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ServiceError::InvalidInput(format!(
                "storage path escapes the root: {path}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn save(&self, path: &str, bytes: &[u8]) -> ServiceResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::StorageError(format!("create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| ServiceError::StorageError(format!("write {}: {e}", full.display())))?;
        debug!(path = %full.display(), bytes = bytes.len(), "blob saved");
        Ok(())
    }

    async fn get(&self, path: &str) -> ServiceResult<Vec<u8>> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| ServiceError::StorageError(format!("read {}: {e}", full.display())))
    }

    async fn delete(&self, path: &str) -> ServiceResult<bool> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServiceError::StorageError(format!(
                "delete {}: {e}",
                full.display()
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> ServiceResult<Vec<String>> {
        let dir = self.resolve(prefix)?;
        let mut entries = Vec::new();
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => {
                return Err(ServiceError::StorageError(format!(
                    "list {}: {e}",
                    dir.display()
                )));
            }
        };
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ServiceError::StorageError(format!("list {}: {e}", dir.display())))?
        {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                let name = entry.file_name().to_string_lossy().to_string();
                let joined = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{name}", prefix.trim_end_matches('/'))
                };
                entries.push(joined);
            }
        }
        entries.sort();
        Ok(entries)
    }

    fn signed_url(&self, path: &str) -> String {
        format!("{}/{path}", self.url_prefix.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_get_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path(), "/storage");

        store.save("users/abc/report.md", b"# hi").await.unwrap();
        let bytes = store.get("users/abc/report.md").await.unwrap();
        assert_eq!(bytes, b"# hi");

        assert!(store.delete("users/abc/report.md").await.unwrap());
        assert!(!store.delete("users/abc/report.md").await.unwrap());
        assert!(store.get("users/abc/report.md").await.is_err());
    }

    #[tokio::test]
    async fn list_returns_files_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path(), "/storage");
        store.save("users/abc/a.md", b"a").await.unwrap();
        store.save("users/abc/b.png", b"b").await.unwrap();

        let listed = store.list("users/abc").await.unwrap();
        assert_eq!(listed, vec!["users/abc/a.md", "users/abc/b.png"]);
        assert!(store.list("users/nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path(), "/storage");
        assert!(store.save("../evil.md", b"x").await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
    }

    #[test]
    fn signed_url_is_prefix_plus_path() {
        let store = LocalStore::new("/data", "/storage/");
        assert_eq!(store.signed_url("users/abc/a.md"), "/storage/users/abc/a.md");
    }
}
