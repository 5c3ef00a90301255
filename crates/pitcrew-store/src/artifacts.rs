//! Filesystem-backed artifact store
//!
//! Stores build artifacts and user assets under a configured root, addressed
//! by the object paths from [`crate::paths`]. The worker writes artifacts
//! here; cache checks are object-existence checks.

use anyhow::{Context, Result, anyhow};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Artifact storage rooted at a local directory
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for an object. Rejects absolute or parent-escaping
    /// object names.
    pub fn full_path(&self, object: &str) -> Result<PathBuf> {
        let relative = Path::new(object);
        if object.is_empty() {
            return Err(anyhow!("Object path must not be empty"));
        }
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(anyhow!("Object path '{}' escapes the store root", object));
        }
        Ok(self.root.join(relative))
    }

    /// Whether an object exists in the store
    pub async fn exists(&self, object: &str) -> Result<bool> {
        let path = self.full_path(object)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Write an object, creating parent directories as needed
    pub async fn write(&self, object: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.full_path(object)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Stored object {} ({} bytes)", object, bytes.len());
        Ok(path)
    }

    /// Read an object's bytes
    pub async fn read(&self, object: &str) -> Result<Vec<u8>> {
        let path = self.full_path(object)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::build_object_path;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_exists() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let object = build_object_path("main", "abcdef0123");

        assert!(!store.exists(&object).await.unwrap());
        store.write(&object, b"zip bytes").await.unwrap();
        assert!(store.exists(&object).await.unwrap());
        assert_eq!(store.read(&object).await.unwrap(), b"zip bytes");
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.full_path("../outside.zip").is_err());
        assert!(store.full_path("/etc/passwd").is_err());
        assert!(store.full_path("").is_err());
    }

    #[tokio::test]
    async fn test_missing_object_does_not_exist() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(!store.exists("game-builds/universal/main/x/x.zip").await.unwrap());
    }
}
