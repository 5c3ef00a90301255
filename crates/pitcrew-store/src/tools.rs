//! Artifact cache and upload tools for the build and asset delegates

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use pitcrew_core::tools::{ToolHandler, json_schema, optional_u64, require_str};

use crate::artifacts::ArtifactStore;
use crate::paths;
use crate::tickets::{DEFAULT_EXPIRES_MINUTES, TicketIssuer};

/// `check_build_cache`: is a build for branch/commit already stored?
pub struct CheckBuildCacheTool {
    store: Arc<ArtifactStore>,
}

impl CheckBuildCacheTool {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for CheckBuildCacheTool {
    fn name(&self) -> &str {
        "check_build_cache"
    }

    fn description(&self) -> &str {
        "Checks whether a build for a branch and commit already exists in the artifact cache"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "branch": {"type": "string", "description": "Git branch name"},
                "commit": {"type": "string", "description": "Git commit hash"}
            }),
            vec!["branch", "commit"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let branch = require_str(&input, "branch")?;
        let commit = require_str(&input, "commit")?;
        let object = paths::build_object_path(&branch, &commit);
        if self.store.exists(&object).await? {
            Ok(format!("Build for {}/{} found in cache.", branch, commit))
        } else {
            Ok(format!("Build for {}/{} not found in cache.", branch, commit))
        }
    }
}

/// `generate_download_url`: expiring link for a cached build artifact
pub struct GenerateDownloadUrlTool {
    store: Arc<ArtifactStore>,
    issuer: Arc<TicketIssuer>,
}

impl GenerateDownloadUrlTool {
    pub fn new(store: Arc<ArtifactStore>, issuer: Arc<TicketIssuer>) -> Self {
        Self { store, issuer }
    }
}

#[async_trait]
impl ToolHandler for GenerateDownloadUrlTool {
    fn name(&self) -> &str {
        "generate_download_url"
    }

    fn description(&self) -> &str {
        "Generates an expiring download link for a cached build artifact"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "branch": {"type": "string", "description": "Git branch name"},
                "commit": {"type": "string", "description": "Git commit hash"},
                "expires_minutes": {"type": "integer", "description": "Link validity in minutes"}
            }),
            vec!["branch", "commit"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let branch = require_str(&input, "branch")?;
        let commit = require_str(&input, "commit")?;
        let expires_minutes = optional_u64(&input, "expires_minutes")
            .map(|m| m as i64)
            .unwrap_or(DEFAULT_EXPIRES_MINUTES);

        let object = paths::build_object_path(&branch, &commit);
        if !self.store.exists(&object).await? {
            return Ok(format!(
                "Build artifact '{}' is not in the cache, so no download link can be issued.",
                object
            ));
        }
        let url = self.issuer.issue_download(&object, expires_minutes)?;
        Ok(format!(
            "Download link (valid {} min): {}",
            expires_minutes, url
        ))
    }
}

/// `generate_upload_url`: where the user should PUT their asset file.
///
/// With a placeholder store configured (terminal front end), no upload
/// happens; a placeholder asset is staged directly instead.
pub struct GenerateUploadUrlTool {
    issuer: Arc<TicketIssuer>,
    placeholder: Option<Arc<ArtifactStore>>,
}

impl GenerateUploadUrlTool {
    pub fn new(issuer: Arc<TicketIssuer>) -> Self {
        Self {
            issuer,
            placeholder: None,
        }
    }

    pub fn with_placeholder(issuer: Arc<TicketIssuer>, store: Arc<ArtifactStore>) -> Self {
        Self {
            issuer,
            placeholder: Some(store),
        }
    }
}

#[async_trait]
impl ToolHandler for GenerateUploadUrlTool {
    fn name(&self) -> &str {
        "generate_upload_url"
    }

    fn description(&self) -> &str {
        "Issues an expiring upload URL for the session's asset slot"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "session_id": {"type": "string", "description": "Conversation session id"}
            }),
            vec!["session_id"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let session_id = require_str(&input, "session_id")?;

        if let Some(store) = &self.placeholder {
            let object = paths::asset_object_path(&session_id, "my-asset.glb");
            store.write(&object, b"placeholder glb").await?;
            return Ok(format!("Staged a placeholder asset at '{}'.", object));
        }

        let upload = self
            .issuer
            .issue_upload(&session_id, DEFAULT_EXPIRES_MINUTES)?;
        Ok(format!("Upload your asset here: {}", upload.url))
    }
}

/// Register the cache and upload tools
pub fn register_all(
    registry: &mut pitcrew_core::tools::ToolRegistry,
    store: Arc<ArtifactStore>,
    issuer: Arc<TicketIssuer>,
    placeholder_uploads: bool,
) {
    registry.register(Arc::new(CheckBuildCacheTool::new(store.clone())));
    registry.register(Arc::new(GenerateDownloadUrlTool::new(
        store.clone(),
        issuer.clone(),
    )));
    let upload_tool = if placeholder_uploads {
        GenerateUploadUrlTool::with_placeholder(issuer, store)
    } else {
        GenerateUploadUrlTool::new(issuer)
    };
    registry.register(Arc::new(upload_tool));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn harness() -> (TempDir, Arc<ArtifactStore>, Arc<TicketIssuer>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path()));
        let issuer = Arc::new(TicketIssuer::new("http://localhost:8000"));
        (dir, store, issuer)
    }

    #[tokio::test]
    async fn test_cache_miss_then_hit() {
        let (_dir, store, _issuer) = harness();
        let tool = CheckBuildCacheTool::new(store.clone());
        let input = serde_json::json!({"branch": "main", "commit": "abcdef0123"});

        let result = tool.execute(input.clone()).await.unwrap();
        assert!(result.contains("not found"));

        store
            .write(&paths::build_object_path("main", "abcdef0123"), b"zip")
            .await
            .unwrap();
        let result = tool.execute(input).await.unwrap();
        assert!(result.contains("found in cache"));
    }

    #[tokio::test]
    async fn test_download_url_requires_cached_artifact() {
        let (_dir, store, issuer) = harness();
        let tool = GenerateDownloadUrlTool::new(store.clone(), issuer);
        let input = serde_json::json!({"branch": "main", "commit": "abc"});

        let result = tool.execute(input.clone()).await.unwrap();
        assert!(result.contains("not in the cache"));

        store
            .write(&paths::build_object_path("main", "abc"), b"zip")
            .await
            .unwrap();
        let result = tool.execute(input).await.unwrap();
        assert!(result.contains("/artifacts/game-builds/universal/main/abc/abc.zip"));
    }

    #[tokio::test]
    async fn test_download_url_rejects_bad_expiry() {
        let (_dir, store, issuer) = harness();
        store
            .write(&paths::build_object_path("main", "abc"), b"zip")
            .await
            .unwrap();
        let tool = GenerateDownloadUrlTool::new(store, issuer);
        let input = serde_json::json!({"branch": "main", "commit": "abc", "expires_minutes": 0});
        assert!(tool.execute(input).await.is_err());
    }

    #[tokio::test]
    async fn test_upload_url() {
        let (_dir, _store, issuer) = harness();
        let tool = GenerateUploadUrlTool::new(issuer);
        let result = tool
            .execute(serde_json::json!({"session_id": "session_001"}))
            .await
            .unwrap();
        assert!(result.contains("/api/upload?session_id=session_001"));
    }

    #[tokio::test]
    async fn test_upload_placeholder_mode() {
        let (_dir, store, issuer) = harness();
        let tool = GenerateUploadUrlTool::with_placeholder(issuer, store.clone());
        let result = tool
            .execute(serde_json::json!({"session_id": "session_001"}))
            .await
            .unwrap();
        assert!(result.contains("placeholder asset"));
        assert!(
            store
                .exists("user-asset-files/session_001/assets/my-asset.glb")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_register_all() {
        let (_dir, store, issuer) = harness();
        let mut registry = pitcrew_core::tools::ToolRegistry::new();
        register_all(&mut registry, store, issuer, false);
        assert_eq!(registry.len(), 3);
    }
}
