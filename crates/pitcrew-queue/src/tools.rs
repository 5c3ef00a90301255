//! Publish and status tools for the build and monitor delegates

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use pitcrew_core::tools::{ToolHandler, bool_or, json_schema, optional_str, require_str};
use pitcrew_store::asset_prefix;

use crate::payload::QueuePayload;
use crate::status::StatusStore;
use crate::topic::BuildPublisher;

/// Reported by `get_build_status` when the store has nothing to show
pub const NO_BUILD: &str = "nobuild";

/// `publish_build_request`: put an engine build request on the topic
pub struct PublishBuildRequestTool {
    publisher: BuildPublisher,
}

impl PublishBuildRequestTool {
    pub fn new(publisher: BuildPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl ToolHandler for PublishBuildRequestTool {
    fn name(&self) -> &str {
        "publish_build_request"
    }

    fn description(&self) -> &str {
        "Publishes a build request message for the worker machine"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "command": {"type": "string", "description": "Worker command, e.g. 'start_build'"},
                "branch_name": {"type": "string", "description": "Git branch to build from"},
                "commit_hash": {"type": "string", "description": "Git commit hash to build"},
                "is_test_build": {"type": "boolean", "description": "Skip the actual engine build"}
            }),
            vec!["command", "branch_name", "commit_hash"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let command = require_str(&input, "command")?;
        let branch_name = require_str(&input, "branch_name")?;
        let commit_hash = require_str(&input, "commit_hash")?;
        let is_test_build = bool_or(&input, "is_test_build", false);

        let build_id = Uuid::new_v4().to_string();
        let payload = QueuePayload::BuildRequest {
            build_id: build_id.clone(),
            command: command.clone(),
            branch_name: branch_name.clone(),
            commit_hash: commit_hash.clone(),
            is_test_build,
            request_timestamp: Utc::now(),
        };
        self.publisher.publish(payload).await?;

        Ok(format!(
            "Published build request {} for {}@{} (command '{}').",
            build_id, branch_name, commit_hash, command
        ))
    }
}

/// `publish_asset_build_request`: ask the worker to bundle a session's assets
pub struct PublishAssetBuildRequestTool {
    publisher: BuildPublisher,
}

impl PublishAssetBuildRequestTool {
    pub fn new(publisher: BuildPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl ToolHandler for PublishAssetBuildRequestTool {
    fn name(&self) -> &str {
        "publish_asset_build_request"
    }

    fn description(&self) -> &str {
        "Publishes an asset bundle build request for a session's uploaded files"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "command": {"type": "string", "description": "Worker command, typically 'asset-build'"},
                "session_id": {"type": "string", "description": "Conversation session id"}
            }),
            vec!["command", "session_id"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let command = require_str(&input, "command")?;
        let session_id = require_str(&input, "session_id")?;

        let build_id = Uuid::new_v4().to_string();
        let payload = QueuePayload::AssetBuildRequest {
            build_id: build_id.clone(),
            command,
            asset_prefix: asset_prefix(&session_id),
            session_id,
            request_timestamp: Utc::now(),
        };
        self.publisher.publish(payload).await?;

        Ok(format!("Published asset build request {}.", build_id))
    }
}

/// `get_build_status`: what happened to the most relevant build
pub struct GetBuildStatusTool {
    store: Arc<StatusStore>,
}

impl GetBuildStatusTool {
    pub fn new(store: Arc<StatusStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for GetBuildStatusTool {
    fn name(&self) -> &str {
        "get_build_status"
    }

    fn description(&self) -> &str {
        "Looks up the status of a build by id, by session, or the most recent overall"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "build_id": {"type": "string", "description": "Specific build id"},
                "session_id": {"type": "string", "description": "Conversation session id"}
            }),
            vec![],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let record = if let Some(build_id) = optional_str(&input, "build_id") {
            self.store.get(&build_id)?
        } else if let Some(session_id) = optional_str(&input, "session_id") {
            match self.store.latest_for_session(&session_id)? {
                Some(record) => Some(record),
                None => self.store.latest()?,
            }
        } else {
            self.store.latest()?
        };

        Ok(match record {
            Some(record) => record.status_line(),
            None => NO_BUILD.to_string(),
        })
    }
}

/// Register the queue tools
pub fn register_all(
    registry: &mut pitcrew_core::tools::ToolRegistry,
    publisher: BuildPublisher,
    store: Arc<StatusStore>,
) {
    registry.register(Arc::new(PublishBuildRequestTool::new(publisher.clone())));
    registry.register(Arc::new(PublishAssetBuildRequestTool::new(publisher)));
    registry.register(Arc::new(GetBuildStatusTool::new(store)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{BuildState, CompletionEvent};
    use crate::topic::build_topic;

    #[tokio::test]
    async fn test_publish_build_request_tool() {
        let (publisher, mut rx) = build_topic(8);
        let tool = PublishBuildRequestTool::new(publisher);

        let result = tool
            .execute(serde_json::json!({
                "command": "start_build_for_unityadmin",
                "branch_name": "main",
                "commit_hash": "abcdef0123",
                "is_test_build": false
            }))
            .await
            .unwrap();
        assert!(result.contains("main@abcdef0123"));

        match rx.recv().await.unwrap() {
            QueuePayload::BuildRequest {
                command,
                branch_name,
                is_test_build,
                ..
            } => {
                assert_eq!(command, "start_build_for_unityadmin");
                assert_eq!(branch_name, "main");
                assert!(!is_test_build);
            }
            other => panic!("expected BuildRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_requires_arguments() {
        let (publisher, _rx) = build_topic(8);
        let tool = PublishBuildRequestTool::new(publisher);
        assert!(
            tool.execute(serde_json::json!({"command": "start_build"}))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_publish_asset_build_request_tool() {
        let (publisher, mut rx) = build_topic(8);
        let tool = PublishAssetBuildRequestTool::new(publisher);

        tool.execute(serde_json::json!({
            "command": "asset-build",
            "session_id": "session_001"
        }))
        .await
        .unwrap();

        match rx.recv().await.unwrap() {
            QueuePayload::AssetBuildRequest {
                asset_prefix,
                session_id,
                ..
            } => {
                assert_eq!(asset_prefix, "user-asset-files/session_001/assets/");
                assert_eq!(session_id, "session_001");
            }
            other => panic!("expected AssetBuildRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_tool_reports_nobuild_on_empty_store() {
        let store = Arc::new(StatusStore::in_memory().unwrap());
        let tool = GetBuildStatusTool::new(store);
        let result = tool
            .execute(serde_json::json!({"session_id": "session_001"}))
            .await
            .unwrap();
        assert_eq!(result, NO_BUILD);
    }

    #[tokio::test]
    async fn test_status_tool_reports_latest() {
        let store = Arc::new(StatusStore::in_memory().unwrap());
        store
            .record_completion(&CompletionEvent {
                build_id: "b-1".to_string(),
                state: BuildState::Succeeded,
                message: "Build completed".to_string(),
                artifact_path: None,
                session_id: None,
                completed_at: Utc::now(),
            })
            .unwrap();

        let tool = GetBuildStatusTool::new(store);
        // Session lookup falls back to the latest build overall
        let result = tool
            .execute(serde_json::json!({"session_id": "session_001"}))
            .await
            .unwrap();
        assert!(result.starts_with("succeeded"));

        let by_id = tool
            .execute(serde_json::json!({"build_id": "b-1"}))
            .await
            .unwrap();
        assert!(by_id.starts_with("succeeded"));
    }

    #[tokio::test]
    async fn test_register_all() {
        let (publisher, _rx) = build_topic(8);
        let store = Arc::new(StatusStore::in_memory().unwrap());
        let mut registry = pitcrew_core::tools::ToolRegistry::new();
        register_all(&mut registry, publisher, store);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("get_build_status"));
    }
}
