//! Queue message payloads and build states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message published to the build topic for the worker to consume
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueuePayload {
    /// Full engine build of a branch at a specific commit
    BuildRequest {
        build_id: String,
        command: String,
        branch_name: String,
        commit_hash: String,
        is_test_build: bool,
        request_timestamp: DateTime<Utc>,
    },
    /// Asset bundle compilation from a session's uploaded files
    AssetBuildRequest {
        build_id: String,
        command: String,
        asset_prefix: String,
        session_id: String,
        request_timestamp: DateTime<Utc>,
    },
}

impl QueuePayload {
    pub fn build_id(&self) -> &str {
        match self {
            Self::BuildRequest { build_id, .. } => build_id,
            Self::AssetBuildRequest { build_id, .. } => build_id,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::BuildRequest { .. } => None,
            Self::AssetBuildRequest { session_id, .. } => Some(session_id),
        }
    }

    pub fn request_timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::BuildRequest {
                request_timestamp, ..
            } => *request_timestamp,
            Self::AssetBuildRequest {
                request_timestamp, ..
            } => *request_timestamp,
        }
    }
}

/// Lifecycle state of a build as seen by the status store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Building,
    Succeeded,
    Failed,
}

impl BuildState {
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "building" => Some(Self::Building),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Building => write!(f, "building"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Reported by the worker when a build reaches a terminal state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionEvent {
    pub build_id: String,
    pub state: BuildState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}
