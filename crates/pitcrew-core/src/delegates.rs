//! Delegate profiles: the named specialist agents the router hands turns to
//!
//! Each delegate owns one task domain (build orchestration, build monitoring,
//! version control, asset preview) and a fixed set of tools. The root router
//! never executes a domain tool itself; it records a `transfer_to_agent`
//! invocation and lets the owning delegate's tools run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A delegate profile: identity plus the tools it is allowed to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl DelegateProfile {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Check if a tool belongs to this delegate
    pub fn owns_tool(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|t| t == tool_name)
    }
}

/// Manages the delegate team and answers ownership queries
pub struct DelegateManager {
    profiles: HashMap<String, DelegateProfile>,
}

impl DelegateManager {
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Register a delegate profile
    pub fn register(&mut self, profile: DelegateProfile) {
        info!(
            "DelegateManager: registered '{}' ({}) with {} tools",
            profile.id,
            profile.name,
            profile.tools.len()
        );
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Get a delegate by id
    pub fn get(&self, id: &str) -> Option<&DelegateProfile> {
        self.profiles.get(id)
    }

    /// Find the delegate that owns a given tool
    pub fn delegate_for_tool(&self, tool_name: &str) -> Option<&DelegateProfile> {
        let found = self.profiles.values().find(|p| p.owns_tool(tool_name));
        match found {
            Some(p) => debug!("Tool '{}' owned by delegate '{}'", tool_name, p.id),
            None => warn!("No delegate owns tool '{}'", tool_name),
        }
        found
    }

    /// List all delegate ids
    pub fn list(&self) -> Vec<&str> {
        self.profiles.keys().map(|k| k.as_str()).collect()
    }

    /// Number of registered delegates
    pub fn count(&self) -> usize {
        self.profiles.len()
    }
}

impl Default for DelegateManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the standard pitcrew delegate team
pub fn standard_team() -> DelegateManager {
    let mut manager = DelegateManager::new();

    manager.register(
        DelegateProfile::new(
            "build",
            "Build Orchestration",
            "Publishes engine build requests and checks the artifact cache",
        )
        .with_tools(&[
            "publish_build_request",
            "check_build_cache",
            "generate_download_url",
        ]),
    );

    manager.register(
        DelegateProfile::new(
            "monitor",
            "Build Monitor",
            "Answers build status queries and relays completion notifications",
        )
        .with_tools(&["get_build_status"]),
    );

    manager.register(
        DelegateProfile::new(
            "vcs",
            "Version Control",
            "Resolves branches, users, and commits in the game repository",
        )
        .with_tools(&[
            "get_latest_commit_on_branch",
            "resolve_branch_name",
            "resolve_git_user",
            "get_commit_details",
            "list_available_branches",
            "list_recent_commits_on_branch",
            "resolve_latest_commit",
        ]),
    );

    manager.register(
        DelegateProfile::new(
            "asset",
            "Asset Preview",
            "Issues asset upload tickets and requests asset bundle builds",
        )
        .with_tools(&["generate_upload_url", "publish_asset_build_request"]),
    );

    manager
}
