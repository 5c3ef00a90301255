//! Version-control tools exposed to the vcs delegate
//!
//! Lookup misses (unknown branch alias, unresolved user, missing commit)
//! come back as readable replies, not errors; only provider failures
//! propagate.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use pitcrew_core::tools::{ToolHandler, json_schema, optional_str, optional_u64, require_str};

use crate::provider::RepoProvider;
use crate::resolve;

const DEFAULT_HISTORY_COUNT: usize = 5;

/// `get_latest_commit_on_branch` for "latest"/"head of" queries
pub struct GetLatestCommitTool {
    repo: Arc<dyn RepoProvider>,
}

impl GetLatestCommitTool {
    pub fn new(repo: Arc<dyn RepoProvider>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ToolHandler for GetLatestCommitTool {
    fn name(&self) -> &str {
        "get_latest_commit_on_branch"
    }

    fn description(&self) -> &str {
        "Retrieves the latest commit for a given branch"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "branch": {"type": "string", "description": "Branch name, e.g. 'main'"}
            }),
            vec!["branch"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let branch = require_str(&input, "branch")?;
        match self.repo.latest_commit(&branch).await {
            Ok(head) => Ok(format!("Latest commit on {}: {}", branch, head.summary())),
            Err(_) => Ok(format!("Branch '{}' was not found.", branch)),
        }
    }
}

/// `resolve_branch_name` for fuzzy branch mentions
pub struct ResolveBranchTool {
    repo: Arc<dyn RepoProvider>,
}

impl ResolveBranchTool {
    pub fn new(repo: Arc<dyn RepoProvider>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ToolHandler for ResolveBranchTool {
    fn name(&self) -> &str {
        "resolve_branch_name"
    }

    fn description(&self) -> &str {
        "Resolves a natural-language branch mention into a concrete branch name"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "query": {"type": "string", "description": "Free-form branch mention"}
            }),
            vec!["query"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let query = require_str(&input, "query")?;
        let branches = self.repo.list_branches().await?;
        match resolve::resolve_branch_name(&query, &branches) {
            Some(name) => Ok(name),
            None => Ok(format!(
                "Unable to resolve a branch from that. Available branches: {}",
                branches.join(", ")
            )),
        }
    }
}

/// `resolve_git_user` for fuzzy user mentions
pub struct ResolveUserTool {
    repo: Arc<dyn RepoProvider>,
}

impl ResolveUserTool {
    pub fn new(repo: Arc<dyn RepoProvider>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ToolHandler for ResolveUserTool {
    fn name(&self) -> &str {
        "resolve_git_user"
    }

    fn description(&self) -> &str {
        "Resolves a natural-language user mention into a repository login"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "query": {"type": "string", "description": "Free-form user mention"}
            }),
            vec!["query"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let query = require_str(&input, "query")?;
        let users = self.repo.known_users().await?;
        match resolve::resolve_git_user(&query, &users) {
            Some(login) => Ok(login),
            None => Ok("Unable to resolve a repository user from that query.".to_string()),
        }
    }
}

/// `get_commit_details` for a full or partial hash
pub struct CommitDetailsTool {
    repo: Arc<dyn RepoProvider>,
}

impl CommitDetailsTool {
    pub fn new(repo: Arc<dyn RepoProvider>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ToolHandler for CommitDetailsTool {
    fn name(&self) -> &str {
        "get_commit_details"
    }

    fn description(&self) -> &str {
        "Retrieves author, message, and timestamp for a specific commit id"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "commit_id": {"type": "string", "description": "Full or partial commit hash"}
            }),
            vec!["commit_id"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let commit_id = require_str(&input, "commit_id")?;
        match self.repo.commit_details(&commit_id).await {
            Ok(Some(commit)) => Ok(commit.summary()),
            Ok(None) => Ok(format!("Commit '{}' was not found.", commit_id)),
            Err(e) => Ok(format!("Commit '{}' could not be looked up: {}", commit_id, e)),
        }
    }
}

/// `list_available_branches`
pub struct ListBranchesTool {
    repo: Arc<dyn RepoProvider>,
}

impl ListBranchesTool {
    pub fn new(repo: Arc<dyn RepoProvider>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ToolHandler for ListBranchesTool {
    fn name(&self) -> &str {
        "list_available_branches"
    }

    fn description(&self) -> &str {
        "Lists all branches in the game repository"
    }

    fn input_schema(&self) -> Value {
        json_schema(serde_json::json!({}), vec![])
    }

    async fn execute(&self, _input: Value) -> Result<String> {
        let branches = self.repo.list_branches().await?;
        Ok(format!("Available branches: {}", branches.join(", ")))
    }
}

/// `list_recent_commits_on_branch`, the agent's `git log`
pub struct RecentCommitsTool {
    repo: Arc<dyn RepoProvider>,
}

impl RecentCommitsTool {
    pub fn new(repo: Arc<dyn RepoProvider>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ToolHandler for RecentCommitsTool {
    fn name(&self) -> &str {
        "list_recent_commits_on_branch"
    }

    fn description(&self) -> &str {
        "Lists the most recent commits on a branch, newest first"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "branch": {"type": "string", "description": "Branch name"},
                "count": {"type": "integer", "description": "How many commits to list"}
            }),
            vec!["branch"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let branch = require_str(&input, "branch")?;
        let count = optional_u64(&input, "count").unwrap_or(DEFAULT_HISTORY_COUNT as u64) as usize;
        match self.repo.recent_commits(&branch, count).await {
            Ok(commits) if commits.is_empty() => {
                Ok(format!("Branch '{}' has no commits.", branch))
            }
            Ok(commits) => {
                let lines: Vec<String> =
                    commits.iter().map(|c| format!("- {}", c.summary())).collect();
                Ok(format!(
                    "Recent commits on {}:\n{}",
                    branch,
                    lines.join("\n")
                ))
            }
            Err(_) => Ok(format!("Branch '{}' was not found.", branch)),
        }
    }
}

/// `resolve_latest_commit`: branch head, optionally filtered by a user
pub struct ResolveLatestCommitTool {
    repo: Arc<dyn RepoProvider>,
}

impl ResolveLatestCommitTool {
    pub fn new(repo: Arc<dyn RepoProvider>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ToolHandler for ResolveLatestCommitTool {
    fn name(&self) -> &str {
        "resolve_latest_commit"
    }

    fn description(&self) -> &str {
        "Resolves the latest commit on a branch, optionally by a specific user"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "branch": {"type": "string", "description": "Branch name"},
                "user_query": {"type": "string", "description": "Optional user mention"}
            }),
            vec!["branch"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let branch = require_str(&input, "branch")?;
        let user_query = optional_str(&input, "user_query");

        let login = match user_query {
            Some(query) => {
                let users = self.repo.known_users().await?;
                match resolve::resolve_git_user(&query, &users) {
                    Some(login) => Some(login),
                    None => {
                        return Ok(format!(
                            "Could not resolve a repository user from '{}'.",
                            query
                        ));
                    }
                }
            }
            None => None,
        };

        match login {
            Some(login) => match self.repo.latest_commit_by(&branch, &login).await {
                Ok(Some(commit)) => Ok(format!(
                    "Latest commit by {} on {}: {}",
                    login,
                    branch,
                    commit.summary()
                )),
                Ok(None) => Ok(format!(
                    "No commits by '{}' found on branch '{}'.",
                    login, branch
                )),
                Err(_) => Ok(format!("Branch '{}' was not found.", branch)),
            },
            None => match self.repo.latest_commit(&branch).await {
                Ok(commit) => Ok(format!("Latest commit on {}: {}", branch, commit.summary())),
                Err(_) => Ok(format!("Branch '{}' was not found.", branch)),
            },
        }
    }
}

/// Register all version-control tools against one provider
pub fn register_all(
    registry: &mut pitcrew_core::tools::ToolRegistry,
    repo: Arc<dyn RepoProvider>,
) {
    registry.register(Arc::new(GetLatestCommitTool::new(repo.clone())));
    registry.register(Arc::new(ResolveBranchTool::new(repo.clone())));
    registry.register(Arc::new(ResolveUserTool::new(repo.clone())));
    registry.register(Arc::new(CommitDetailsTool::new(repo.clone())));
    registry.register(Arc::new(ListBranchesTool::new(repo.clone())));
    registry.register(Arc::new(RecentCommitsTool::new(repo.clone())));
    registry.register(Arc::new(ResolveLatestCommitTool::new(repo)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepo;

    fn repo() -> Arc<dyn RepoProvider> {
        Arc::new(InMemoryRepo::default())
    }

    #[tokio::test]
    async fn test_latest_commit_tool() {
        let tool = GetLatestCommitTool::new(repo());
        let result = tool
            .execute(serde_json::json!({"branch": "main"}))
            .await
            .unwrap();
        assert!(result.contains("abcdef0123"));
        assert!(result.contains("alice"));
    }

    #[tokio::test]
    async fn test_latest_commit_tool_unknown_branch() {
        let tool = GetLatestCommitTool::new(repo());
        let result = tool
            .execute(serde_json::json!({"branch": "release"}))
            .await
            .unwrap();
        assert!(result.contains("not found"));
    }

    #[tokio::test]
    async fn test_missing_argument_is_an_error() {
        let tool = GetLatestCommitTool::new(repo());
        assert!(tool.execute(serde_json::json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_branch_tool() {
        let tool = ResolveBranchTool::new(repo());
        let result = tool
            .execute(serde_json::json!({"query": "the dev branch"}))
            .await
            .unwrap();
        assert_eq!(result, "develop");
    }

    #[tokio::test]
    async fn test_resolve_branch_tool_lists_alternatives() {
        let tool = ResolveBranchTool::new(repo());
        let result = tool
            .execute(serde_json::json!({"query": "the flying spaghetti branch"}))
            .await
            .unwrap();
        assert!(result.contains("Available branches"));
        assert!(result.contains("main"));
    }

    #[tokio::test]
    async fn test_resolve_user_tool() {
        let tool = ResolveUserTool::new(repo());
        let result = tool
            .execute(serde_json::json!({"query": "changes by Alice"}))
            .await
            .unwrap();
        assert_eq!(result, "alice");
    }

    #[tokio::test]
    async fn test_commit_details_tool() {
        let tool = CommitDetailsTool::new(repo());
        let result = tool
            .execute(serde_json::json!({"commit_id": "fedcba9876"}))
            .await
            .unwrap();
        assert!(result.contains("bob"));
        assert!(result.contains("Critical bug fix"));
    }

    #[tokio::test]
    async fn test_recent_commits_tool_count() {
        let tool = RecentCommitsTool::new(repo());
        let result = tool
            .execute(serde_json::json!({"branch": "main", "count": 2}))
            .await
            .unwrap();
        assert_eq!(result.lines().count(), 3); // header + 2 commits
    }

    #[tokio::test]
    async fn test_resolve_latest_commit_by_user() {
        let tool = ResolveLatestCommitTool::new(repo());
        let result = tool
            .execute(serde_json::json!({"branch": "main", "user_query": "bob"}))
            .await
            .unwrap();
        assert!(result.contains("fedcba9876"));
    }

    #[tokio::test]
    async fn test_resolve_latest_commit_without_user() {
        let tool = ResolveLatestCommitTool::new(repo());
        let result = tool
            .execute(serde_json::json!({"branch": "develop"}))
            .await
            .unwrap();
        assert!(result.contains("abcdef9876"));
    }

    #[tokio::test]
    async fn test_register_all() {
        let mut registry = pitcrew_core::tools::ToolRegistry::new();
        register_all(&mut registry, repo());
        assert_eq!(registry.len(), 7);
        assert!(registry.contains("resolve_latest_commit"));
    }
}
