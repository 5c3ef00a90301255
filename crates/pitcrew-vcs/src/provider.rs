//! Repository provider trait and commit types

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Details of a single commit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// One-line human summary, first line of the message only
    pub fn summary(&self) -> String {
        let first_line = self.message.lines().next().unwrap_or("");
        format!(
            "{} by {}: {} ({})",
            &self.hash[..self.hash.len().min(10)],
            self.author,
            first_line,
            self.timestamp.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

/// A user known to the repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepoUser {
    pub login: String,
    pub display_name: String,
}

/// Read-only access to the game repository's branches and commits
#[async_trait]
pub trait RepoProvider: Send + Sync {
    /// All branch names, sorted
    async fn list_branches(&self) -> Result<Vec<String>>;

    /// Head commit of a branch
    async fn latest_commit(&self, branch: &str) -> Result<CommitInfo>;

    /// Details for a full or unambiguous partial commit hash
    async fn commit_details(&self, commit_id: &str) -> Result<Option<CommitInfo>>;

    /// The most recent commits on a branch, newest first
    async fn recent_commits(&self, branch: &str, count: usize) -> Result<Vec<CommitInfo>>;

    /// The most recent commit by a specific author on a branch
    async fn latest_commit_by(&self, branch: &str, login: &str) -> Result<Option<CommitInfo>>;

    /// Users the repository knows about
    async fn known_users(&self) -> Result<Vec<RepoUser>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_summary_is_single_line() {
        let commit = CommitInfo {
            hash: "abcdef0123456789".to_string(),
            author: "alice".to_string(),
            message: "feat: new menu\n\nlong body text".to_string(),
            timestamp: "2025-06-11T10:00:00Z".parse().unwrap(),
        };
        let summary = commit.summary();
        assert!(summary.starts_with("abcdef0123 by alice: feat: new menu"));
        assert!(!summary.contains("long body"));
    }
}
