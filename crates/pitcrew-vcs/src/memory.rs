//! In-memory repository provider
//!
//! Deterministic fixture data used by default, by the evaluation harness,
//! and by tests. Commits within a branch are stored newest first.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::provider::{CommitInfo, RepoProvider, RepoUser};

/// An in-memory repository with fixed branches, commits, and users
pub struct InMemoryRepo {
    branches: Vec<(String, Vec<CommitInfo>)>,
    users: Vec<RepoUser>,
}

impl InMemoryRepo {
    /// An empty repository; add branches with [`InMemoryRepo::with_branch`]
    pub fn empty() -> Self {
        Self {
            branches: Vec::new(),
            users: Vec::new(),
        }
    }

    pub fn with_branch(mut self, name: &str, commits: Vec<CommitInfo>) -> Self {
        self.branches.push((name.to_string(), commits));
        self
    }

    pub fn with_user(mut self, login: &str, display_name: &str) -> Self {
        self.users.push(RepoUser {
            login: login.to_string(),
            display_name: display_name.to_string(),
        });
        self
    }

    fn branch(&self, name: &str) -> Result<&Vec<CommitInfo>> {
        self.branches
            .iter()
            .find(|(b, _)| b == name)
            .map(|(_, commits)| commits)
            .ok_or_else(|| anyhow!("Branch '{}' not found", name))
    }
}

fn commit(hash: &str, author: &str, message: &str, timestamp: &str) -> CommitInfo {
    let timestamp: DateTime<Utc> = timestamp.parse().unwrap_or_else(|_| Utc::now());
    CommitInfo {
        hash: hash.to_string(),
        author: author.to_string(),
        message: message.to_string(),
        timestamp,
    }
}

impl Default for InMemoryRepo {
    /// The demo game project: three branches and three authors
    fn default() -> Self {
        Self::empty()
            .with_branch(
                "main",
                vec![
                    commit("abcdef0123", "alice", "feat: Implement new main menu UI", "2025-06-11T10:00:00Z"),
                    commit("fedcba9876", "bob", "fix: Critical bug fix for crash on startup", "2025-06-10T18:30:00Z"),
                    commit("1234567890", "charlie", "refactor: Optimize asset loading", "2025-06-10T09:15:00Z"),
                    commit("9876543210", "alice", "chore: Update build settings", "2025-06-09T14:00:00Z"),
                    commit("543210fedc", "bob", "docs: Add README for new feature", "2025-06-08T11:00:00Z"),
                    commit("0123456789", "charlie", "Initial commit", "2025-06-07T09:00:00Z"),
                ],
            )
            .with_branch(
                "develop",
                vec![
                    commit("abcdef9876", "bob", "feat: Add new enemy AI behavior", "2025-06-11T09:30:00Z"),
                    commit("9876abcdef", "alice", "feat: Integrate new particle system", "2025-06-10T16:00:00Z"),
                ],
            )
            .with_branch(
                "feature/new-ui",
                vec![commit(
                    "1234509876",
                    "alice",
                    "feat: Implement new user profile screen",
                    "2025-06-11T08:00:00Z",
                )],
            )
            .with_user("alice", "Alice")
            .with_user("bob", "Bob")
            .with_user("charlie", "Charlie")
    }
}

#[async_trait]
impl RepoProvider for InMemoryRepo {
    async fn list_branches(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.branches.iter().map(|(b, _)| b.clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn latest_commit(&self, branch: &str) -> Result<CommitInfo> {
        self.branch(branch)?
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Branch '{}' has no commits", branch))
    }

    async fn commit_details(&self, commit_id: &str) -> Result<Option<CommitInfo>> {
        let matches: Vec<&CommitInfo> = self
            .branches
            .iter()
            .flat_map(|(_, commits)| commits.iter())
            .filter(|c| c.hash.starts_with(commit_id))
            .collect();
        match matches.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some((*only).clone())),
            _ => {
                // A prefix shared by several commits is not a usable identifier
                let distinct: std::collections::HashSet<&str> =
                    matches.iter().map(|c| c.hash.as_str()).collect();
                if distinct.len() == 1 {
                    Ok(Some(matches[0].clone()))
                } else {
                    Err(anyhow!("Commit id '{}' is ambiguous", commit_id))
                }
            }
        }
    }

    async fn recent_commits(&self, branch: &str, count: usize) -> Result<Vec<CommitInfo>> {
        Ok(self.branch(branch)?.iter().take(count).cloned().collect())
    }

    async fn latest_commit_by(&self, branch: &str, login: &str) -> Result<Option<CommitInfo>> {
        Ok(self
            .branch(branch)?
            .iter()
            .find(|c| c.author.eq_ignore_ascii_case(login))
            .cloned())
    }

    async fn known_users(&self) -> Result<Vec<RepoUser>> {
        Ok(self.users.clone())
    }
}
