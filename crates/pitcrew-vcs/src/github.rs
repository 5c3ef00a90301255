//! GitHub REST provider
//!
//! Read-only access to a hosted repository via the GitHub v3 API. Selected
//! by config when the project tracks a real remote instead of the built-in
//! fixture repository.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::provider::{CommitInfo, RepoProvider, RepoUser};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "pitcrew";

/// GitHub-backed repository provider
pub struct GithubRepo {
    client: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhBranch {
    name: String,
    commit: GhBranchHead,
}

#[derive(Debug, Deserialize)]
struct GhBranchHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GhCommit {
    sha: String,
    commit: GhCommitBody,
    author: Option<GhUser>,
}

#[derive(Debug, Deserialize)]
struct GhCommitBody {
    message: String,
    author: GhCommitAuthor,
}

#[derive(Debug, Deserialize)]
struct GhCommitAuthor {
    name: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

impl GithubRepo {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_API_BASE.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token,
        }
    }

    /// Point at a different API host (GitHub Enterprise, test server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!(
            "{}/repos/{}/{}{}",
            self.base_url, self.owner, self.repo, path
        );
        debug!("GitHub request: {}", url);

        let mut request = self.client.get(&url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GitHub request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("GitHub returned an error status for {}", url))?;

        response
            .json::<T>()
            .await
            .context("Failed to decode GitHub response")
    }

    fn to_commit_info(gh: GhCommit) -> CommitInfo {
        let author = gh
            .author
            .map(|u| u.login)
            .unwrap_or_else(|| gh.commit.author.name.clone());
        CommitInfo {
            hash: gh.sha,
            author,
            message: gh.commit.message,
            timestamp: gh.commit.author.date,
        }
    }
}

#[async_trait]
impl RepoProvider for GithubRepo {
    async fn list_branches(&self) -> Result<Vec<String>> {
        let branches: Vec<GhBranch> = self.get_json("/branches").await?;
        let mut names: Vec<String> = branches.into_iter().map(|b| b.name).collect();
        names.sort();
        Ok(names)
    }

    async fn latest_commit(&self, branch: &str) -> Result<CommitInfo> {
        let gh: GhBranch = self.get_json(&format!("/branches/{}", branch)).await?;
        let commit: GhCommit = self.get_json(&format!("/commits/{}", gh.commit.sha)).await?;
        Ok(Self::to_commit_info(commit))
    }

    async fn commit_details(&self, commit_id: &str) -> Result<Option<CommitInfo>> {
        match self.get_json::<GhCommit>(&format!("/commits/{}", commit_id)).await {
            Ok(commit) => Ok(Some(Self::to_commit_info(commit))),
            // The API answers 404/422 for unknown or ambiguous ids
            Err(e) => {
                debug!("Commit lookup for '{}' failed: {}", commit_id, e);
                Ok(None)
            }
        }
    }

    async fn recent_commits(&self, branch: &str, count: usize) -> Result<Vec<CommitInfo>> {
        let commits: Vec<GhCommit> = self
            .get_json(&format!("/commits?sha={}&per_page={}", branch, count))
            .await?;
        Ok(commits.into_iter().map(Self::to_commit_info).collect())
    }

    async fn latest_commit_by(&self, branch: &str, login: &str) -> Result<Option<CommitInfo>> {
        let commits: Vec<GhCommit> = self
            .get_json(&format!("/commits?sha={}&author={}&per_page=1", branch, login))
            .await?;
        Ok(commits.into_iter().next().map(Self::to_commit_info))
    }

    async fn known_users(&self) -> Result<Vec<RepoUser>> {
        // GitHub has no per-repo user listing; derive the set from recent commits
        let commits: Vec<GhCommit> = self.get_json("/commits?per_page=30").await?;
        let mut users: Vec<RepoUser> = Vec::new();
        for commit in commits {
            let display_name = commit.commit.author.name.clone();
            if let Some(gh_user) = commit.author {
                if !users.iter().any(|u| u.login == gh_user.login) {
                    users.push(RepoUser {
                        login: gh_user.login,
                        display_name,
                    });
                }
            }
        }
        Ok(users)
    }
}
