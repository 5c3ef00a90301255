//! pitcrew-vcs: version-control access for the agent team
//!
//! Provides the repository provider trait, an in-memory fixture provider,
//! a GitHub REST provider, natural-language branch/user resolution, and the
//! tools the vcs delegate exposes.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use pitcrew_core::dispatcher::HeadLookup;

pub mod github;
pub mod memory;
pub mod provider;
pub mod resolve;
pub mod tools;

pub use github::GithubRepo;
pub use memory::InMemoryRepo;
pub use provider::{CommitInfo, RepoProvider, RepoUser};
pub use resolve::{resolve_branch_name, resolve_git_user};

/// Adapter exposing a repository provider as the dispatcher's head lookup
pub struct Heads {
    repo: Arc<dyn RepoProvider>,
}

impl Heads {
    pub fn new(repo: Arc<dyn RepoProvider>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl HeadLookup for Heads {
    async fn latest_commit(&self, branch: &str) -> Result<String> {
        Ok(self.repo.latest_commit(branch).await?.hash)
    }
}
