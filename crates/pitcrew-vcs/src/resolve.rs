//! Natural-language resolution of branch names and users
//!
//! Pure keyword matching, deterministic by construction. The same rules the
//! resolution tools expose, usable directly by other crates.

use crate::provider::RepoUser;

/// Resolve a free-form query ("the dev branch", "prod", "feature/new-ui")
/// into a concrete branch name from the given set.
pub fn resolve_branch_name(query: &str, branches: &[String]) -> Option<String> {
    let query_lower = query.to_lowercase();

    // Exact name or "branch <name>" mention wins
    for branch in branches {
        let branch_lower = branch.to_lowercase();
        if branch_lower == query_lower.trim()
            || query_lower.contains(&format!("branch {}", branch_lower))
        {
            return Some(branch.clone());
        }
    }

    // Common aliases
    if ["main", "master", "prod", "production"]
        .iter()
        .any(|a| query_lower.contains(a))
    {
        for candidate in ["main", "master"] {
            if branches.iter().any(|b| b == candidate) {
                return Some(candidate.to_string());
            }
        }
    }
    if query_lower.contains("dev") {
        for candidate in ["develop", "dev"] {
            if branches.iter().any(|b| b == candidate) {
                return Some(candidate.to_string());
            }
        }
    }

    // Substring mention of any branch name
    branches
        .iter()
        .find(|b| query_lower.contains(&b.to_lowercase()))
        .cloned()
}

/// Resolve a free-form query ("Alice's code", "changes by bob") into a
/// repository user login.
pub fn resolve_git_user(query: &str, users: &[RepoUser]) -> Option<String> {
    let query_lower = query.to_lowercase();
    users
        .iter()
        .find(|u| {
            query_lower.contains(&u.login.to_lowercase())
                || query_lower.contains(&u.display_name.to_lowercase())
        })
        .map(|u| u.login.clone())
}
