//! Deterministic utterance routing
//!
//! Classifies a user utterance into the action the dispatcher should take:
//! request a build, answer a status query, run a version-control lookup,
//! drive the asset preview flow, or just acknowledge. Classification is
//! keyword-based and pure, so replaying the same inputs always yields the
//! same tool trajectory.

use tracing::debug;

/// What the dispatcher should do with a turn
#[derive(Debug, Clone, PartialEq)]
pub enum RouterAction {
    /// Ask for confirmation, then publish an engine build request
    RequestBuild {
        branch: Option<String>,
        command: Option<String>,
        is_test_build: bool,
    },
    /// Look up the most recent build's status
    StatusQuery { build_id: Option<String> },
    /// A version-control lookup handled by the vcs delegate
    Vcs(VcsQuery),
    /// Start the asset preview flow (issue an upload ticket)
    AssetPreview,
    /// The user reports the asset upload finished
    AssetUploaded,
    /// Greeting or acknowledgment, no tools
    SmallTalk,
    /// Nothing we can act on, reply with capabilities
    Unrecognized,
}

/// The version-control lookups the router can recognize
#[derive(Debug, Clone, PartialEq)]
pub enum VcsQuery {
    LatestCommit {
        branch: Option<String>,
        user: Option<String>,
    },
    CommitDetails { commit_id: String },
    ListBranches,
    RecentCommits {
        branch: Option<String>,
        count: usize,
    },
    ResolveBranch { query: String },
    ResolveUser { query: String },
}

const ACK_WORDS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank", "bye", "okay", "ok", "cool", "great", "alright",
];

const AFFIRMATIVE_STARTS: &[&str] = &["yes", "yep", "yeah", "sure", "affirmative", "y"];
const AFFIRMATIVE_PHRASES: &[&str] = &["go ahead", "do it", "please do", "confirm"];
const NEGATIVE_STARTS: &[&str] = &["no", "nope", "nah", "cancel", "abort", "stop", "n"];
const NEGATIVE_PHRASES: &[&str] = &["never mind", "not now", "don't", "do not", "hold off"];

/// Interpret an utterance as an answer to a pending yes/no question.
///
/// Returns `Some(true)` for an affirmative, `Some(false)` for a decline,
/// and `None` when the utterance is neither (the pending question stays
/// open and the utterance is classified normally).
pub fn classify_confirmation(utterance: &str) -> Option<bool> {
    let lower = normalize(utterance);
    let first = lower.split_whitespace().next().unwrap_or("");

    if NEGATIVE_STARTS.contains(&first) || NEGATIVE_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(false);
    }
    if AFFIRMATIVE_STARTS.contains(&first) || AFFIRMATIVE_PHRASES.iter().any(|p| lower.contains(p))
    {
        return Some(true);
    }
    None
}

/// Classify an utterance into a [`RouterAction`]
pub fn classify(utterance: &str) -> RouterAction {
    let lower = normalize(utterance);

    let action = if is_small_talk(&lower) {
        RouterAction::SmallTalk
    } else if is_status_query(&lower) {
        RouterAction::StatusQuery {
            build_id: find_uuid_token(&lower),
        }
    } else if let Some(query) = classify_vcs(&lower) {
        RouterAction::Vcs(query)
    } else if lower.contains("uploaded") || lower.contains("finished uploading") {
        RouterAction::AssetUploaded
    } else if lower.contains("asset") && (lower.contains("preview") || lower.contains("upload")) {
        RouterAction::AssetPreview
    } else if lower.contains("build") {
        RouterAction::RequestBuild {
            branch: extract_branch(&lower),
            command: extract_after_phrase(&lower, "with message"),
            is_test_build: lower.contains("test build"),
        }
    } else {
        RouterAction::Unrecognized
    };

    debug!("Classified utterance as {:?}", action);
    action
}

fn normalize(utterance: &str) -> String {
    utterance
        .to_lowercase()
        .chars()
        .map(|c| if c == ',' || c == '.' || c == '!' || c == '?' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_small_talk(lower: &str) -> bool {
    let actionable = ["build", "status", "commit", "branch", "asset", "upload"];
    if actionable.iter().any(|w| lower.contains(w)) {
        return false;
    }
    let first = lower.split_whitespace().next().unwrap_or("");
    ACK_WORDS.contains(&first) || lower.contains("i'll wait") || lower.contains("wait a bit")
}

fn is_status_query(lower: &str) -> bool {
    if lower.contains("status") {
        return true;
    }
    lower.contains("build")
        && ["done", "finished", "ready", "complete"]
            .iter()
            .any(|w| lower.contains(w))
}

fn classify_vcs(lower: &str) -> Option<VcsQuery> {
    if lower.contains("latest commit") || lower.contains("last commit") {
        return Some(VcsQuery::LatestCommit {
            branch: extract_branch(lower),
            user: extract_after_word(lower, "by"),
        });
    }
    if lower.contains("list branches")
        || lower.contains("what branches")
        || lower.contains("available branches")
        || lower.contains("which branches")
    {
        return Some(VcsQuery::ListBranches);
    }
    if lower.contains("recent commits") || lower.contains("commit history") || lower.contains("git log")
    {
        return Some(VcsQuery::RecentCommits {
            branch: extract_branch(lower),
            count: 5,
        });
    }
    if lower.contains("which branch") || lower.contains("resolve branch") {
        return Some(VcsQuery::ResolveBranch {
            query: lower.to_string(),
        });
    }
    if lower.starts_with("who is") || lower.contains("which user") {
        return Some(VcsQuery::ResolveUser {
            query: lower.to_string(),
        });
    }
    if lower.contains("commit") {
        if let Some(id) = find_hex_token(lower) {
            return Some(VcsQuery::CommitDetails { commit_id: id });
        }
    }
    None
}

/// Find a branch mention: either "branch <name>" or a well-known branch word
fn extract_branch(lower: &str) -> Option<String> {
    if let Some(name) = extract_after_word(lower, "branch") {
        return Some(name);
    }
    for known in ["main", "master", "develop"] {
        if lower.split_whitespace().any(|w| w == known) {
            return Some(known.to_string());
        }
    }
    None
}

/// The token following a marker word ("branch x" → "x")
fn extract_after_word(lower: &str, marker: &str) -> Option<String> {
    let words: Vec<&str> = lower.split_whitespace().collect();
    words
        .iter()
        .position(|w| *w == marker)
        .and_then(|i| words.get(i + 1))
        .map(|w| w.to_string())
}

/// The token following a multi-word phrase ("with message x" → "x")
fn extract_after_phrase(lower: &str, phrase: &str) -> Option<String> {
    let idx = lower.find(phrase)?;
    lower[idx + phrase.len()..]
        .split_whitespace()
        .next()
        .map(|w| w.to_string())
}

fn find_hex_token(lower: &str) -> Option<String> {
    lower
        .split_whitespace()
        .find(|w| w.len() >= 7 && w.chars().all(|c| c.is_ascii_hexdigit()))
        .map(|w| w.to_string())
}

fn find_uuid_token(lower: &str) -> Option<String> {
    lower
        .split_whitespace()
        .find(|w| w.len() == 36 && w.chars().filter(|c| *c == '-').count() == 4)
        .map(|w| w.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_with_message() {
        let action = classify("Build the game with message start_build_for_unityadmin");
        assert_eq!(
            action,
            RouterAction::RequestBuild {
                branch: None,
                command: Some("start_build_for_unityadmin".to_string()),
                is_test_build: false,
            }
        );
    }

    #[test]
    fn test_build_request_with_branch() {
        let action = classify("please build branch develop");
        assert_eq!(
            action,
            RouterAction::RequestBuild {
                branch: Some("develop".to_string()),
                command: None,
                is_test_build: false,
            }
        );
    }

    #[test]
    fn test_test_build_flag() {
        let action = classify("run a test build of main");
        match action {
            RouterAction::RequestBuild {
                branch, is_test_build, ..
            } => {
                assert_eq!(branch.as_deref(), Some("main"));
                assert!(is_test_build);
            }
            other => panic!("expected RequestBuild, got {:?}", other),
        }
    }

    #[test]
    fn test_status_query() {
        assert_eq!(
            classify("Can you check the build status?"),
            RouterAction::StatusQuery { build_id: None }
        );
        assert_eq!(
            classify("is the build done yet"),
            RouterAction::StatusQuery { build_id: None }
        );
    }

    #[test]
    fn test_small_talk() {
        assert_eq!(classify("Okay, I'll wait a bit."), RouterAction::SmallTalk);
        assert_eq!(classify("thanks!"), RouterAction::SmallTalk);
        assert_eq!(classify("hello"), RouterAction::SmallTalk);
    }

    #[test]
    fn test_small_talk_does_not_swallow_actions() {
        assert!(matches!(
            classify("ok build main"),
            RouterAction::RequestBuild { .. }
        ));
    }

    #[test]
    fn test_latest_commit() {
        assert_eq!(
            classify("What's the latest commit on main?"),
            RouterAction::Vcs(VcsQuery::LatestCommit {
                branch: Some("main".to_string()),
                user: None,
            })
        );
    }

    #[test]
    fn test_latest_commit_by_user() {
        assert_eq!(
            classify("latest commit by alice on develop"),
            RouterAction::Vcs(VcsQuery::LatestCommit {
                branch: Some("develop".to_string()),
                user: Some("alice".to_string()),
            })
        );
    }

    #[test]
    fn test_list_branches() {
        assert_eq!(
            classify("What branches are there?"),
            RouterAction::Vcs(VcsQuery::ListBranches)
        );
    }

    #[test]
    fn test_recent_commits() {
        assert_eq!(
            classify("show me recent commits on main"),
            RouterAction::Vcs(VcsQuery::RecentCommits {
                branch: Some("main".to_string()),
                count: 5,
            })
        );
    }

    #[test]
    fn test_commit_details() {
        assert_eq!(
            classify("tell me about commit abcdef0123"),
            RouterAction::Vcs(VcsQuery::CommitDetails {
                commit_id: "abcdef0123".to_string(),
            })
        );
    }

    #[test]
    fn test_asset_preview() {
        assert_eq!(classify("I want to preview an asset"), RouterAction::AssetPreview);
        assert_eq!(classify("upload an asset please"), RouterAction::AssetPreview);
    }

    #[test]
    fn test_asset_uploaded() {
        assert_eq!(classify("I've uploaded it"), RouterAction::AssetUploaded);
        assert_eq!(classify("I've uploaded the asset"), RouterAction::AssetUploaded);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(classify("tell me a joke"), RouterAction::Unrecognized);
    }

    #[test]
    fn test_confirmation_affirmative() {
        assert_eq!(classify_confirmation("Yes"), Some(true));
        assert_eq!(classify_confirmation("yes please"), Some(true));
        assert_eq!(classify_confirmation("go ahead"), Some(true));
        assert_eq!(classify_confirmation("sure, do it"), Some(true));
    }

    #[test]
    fn test_confirmation_negative() {
        assert_eq!(classify_confirmation("no"), Some(false));
        assert_eq!(classify_confirmation("cancel that"), Some(false));
        assert_eq!(classify_confirmation("never mind"), Some(false));
        // "no thanks" must not read as affirmative
        assert_eq!(classify_confirmation("no thanks"), Some(false));
    }

    #[test]
    fn test_confirmation_neither() {
        assert_eq!(classify_confirmation("Okay, I'll wait a bit."), None);
        assert_eq!(classify_confirmation("what's the status?"), None);
    }
}
