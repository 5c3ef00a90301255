//! Per-turn dispatch loop
//!
//! Given a session and a new user utterance, the dispatcher decides whether
//! to delegate to a named sub-agent and which tools to call before producing
//! a reply. Each turn yields exactly one ordered tool-invocation list
//! (possibly empty) and exactly one final reply; the same inputs always
//! reproduce the same tool trajectory.
//!
//! A build instruction is never executed immediately: the dispatcher stores
//! the payload in session state and asks for confirmation. Only an explicit
//! affirmative on the next actionable turn publishes the request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::delegates::DelegateManager;
use crate::router::{self, RouterAction, VcsQuery};
use crate::session::SessionStore;
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::types::{IncomingTurn, ToolInvocation, TurnOutcome, TurnRecord};

/// Recorded when the dispatcher hands a turn to a delegate
pub const TRANSFER_TOOL: &str = "transfer_to_agent";

/// Session state key holding a build payload awaiting confirmation
pub const STATE_PENDING_BUILD: &str = "pending_build";

/// Session state key set while an asset upload ticket is outstanding
pub const STATE_AWAITING_ASSET: &str = "awaiting_asset_upload";

/// Resolves a branch name to its current head commit.
/// Implemented by the version-control providers.
#[async_trait]
pub trait HeadLookup: Send + Sync {
    async fn latest_commit(&self, branch: &str) -> Result<String>;
}

/// The turn dispatcher
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    delegates: Arc<DelegateManager>,
    sessions: Arc<SessionStore>,
    heads: Arc<dyn HeadLookup>,
    default_branch: String,
    default_command: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        delegates: Arc<DelegateManager>,
        sessions: Arc<SessionStore>,
        heads: Arc<dyn HeadLookup>,
    ) -> Self {
        Self {
            registry,
            delegates,
            sessions,
            heads,
            default_branch: "main".to_string(),
            default_command: "start_build".to_string(),
        }
    }

    /// Set the branch used when a build request names none
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Set the queue command used when a build request names none
    pub fn with_default_command(mut self, command: impl Into<String>) -> Self {
        self.default_command = command.into();
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one user turn and produce the reply plus the tool trajectory
    pub async fn handle_turn(&self, turn: IncomingTurn) -> Result<TurnOutcome> {
        info!(
            "Handling turn from {} via {} in session {}",
            turn.user_id, turn.frontend, turn.session_id
        );

        let mut session = self
            .sessions
            .get_or_create(&turn.session_id, &turn.user_id)
            .await;
        let mut invocations = Vec::new();

        let pending = session.get_state(STATE_PENDING_BUILD).cloned();
        let reply = if let (Some(payload), Some(answer)) =
            (pending, router::classify_confirmation(&turn.content))
        {
            session.take_state(STATE_PENDING_BUILD);
            if answer {
                let args = payload.as_object().cloned().unwrap_or_default();
                let result = self
                    .run_tool("publish_build_request", args, &mut invocations)
                    .await
                    .context("Failed to publish confirmed build request")?;
                format!("{} I'll report back when the worker finishes.", result)
            } else {
                "Understood, I won't publish the build request.".to_string()
            }
        } else {
            self.dispatch_action(&turn, &mut session, &mut invocations)
                .await?
        };

        debug!(
            "Turn produced {} tool invocation(s) in session {}",
            invocations.len(),
            turn.session_id
        );

        session.record_turn(TurnRecord {
            user_content: turn.content.clone(),
            invocations: invocations.clone(),
            reply: reply.clone(),
            timestamp: Utc::now(),
        });
        self.sessions.put(session).await;

        Ok(TurnOutcome {
            session_id: turn.session_id,
            reply,
            invocations,
        })
    }

    async fn dispatch_action(
        &self,
        turn: &IncomingTurn,
        session: &mut crate::session::Session,
        invocations: &mut Vec<ToolInvocation>,
    ) -> Result<String> {
        match router::classify(&turn.content) {
            RouterAction::RequestBuild {
                branch,
                command,
                is_test_build,
            } => {
                let branch = branch.unwrap_or_else(|| self.default_branch.clone());
                let command = command.unwrap_or_else(|| self.default_command.clone());
                let commit = self
                    .heads
                    .latest_commit(&branch)
                    .await
                    .with_context(|| format!("Failed to resolve head of branch '{}'", branch))?;

                self.transfer("build", invocations);

                let payload = serde_json::json!({
                    "command": command,
                    "branch_name": branch,
                    "commit_hash": commit,
                    "is_test_build": is_test_build,
                });
                session.set_state(STATE_PENDING_BUILD, payload);

                let flavor = if is_test_build { " test" } else { "" };
                Ok(format!(
                    "I can publish a{} build request for branch '{}' at {} (command '{}'). \
                     Builds can take a few minutes. Should I go ahead and publish it?",
                    flavor,
                    branch,
                    short_hash(&commit),
                    command
                ))
            }

            RouterAction::StatusQuery { build_id } => {
                self.transfer("monitor", invocations);
                let mut args = Map::new();
                args.insert(
                    "session_id".to_string(),
                    Value::String(turn.session_id.clone()),
                );
                if let Some(id) = build_id {
                    args.insert("build_id".to_string(), Value::String(id));
                }
                let result = self
                    .run_tool("get_build_status", args, invocations)
                    .await
                    .context("Failed to look up build status")?;
                Ok(format!("Build status: {}", result))
            }

            RouterAction::Vcs(query) => {
                self.transfer("vcs", invocations);
                let (tool, args) = self.vcs_tool_call(query);
                self.run_tool(tool, args, invocations)
                    .await
                    .with_context(|| format!("Version-control lookup '{}' failed", tool))
            }

            RouterAction::AssetPreview => {
                self.transfer("asset", invocations);
                let mut args = Map::new();
                args.insert(
                    "session_id".to_string(),
                    Value::String(turn.session_id.clone()),
                );
                let result = self
                    .run_tool("generate_upload_url", args, invocations)
                    .await
                    .context("Failed to issue an upload ticket")?;
                session.set_state(STATE_AWAITING_ASSET, Value::Bool(true));
                Ok(format!(
                    "{} Tell me once the upload is done and I'll request the preview build.",
                    result
                ))
            }

            RouterAction::AssetUploaded => {
                if session.take_state(STATE_AWAITING_ASSET).is_none() {
                    return Ok(
                        "I don't have an asset upload in progress for this session. \
                         Say 'preview an asset' to start one."
                            .to_string(),
                    );
                }
                let mut args = Map::new();
                args.insert(
                    "command".to_string(),
                    Value::String("asset-build".to_string()),
                );
                args.insert(
                    "session_id".to_string(),
                    Value::String(turn.session_id.clone()),
                );
                let result = self
                    .run_tool("publish_asset_build_request", args, invocations)
                    .await
                    .context("Failed to publish asset build request")?;
                Ok(format!(
                    "{} I'll let you know when the preview bundle is ready.",
                    result
                ))
            }

            RouterAction::SmallTalk => Ok(
                "Okay. I'll be here when you need a build, a status check, or a repository lookup."
                    .to_string(),
            ),

            RouterAction::Unrecognized => Ok(
                "I can help with engine builds, build status, repository lookups, and asset \
                 previews. Try 'build main' or 'what's the latest commit?'"
                    .to_string(),
            ),
        }
    }

    fn vcs_tool_call(&self, query: VcsQuery) -> (&'static str, Map<String, Value>) {
        let mut args = Map::new();
        match query {
            VcsQuery::LatestCommit { branch, user } => {
                let branch = branch.unwrap_or_else(|| self.default_branch.clone());
                args.insert("branch".to_string(), Value::String(branch));
                match user {
                    Some(user) => {
                        args.insert("user_query".to_string(), Value::String(user));
                        ("resolve_latest_commit", args)
                    }
                    None => ("get_latest_commit_on_branch", args),
                }
            }
            VcsQuery::CommitDetails { commit_id } => {
                args.insert("commit_id".to_string(), Value::String(commit_id));
                ("get_commit_details", args)
            }
            VcsQuery::ListBranches => ("list_available_branches", args),
            VcsQuery::RecentCommits { branch, count } => {
                let branch = branch.unwrap_or_else(|| self.default_branch.clone());
                args.insert("branch".to_string(), Value::String(branch));
                args.insert("count".to_string(), Value::from(count));
                ("list_recent_commits_on_branch", args)
            }
            VcsQuery::ResolveBranch { query } => {
                args.insert("query".to_string(), Value::String(query));
                ("resolve_branch_name", args)
            }
            VcsQuery::ResolveUser { query } => {
                args.insert("query".to_string(), Value::String(query));
                ("resolve_git_user", args)
            }
        }
    }

    /// Record a `transfer_to_agent` invocation for a delegate
    fn transfer(&self, delegate_id: &str, invocations: &mut Vec<ToolInvocation>) {
        if self.delegates.get(delegate_id).is_none() {
            warn!("Transfer to unknown delegate '{}'", delegate_id);
        }
        let mut args = Map::new();
        args.insert(
            "agent_name".to_string(),
            Value::String(delegate_id.to_string()),
        );
        invocations.push(ToolInvocation::new(TRANSFER_TOOL, args));
    }

    /// Record an invocation and execute it through the registry
    async fn run_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
        invocations: &mut Vec<ToolInvocation>,
    ) -> Result<String> {
        self.delegates.delegate_for_tool(name);
        invocations.push(ToolInvocation::new(name, args.clone()));
        self.registry.execute(name, Value::Object(args)).await
    }
}

fn short_hash(commit: &str) -> &str {
    &commit[..commit.len().min(10)]
}
