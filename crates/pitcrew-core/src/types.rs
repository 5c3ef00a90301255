//! Shared types for pitcrew-core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single structured action the router asked an external system to perform:
/// a tool name from the closed set plus a string-keyed argument mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// One completed conversation turn: the user utterance, the ordered tool
/// invocations it produced, and the final reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub user_content: String,
    pub invocations: Vec<ToolInvocation>,
    pub reply: String,
    pub timestamp: DateTime<Utc>,
}

/// A new user turn arriving from a front end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingTurn {
    pub session_id: String,
    pub user_id: String,
    pub content: String,
    pub frontend: FrontendKind,
    pub timestamp: DateTime<Utc>,
}

/// The dispatcher's answer to one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub reply: String,
    pub invocations: Vec<ToolInvocation>,
}

/// An unsolicited message pushed to the user (e.g. a build completion)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Which front end a turn came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FrontendKind {
    Terminal,
    Http,
    Eval,
    Internal,
}

impl FrontendKind {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "terminal" => Self::Terminal,
            "http" => Self::Http,
            "eval" => Self::Eval,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for FrontendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminal => write!(f, "terminal"),
            Self::Http => write!(f, "http"),
            Self::Eval => write!(f, "eval"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
