//! Recorded-conversation fixture format
//!
//! An evaluation set is a JSON document with an identifier, a name, a
//! description, and an ordered list of cases; each case is a scripted
//! multi-turn conversation with the tool calls and (optionally) the reply
//! each turn is expected to produce.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A file's worth of evaluation cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSet {
    pub eval_set_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub eval_cases: Vec<EvalCase>,
}

/// One scripted conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub eval_id: String,
    /// Session id the conversation replays under; defaults to the eval id
    #[serde(default)]
    pub session_id: Option<String>,
    pub conversation: Vec<EvalTurn>,
}

impl EvalCase {
    pub fn session_id(&self) -> &str {
        self.session_id.as_deref().unwrap_or(&self.eval_id)
    }
}

/// One scripted turn: the utterance and what the router must do with it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalTurn {
    pub user_content: String,
    #[serde(default)]
    pub expected_tool_use: Vec<ExpectedToolUse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_response: Option<String>,
}

/// An expected tool invocation: name plus exact argument mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedToolUse {
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Map<String, Value>,
}
