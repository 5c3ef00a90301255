//! Gateway HTTP protocol: JSON bodies for the chat and session endpoints

use serde::{Deserialize, Serialize};

use pitcrew_core::types::{ToolInvocation, TurnRecord};

/// Client → gateway: one chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Omitted on the first turn; the gateway mints one
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub text: String,
}

fn default_user_id() -> String {
    "web_user".to_string()
}

/// Gateway → client: the reply plus the tool trajectory of the turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub tool_calls: Vec<ToolInvocation>,
}

/// Gateway → client: a session transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub user_id: String,
    pub turns: Vec<TurnRecord>,
}

/// JSON error body
pub fn error_body(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}
