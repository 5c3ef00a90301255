//! Session store: per-conversation state and transcript
//!
//! A session carries a mutable string-keyed state mapping (initially empty)
//! that accumulates context across turns, e.g. a pending build confirmation,
//! plus the ordered transcript of completed turns. Sessions live in a
//! bounded LRU so an abandoned front end cannot grow memory without limit.

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::TurnRecord;

/// Maximum number of sessions kept in memory (LRU eviction)
const MAX_SESSIONS: usize = 1000;

/// One conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    /// Mutable key-value state accumulated across turns
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub turns: Vec<TurnRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            state: Map::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_state(&mut self, key: &str, value: Value) {
        self.state.insert(key.to_string(), value);
    }

    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Remove and return a state entry
    pub fn take_state(&mut self, key: &str) -> Option<Value> {
        self.state.remove(key)
    }

    pub fn record_turn(&mut self, turn: TurnRecord) {
        self.updated_at = turn.timestamp;
        self.turns.push(turn);
    }
}

/// Async, LRU-bounded store of sessions
pub struct SessionStore {
    sessions: Mutex<LruCache<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(LruCache::new(
                NonZeroUsize::new(MAX_SESSIONS).expect("MAX_SESSIONS is non-zero"),
            )),
        }
    }

    /// Fetch a session, creating it if absent
    pub async fn get_or_create(&self, session_id: &str, user_id: &str) -> Session {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(session_id) {
            return session.clone();
        }
        debug!("Creating session {} for user {}", session_id, user_id);
        let session = Session::new(session_id, user_id);
        sessions.put(session_id.to_string(), session.clone());
        session
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        sessions.get(session_id).cloned()
    }

    /// Write a session back after mutating it
    pub async fn put(&self, session: Session) {
        let mut sessions = self.sessions.lock().await;
        sessions.put(session.id.clone(), session);
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolInvocation;

    #[tokio::test]
    async fn test_get_or_create() {
        let store = SessionStore::new();
        let s1 = store.get_or_create("session_001", "dev_user_1").await;
        assert_eq!(s1.id, "session_001");
        assert!(s1.state.is_empty());
        assert_eq!(store.count().await, 1);

        // Same id returns the same session
        let s2 = store.get_or_create("session_001", "dev_user_1").await;
        assert_eq!(s2.created_at, s1.created_at);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_state_survives_put() {
        let store = SessionStore::new();
        let mut session = store.get_or_create("s1", "u1").await;
        session.set_state("pending_build", serde_json::json!({"branch_name": "main"}));
        store.put(session).await;

        let loaded = store.get("s1").await.unwrap();
        assert_eq!(
            loaded.get_state("pending_build").unwrap()["branch_name"],
            "main"
        );
    }

    #[tokio::test]
    async fn test_take_state() {
        let store = SessionStore::new();
        let mut session = store.get_or_create("s1", "u1").await;
        session.set_state("k", serde_json::json!(1));
        assert!(session.take_state("k").is_some());
        assert!(session.take_state("k").is_none());
    }

    #[test]
    fn test_record_turn_updates_timestamp() {
        let mut session = Session::new("s1", "u1");
        let turn = TurnRecord {
            user_content: "hello".to_string(),
            invocations: vec![ToolInvocation::new("x", Map::new())],
            reply: "hi".to_string(),
            timestamp: Utc::now(),
        };
        let stamp = turn.timestamp;
        session.record_turn(turn);
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.updated_at, stamp);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let store = SessionStore::new();
        assert!(store.get("nope").await.is_none());
    }
}
