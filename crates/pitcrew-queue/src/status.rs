//! SQLite status store for builds
//!
//! Rows are written from the worker path only: receipt puts a build into
//! `building`, a completion event moves it to its terminal state. A status
//! query that finds no row reports `nobuild`, which is also what a freshly
//! published request looks like until a worker picks it up.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::payload::{BuildState, CompletionEvent, QueuePayload};

/// One build as recorded by the status store
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRecord {
    pub build_id: String,
    pub command: String,
    pub branch_name: Option<String>,
    pub commit_hash: Option<String>,
    pub is_test_build: bool,
    pub session_id: Option<String>,
    pub state: BuildState,
    pub message: Option<String>,
    pub artifact_path: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BuildRecord {
    /// Human status line for the monitor delegate
    pub fn status_line(&self) -> String {
        let mut line = self.state.to_string();
        if let Some(message) = &self.message {
            line.push_str(&format!(": {}", message));
        }
        if let Some(artifact) = &self.artifact_path {
            line.push_str(&format!(" (artifact {})", artifact));
        }
        line
    }
}

/// SQLite-backed store of build states
pub struct StatusStore {
    conn: Mutex<Connection>,
}

impl StatusStore {
    /// Open (or create) the store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open status store at {}", path.display()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        info!("Status store opened at {}", path.display());
        Ok(store)
    }

    /// An in-memory store for tests and eval runs
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        debug!("Initializing build status tables");
        let conn = self.conn.lock().expect("status store lock poisoned");
        conn.execute(
            "CREATE TABLE IF NOT EXISTS builds (
                build_id TEXT PRIMARY KEY,
                command TEXT NOT NULL,
                branch_name TEXT,
                commit_hash TEXT,
                is_test_build INTEGER NOT NULL DEFAULT 0,
                session_id TEXT,
                state TEXT NOT NULL,
                message TEXT,
                artifact_path TEXT,
                requested_at TEXT NOT NULL,
                completed_at TEXT
            )",
            [],
        )
        .context("Failed to create builds table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_builds_session ON builds(session_id)",
            [],
        )
        .context("Failed to create builds session index")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_builds_requested ON builds(requested_at)",
            [],
        )
        .context("Failed to create builds requested index")?;

        Ok(())
    }

    /// Record a request the worker has picked up (state `building`)
    pub fn record_received(&self, payload: &QueuePayload) -> Result<()> {
        let conn = self.conn.lock().expect("status store lock poisoned");
        match payload {
            QueuePayload::BuildRequest {
                build_id,
                command,
                branch_name,
                commit_hash,
                is_test_build,
                request_timestamp,
            } => {
                conn.execute(
                    "INSERT INTO builds
                        (build_id, command, branch_name, commit_hash, is_test_build,
                         session_id, state, requested_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7)
                     ON CONFLICT(build_id) DO UPDATE SET state = excluded.state",
                    params![
                        build_id,
                        command,
                        branch_name,
                        commit_hash,
                        *is_test_build as i32,
                        BuildState::Building.to_string(),
                        request_timestamp.to_rfc3339(),
                    ],
                )
                .context("Failed to record build request")?;
            }
            QueuePayload::AssetBuildRequest {
                build_id,
                command,
                session_id,
                request_timestamp,
                ..
            } => {
                conn.execute(
                    "INSERT INTO builds
                        (build_id, command, is_test_build, session_id, state, requested_at)
                     VALUES (?1, ?2, 0, ?3, ?4, ?5)
                     ON CONFLICT(build_id) DO UPDATE SET state = excluded.state",
                    params![
                        build_id,
                        command,
                        session_id,
                        BuildState::Building.to_string(),
                        request_timestamp.to_rfc3339(),
                    ],
                )
                .context("Failed to record asset build request")?;
            }
        }
        debug!("Recorded build {} as building", payload.build_id());
        Ok(())
    }

    /// Record a completion event, upserting when the request row is missing
    pub fn record_completion(&self, event: &CompletionEvent) -> Result<()> {
        let conn = self.conn.lock().expect("status store lock poisoned");
        let updated = conn
            .execute(
                "UPDATE builds SET state = ?2, message = ?3, artifact_path = ?4, completed_at = ?5
                 WHERE build_id = ?1",
                params![
                    event.build_id,
                    event.state.to_string(),
                    event.message,
                    event.artifact_path,
                    event.completed_at.to_rfc3339(),
                ],
            )
            .context("Failed to record completion")?;

        if updated == 0 {
            conn.execute(
                "INSERT INTO builds
                    (build_id, command, session_id, state, message, artifact_path,
                     requested_at, completed_at)
                 VALUES (?1, 'unknown', ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    event.build_id,
                    event.session_id,
                    event.state.to_string(),
                    event.message,
                    event.artifact_path,
                    event.completed_at.to_rfc3339(),
                ],
            )
            .context("Failed to insert completion for unknown build")?;
        }
        debug!("Recorded build {} as {}", event.build_id, event.state);
        Ok(())
    }

    /// Look up one build by id
    pub fn get(&self, build_id: &str) -> Result<Option<BuildRecord>> {
        let conn = self.conn.lock().expect("status store lock poisoned");
        conn.query_row(
            &format!("{} WHERE build_id = ?1", SELECT_BUILD),
            params![build_id],
            row_to_record,
        )
        .optional()
        .context("Failed to query build by id")
    }

    /// The most recent build associated with a session
    pub fn latest_for_session(&self, session_id: &str) -> Result<Option<BuildRecord>> {
        let conn = self.conn.lock().expect("status store lock poisoned");
        conn.query_row(
            &format!(
                "{} WHERE session_id = ?1 ORDER BY requested_at DESC LIMIT 1",
                SELECT_BUILD
            ),
            params![session_id],
            row_to_record,
        )
        .optional()
        .context("Failed to query latest build for session")
    }

    /// The most recent build overall
    pub fn latest(&self) -> Result<Option<BuildRecord>> {
        let conn = self.conn.lock().expect("status store lock poisoned");
        conn.query_row(
            &format!("{} ORDER BY requested_at DESC LIMIT 1", SELECT_BUILD),
            [],
            row_to_record,
        )
        .optional()
        .context("Failed to query latest build")
    }
}

const SELECT_BUILD: &str = "SELECT build_id, command, branch_name, commit_hash, is_test_build, \
     session_id, state, message, artifact_path, requested_at, completed_at FROM builds";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<BuildRecord> {
    let is_test_build: i32 = row.get(4)?;
    let state_str: String = row.get(6)?;
    let requested_at_str: String = row.get(9)?;
    let completed_at_str: Option<String> = row.get(10)?;

    Ok(BuildRecord {
        build_id: row.get(0)?,
        command: row.get(1)?,
        branch_name: row.get(2)?,
        commit_hash: row.get(3)?,
        is_test_build: is_test_build != 0,
        session_id: row.get(5)?,
        state: BuildState::from_string(&state_str).unwrap_or(BuildState::Failed),
        message: row.get(7)?,
        artifact_path: row.get(8)?,
        requested_at: parse_timestamp(&requested_at_str),
        completed_at: completed_at_str.as_deref().map(parse_timestamp),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
