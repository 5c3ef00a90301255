//! pitcrew-core: the routing brain of pitcrew
//!
//! This crate provides:
//! - Shared turn/session/invocation types
//! - The tool registry and executor traits
//! - Delegate profiles and the standard delegate team
//! - Deterministic utterance classification
//! - The per-turn dispatcher implementing the confirm-then-act protocol

pub mod delegates;
pub mod dispatcher;
pub mod router;
pub mod session;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use delegates::{DelegateManager, DelegateProfile, standard_team};
pub use dispatcher::{Dispatcher, HeadLookup, TRANSFER_TOOL};
pub use router::{RouterAction, VcsQuery, classify, classify_confirmation};
pub use session::{Session, SessionStore};
pub use tools::{ToolDefinition, ToolExecutor, ToolHandler, ToolRegistry, json_schema};
pub use types::{
    FrontendKind, IncomingTurn, Notification, ToolInvocation, TurnOutcome, TurnRecord,
};
