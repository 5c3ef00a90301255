//! pitcrew-eval: recorded-conversation replay
//!
//! Loads JSON conversation fixtures and replays them against the dispatcher,
//! checking that the tool trajectory reproduces the recording.

pub mod loader;
pub mod model;
pub mod runner;

pub use loader::{discover, load_all, load_file};
pub use model::{EvalCase, EvalSet, EvalTurn, ExpectedToolUse};
pub use runner::{
    CaseResult, DEFAULT_RESPONSE_THRESHOLD, EvalFailure, EvalReport, EvalRunner,
    response_similarity,
};
