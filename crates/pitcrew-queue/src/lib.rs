//! pitcrew-queue: build-request plumbing
//!
//! The in-process build topic, the request/completion payloads, the SQLite
//! status store, the completion listener, the simulated worker, and the
//! publish/status tools.

pub mod listener;
pub mod payload;
pub mod status;
pub mod tools;
pub mod topic;
pub mod worker;

pub use listener::CompletionListener;
pub use payload::{BuildState, CompletionEvent, QueuePayload};
pub use status::{BuildRecord, StatusStore};
pub use tools::NO_BUILD;
pub use topic::{BuildPublisher, DEFAULT_CAPACITY, build_topic};
pub use worker::SimWorker;
