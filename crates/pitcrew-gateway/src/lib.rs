//! pitcrew-gateway: the HTTP front end
//!
//! A small hand-rolled HTTP/1.1 server exposing the chat loop, session
//! transcripts, and a health probe.

pub mod protocol;
pub mod server;

pub use protocol::{ChatRequest, ChatResponse, SessionView};
pub use server::GatewayServer;
