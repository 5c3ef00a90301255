//! HTTP front end over raw tokio TCP
//!
//! Endpoints:
//! - GET  /api/health          : liveness probe
//! - POST /api/chat            : submit one chat turn
//! - GET  /api/sessions/:id    : fetch a session transcript
//!
//! Requests are capped in size, and when an auth token is configured the
//! Authorization header is checked with a constant-time comparison.

use std::collections::HashMap;
use std::sync::Arc;
use anyhow::Result;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use pitcrew_core::dispatcher::Dispatcher;
use pitcrew_core::types::{FrontendKind, IncomingTurn};

use crate::protocol::{ChatRequest, ChatResponse, SessionView, error_body};

/// Maximum request body size (1MB)
const MAX_REQUEST_BODY_SIZE: usize = 1_048_576;

/// The gateway server
pub struct GatewayServer {
    dispatcher: Arc<Dispatcher>,
    auth_token: Option<String>,
}

impl GatewayServer {
    pub fn new(dispatcher: Arc<Dispatcher>, auth_token: Option<String>) -> Self {
        Self {
            dispatcher,
            auth_token,
        }
    }

    /// Run the HTTP server until shutdown is requested
    pub async fn serve(self: Arc<Self>, host: &str, port: u16, cancel: CancellationToken) -> Result<()> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind(format!("{}:{}", host, port)).await?;
        info!("Gateway listening on {}:{}", host, port);

        loop {
            let (stream, _addr) = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Gateway shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => accepted?,
            };
            let server = self.clone();

            tokio::spawn(async move {
                let (reader, mut writer) = stream.into_split();
                let mut buf_reader = BufReader::new(reader);
                let mut request_line = String::new();

                if buf_reader.read_line(&mut request_line).await.is_err() {
                    return;
                }

                // Read headers
                let mut headers = HashMap::new();
                let mut content_length: usize = 0;
                loop {
                    let mut line = String::new();
                    if buf_reader.read_line(&mut line).await.is_err() {
                        return;
                    }
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((key, value)) = line.split_once(':') {
                        let key = key.trim().to_lowercase();
                        let value = value.trim().to_string();
                        if key == "content-length" {
                            content_length = value.parse().unwrap_or(0);
                        }
                        headers.insert(key, value);
                    }
                }

                // Enforce the body cap before allocating
                if content_length > MAX_REQUEST_BODY_SIZE {
                    warn!(
                        "Gateway request body too large: {} bytes (max {})",
                        content_length, MAX_REQUEST_BODY_SIZE
                    );
                    let resp = format!(
                        "HTTP/1.1 413 Payload Too Large\r\nContent-Type: application/json\r\n\r\n{}",
                        error_body("request body too large")
                    );
                    let _ = writer.write_all(resp.as_bytes()).await;
                    return;
                }

                // Read body
                let mut body = vec![0u8; content_length];
                if content_length > 0 {
                    use tokio::io::AsyncReadExt;
                    if buf_reader.read_exact(&mut body).await.is_err() {
                        return;
                    }
                }

                if !server.authorized(&headers) {
                    let resp = format!(
                        "HTTP/1.1 401 Unauthorized\r\nContent-Type: application/json\r\n\r\n{}",
                        error_body("unauthorized")
                    );
                    let _ = writer.write_all(resp.as_bytes()).await;
                    return;
                }

                let parts: Vec<&str> = request_line.split_whitespace().collect();
                if parts.len() < 2 {
                    return;
                }
                let (status, response_body) = server.route(parts[0], parts[1], &body).await;

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                    status,
                    response_body.len(),
                    response_body
                );
                let _ = writer.write_all(response.as_bytes()).await;
            });
        }
    }

    /// Check the Authorization header with a constant-time comparison
    fn authorized(&self, headers: &HashMap<String, String>) -> bool {
        let Some(expected_token) = &self.auth_token else {
            return true;
        };
        let auth = headers.get("authorization").cloned().unwrap_or_default();
        if !auth.starts_with("Bearer ") {
            return false;
        }
        let provided = auth[7..].as_bytes();
        let expected = expected_token.as_bytes();
        provided.len() == expected.len()
            && provided
                .iter()
                .zip(expected.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    /// Dispatch one parsed request to a handler
    pub async fn route(&self, method: &str, path: &str, body: &[u8]) -> (&'static str, String) {
        match (method, path) {
            ("GET", "/api/health") => ("200 OK", r#"{"status":"ok"}"#.to_string()),
            ("POST", "/api/chat") => self.handle_chat(body).await,
            ("GET", p) if p.starts_with("/api/sessions/") => {
                let session_id = &p["/api/sessions/".len()..];
                self.handle_get_session(session_id).await
            }
            _ => ("404 Not Found", error_body("not found")),
        }
    }

    async fn handle_chat(&self, body: &[u8]) -> (&'static str, String) {
        let request: ChatRequest = match serde_json::from_slice(body) {
            Ok(r) => r,
            Err(e) => {
                return (
                    "400 Bad Request",
                    error_body(&format!("invalid request: {}", e)),
                );
            }
        };

        let session_id = request
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let turn = IncomingTurn {
            session_id: session_id.clone(),
            user_id: request.user_id,
            content: request.text,
            frontend: FrontendKind::Http,
            timestamp: Utc::now(),
        };

        match self.dispatcher.handle_turn(turn).await {
            Ok(outcome) => {
                let response = ChatResponse {
                    session_id,
                    reply: outcome.reply,
                    tool_calls: outcome.invocations,
                };
                match serde_json::to_string(&response) {
                    Ok(json) => ("200 OK", json),
                    Err(e) => (
                        "500 Internal Server Error",
                        error_body(&format!("encoding failed: {}", e)),
                    ),
                }
            }
            Err(e) => {
                warn!("Chat turn failed: {:#}", e);
                ("500 Internal Server Error", error_body("turn failed"))
            }
        }
    }

    async fn handle_get_session(&self, session_id: &str) -> (&'static str, String) {
        match self.dispatcher.sessions().get(session_id).await {
            Some(session) => {
                let view = SessionView {
                    id: session.id,
                    user_id: session.user_id,
                    turns: session.turns,
                };
                match serde_json::to_string(&view) {
                    Ok(json) => ("200 OK", json),
                    Err(e) => (
                        "500 Internal Server Error",
                        error_body(&format!("encoding failed: {}", e)),
                    ),
                }
            }
            None => ("404 Not Found", error_body("session not found")),
        }
    }
}
