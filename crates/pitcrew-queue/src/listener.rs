//! Completion listener
//!
//! Consumes completion events from the worker, records them in the status
//! store, and forwards a notification to the front end so the user hears
//! about finished builds without asking.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pitcrew_core::types::Notification;

use crate::payload::CompletionEvent;
use crate::status::StatusStore;

/// Bridges worker completions into the status store and user notifications
pub struct CompletionListener {
    rx: mpsc::Receiver<CompletionEvent>,
    store: Arc<StatusStore>,
    notify_tx: mpsc::Sender<Notification>,
    cancel: CancellationToken,
}

impl CompletionListener {
    pub fn new(
        rx: mpsc::Receiver<CompletionEvent>,
        store: Arc<StatusStore>,
        notify_tx: mpsc::Sender<Notification>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx,
            store,
            notify_tx,
            cancel,
        }
    }

    /// Run until the channel closes or shutdown is requested
    pub async fn run(mut self) {
        info!("Completion listener started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Completion listener shutting down");
                    break;
                }
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.handle(event).await,
                        None => {
                            info!("Completion channel closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, event: CompletionEvent) {
        info!("Build {} completed: {}", event.build_id, event.state);

        if let Err(e) = self.store.record_completion(&event) {
            warn!("Failed to record completion for {}: {}", event.build_id, e);
        }

        let mut content = format!("Build {} {}: {}", event.build_id, event.state, event.message);
        if let Some(artifact) = &event.artifact_path {
            content.push_str(&format!(" (artifact {})", artifact));
        }
        let notification = Notification {
            content,
            session_id: event.session_id.clone(),
            timestamp: event.completed_at,
        };
        if let Err(e) = self.notify_tx.send(notification).await {
            warn!("Failed to forward completion notification: {}", e);
        }
    }
}
