//! Simulated build worker
//!
//! Stands in for the external worker machine during local runs and tests:
//! consumes requests from the topic, marks them building, writes a
//! placeholder artifact, and emits a completion event. Test builds skip the
//! artifact entirely.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chrono::Utc;
use pitcrew_store::{ArtifactStore, asset_bundle_path, build_object_path};

use crate::payload::{BuildState, CompletionEvent, QueuePayload};
use crate::status::StatusStore;

/// In-process worker that simulates engine builds
pub struct SimWorker {
    rx: mpsc::Receiver<QueuePayload>,
    store: Arc<StatusStore>,
    artifacts: Arc<ArtifactStore>,
    completion_tx: mpsc::Sender<CompletionEvent>,
    build_delay: Duration,
    cancel: CancellationToken,
}

impl SimWorker {
    pub fn new(
        rx: mpsc::Receiver<QueuePayload>,
        store: Arc<StatusStore>,
        artifacts: Arc<ArtifactStore>,
        completion_tx: mpsc::Sender<CompletionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx,
            store,
            artifacts,
            completion_tx,
            build_delay: Duration::from_millis(500),
            cancel,
        }
    }

    /// Set how long a simulated build takes
    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    /// Run until the topic closes or shutdown is requested
    pub async fn run(mut self) {
        info!("Simulated build worker started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Simulated worker shutting down");
                    break;
                }
                payload = self.rx.recv() => {
                    match payload {
                        Some(payload) => self.process(payload).await,
                        None => {
                            info!("Build topic closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, payload: QueuePayload) {
        info!("Worker picked up build {}", payload.build_id());
        if let Err(e) = self.store.record_received(&payload) {
            warn!("Failed to record build receipt: {}", e);
        }

        tokio::time::sleep(self.build_delay).await;

        let event = match &payload {
            QueuePayload::BuildRequest {
                build_id,
                branch_name,
                commit_hash,
                is_test_build,
                ..
            } => {
                if *is_test_build {
                    CompletionEvent {
                        build_id: build_id.clone(),
                        state: BuildState::Succeeded,
                        message: "Test build acknowledged (no artifact produced)".to_string(),
                        artifact_path: None,
                        session_id: None,
                        completed_at: Utc::now(),
                    }
                } else {
                    let object = build_object_path(branch_name, commit_hash);
                    self.finish_with_artifact(build_id, &object, None).await
                }
            }
            QueuePayload::AssetBuildRequest {
                build_id,
                session_id,
                ..
            } => {
                let object = asset_bundle_path(session_id);
                self.finish_with_artifact(build_id, &object, Some(session_id.clone()))
                    .await
            }
        };

        if let Err(e) = self.completion_tx.send(event).await {
            warn!("Failed to emit completion event: {}", e);
        }
    }

    async fn finish_with_artifact(
        &self,
        build_id: &str,
        object: &str,
        session_id: Option<String>,
    ) -> CompletionEvent {
        match self.artifacts.write(object, b"simulated artifact").await {
            Ok(_) => CompletionEvent {
                build_id: build_id.to_string(),
                state: BuildState::Succeeded,
                message: "Build completed".to_string(),
                artifact_path: Some(object.to_string()),
                session_id,
                completed_at: Utc::now(),
            },
            Err(e) => {
                warn!("Artifact write failed for {}: {}", build_id, e);
                CompletionEvent {
                    build_id: build_id.to_string(),
                    state: BuildState::Failed,
                    message: format!("Artifact write failed: {}", e),
                    artifact_path: None,
                    session_id,
                    completed_at: Utc::now(),
                }
            }
        }
    }
}
