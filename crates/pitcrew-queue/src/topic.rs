//! In-process build-request topic
//!
//! A bounded mpsc channel with a cloneable publisher handle. The consumer
//! side is handed to the worker (real or simulated); when no worker is
//! attached the receiver simply buffers, which is exactly the behavior a
//! detached queue has.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::payload::QueuePayload;

/// Default capacity for the build topic
pub const DEFAULT_CAPACITY: usize = 64;

/// Create a build topic, returning the publisher and the consumer end
pub fn build_topic(capacity: usize) -> (BuildPublisher, mpsc::Receiver<QueuePayload>) {
    let (tx, rx) = mpsc::channel(capacity);
    info!("Created build topic with capacity {}", capacity);
    (BuildPublisher { tx }, rx)
}

/// Cloneable handle for publishing build requests
#[derive(Clone)]
pub struct BuildPublisher {
    tx: mpsc::Sender<QueuePayload>,
}

impl BuildPublisher {
    /// Publish one request to the topic
    pub async fn publish(&self, payload: QueuePayload) -> Result<()> {
        if let Ok(json) = serde_json::to_string(&payload) {
            debug!("Publishing build request: {}", json);
        }
        self.tx
            .send(payload)
            .await
            .context("Build topic is closed")?;
        Ok(())
    }
}
