//! Transformation lifecycle events
//!
//! Jobs report through an injected [`EventSink`]; nothing is published
//! globally.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::result::TransformerResult;
use crate::types::Context;

/// Lifecycle event of a queued transformation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransformationEvent {
    Started {
        job_id: Uuid,
        /// Short description of the input
        content: String,
        context: Context,
    },
    Completed {
        job_id: Uuid,
        result: TransformerResult,
        context: Context,
    },
    Failed {
        job_id: Uuid,
        error: String,
        content: String,
        context: Context,
        /// Set on the final failure after all tries are spent
        terminal: bool,
    },
}

impl TransformationEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            TransformationEvent::Started { job_id, .. }
            | TransformationEvent::Completed { job_id, .. }
            | TransformationEvent::Failed { job_id, .. } => *job_id,
        }
    }

    /// Completed, or a failure after which the job will not run again
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransformationEvent::Completed { .. } | TransformationEvent::Failed { terminal: true, .. }
        )
    }
}

/// Consumer of lifecycle events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: TransformationEvent);
}

/// Fans events out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<TransformationEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransformationEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn emit(&self, event: TransformationEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

/// Writes events to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: TransformationEvent) {
        match &event {
            TransformationEvent::Started { job_id, content, .. } => {
                tracing::info!(%job_id, %content, "transformation started");
            }
            TransformationEvent::Completed { job_id, result, .. } => {
                tracing::info!(%job_id, status = ?result.status(), "transformation completed");
            }
            TransformationEvent::Failed {
                job_id,
                error,
                terminal,
                ..
            } => {
                tracing::warn!(%job_id, %error, terminal, "transformation failed");
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event: TransformationEvent) {}
}
