use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::{Error, Result};
use crate::jobs::JobPayload;

/// Transport for queued transformations
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, payload: JobPayload) -> Result<()>;
}

/// In-process queue feeding a [`Worker`](crate::jobs::Worker)
#[derive(Debug, Clone)]
pub struct InMemoryJobQueue {
    sender: mpsc::Sender<JobPayload>,
}

impl InMemoryJobQueue {
    /// Queue plus the receiving end for a worker
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobPayload>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    /// Never waits for room; a full queue rejects the job
    async fn push(&self, payload: JobPayload) -> Result<()> {
        let (job_id, queue) = (payload.id, payload.queue.clone());
        match self.sender.try_send(payload) {
            Ok(()) => {
                tracing::debug!(%job_id, %queue, "job enqueued");
                Ok(())
            }
            Err(TrySendError::Full(payload)) => Err(Error::Queue {
                message: format!(
                    "Queue '{}' is full ({} jobs waiting); job {} was not enqueued",
                    queue,
                    self.sender.max_capacity(),
                    payload.id
                ),
            }),
            Err(TrySendError::Closed(payload)) => Err(Error::Queue {
                message: format!("No worker is consuming job {}", payload.id),
            }),
        }
    }
}
