//! One queued transformation and its state machine
//!
//! `Queued → Running → {Completed, Failed}`. A non-final failure puts the
//! job back to `Queued` so the worker can run it again.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::{EventSink, TransformationEvent};
use crate::jobs::{JobPayload, TransformerRegistry};
use crate::result::TransformerResult;
use crate::transformer::TransformerPipeline;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// A payload bound to the services it needs to run
pub struct TransformJob {
    payload: JobPayload,
    state: JobState,
    attempts: u32,
    pipeline: TransformerPipeline,
    registry: TransformerRegistry,
    events: Arc<dyn EventSink>,
}

impl TransformJob {
    pub fn new(
        payload: JobPayload,
        pipeline: TransformerPipeline,
        registry: TransformerRegistry,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            payload,
            state: JobState::Queued,
            attempts: 0,
            pipeline,
            registry,
            events,
        }
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is allowed after a failure
    pub fn can_retry(&self) -> bool {
        self.attempts < self.payload.tries
    }

    /// Run one attempt under the payload's timeout
    ///
    /// Emits `Started` first, then `Completed` or a non-terminal `Failed`.
    /// The error is returned so the worker can apply the retry policy.
    pub async fn handle(&mut self) -> Result<TransformerResult> {
        self.state = JobState::Running;
        self.attempts += 1;

        self.events
            .emit(TransformationEvent::Started {
                job_id: self.payload.id,
                content: self.payload.content.summary(),
                context: self.payload.context.clone(),
            })
            .await;

        let outcome = match tokio::time::timeout(self.payload.timeout(), self.run()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout {
                message: format!("transformation job {} did not finish", self.payload.id),
                seconds: self.payload.timeout_secs,
            }),
        };

        match outcome {
            Ok(result) => {
                self.state = JobState::Completed;
                self.events
                    .emit(TransformationEvent::Completed {
                        job_id: self.payload.id,
                        result: result.clone(),
                        context: self.payload.context.clone(),
                    })
                    .await;
                Ok(result)
            }
            Err(error) => {
                self.state = JobState::Queued;
                self.events
                    .emit(TransformationEvent::Failed {
                        job_id: self.payload.id,
                        error: error.to_string(),
                        content: self.payload.content.summary(),
                        context: self.payload.context.clone(),
                        terminal: false,
                    })
                    .await;
                Err(error)
            }
        }
    }

    async fn run(&self) -> Result<TransformerResult> {
        let transformer = self.registry.get(self.payload.registry_key()).ok_or_else(|| {
            Error::configuration(format!(
                "Transformer '{}' is not registered with this worker",
                self.payload.transformer
            ))
        })?;
        let content = self.payload.content.decode()?;

        let result = self.pipeline.execute(transformer.as_ref(), content).await?;
        Ok(result.with_context(self.payload.context.clone()))
    }

    /// Terminal failure: no further attempts will be made
    pub async fn failed(&mut self, error: &Error) {
        tracing::error!(
            job_id = %self.payload.id,
            transformer = %self.payload.transformer,
            queue = %self.payload.queue,
            connection = %self.payload.connection,
            attempts = self.attempts,
            tries = self.payload.tries,
            retryable = error.is_retryable(),
            context = ?self.payload.context,
            %error,
            "transformation job failed permanently"
        );

        self.state = JobState::Failed;
        self.events
            .emit(TransformationEvent::Failed {
                job_id: self.payload.id,
                error: error.to_string(),
                content: self.payload.content.summary(),
                context: self.payload.context.clone(),
                terminal: true,
            })
            .await;
    }
}
