//! Worker runtime draining an in-memory queue

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::events::EventSink;
use crate::jobs::{JobPayload, JobState, TransformJob, TransformerRegistry};
use crate::transformer::TransformerPipeline;

/// Runs queued jobs one at a time, retrying failed attempts up to the
/// payload's `tries`
pub struct Worker {
    receiver: mpsc::Receiver<JobPayload>,
    pipeline: TransformerPipeline,
    registry: TransformerRegistry,
    events: Arc<dyn EventSink>,
    retry_delay: Duration,
}

impl Worker {
    pub fn new(
        receiver: mpsc::Receiver<JobPayload>,
        pipeline: TransformerPipeline,
        registry: TransformerRegistry,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            receiver,
            pipeline,
            registry,
            events,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Pause between attempts of the same job
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Process jobs until every queue handle is dropped
    pub async fn run(mut self) {
        tracing::info!("transformation worker started");
        while let Some(payload) = self.receiver.recv().await {
            self.process(payload).await;
        }
        tracing::info!("transformation worker stopped");
    }

    /// Spawn [`run`](Self::run) on the current tokio runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run one job to a final state, releasing its job-scoped registry entry
    pub async fn process(&self, payload: JobPayload) -> JobState {
        let binding = payload.binding.clone();
        let mut job = TransformJob::new(
            payload,
            self.pipeline.clone(),
            self.registry.clone(),
            self.events.clone(),
        );

        let state = self.attempt_until_final(&mut job).await;
        if let Some(key) = binding {
            self.registry.remove(&key);
        }
        state
    }

    async fn attempt_until_final(&self, job: &mut TransformJob) -> JobState {
        loop {
            let error = match job.handle().await {
                Ok(_) => return job.state(),
                Err(error) => error,
            };

            // Misconfiguration will not fix itself between attempts
            let permanent = matches!(error, Error::Configuration { .. });
            if permanent || !job.can_retry() {
                job.failed(&error).await;
                return job.state();
            }

            tracing::warn!(
                job_id = %job.payload().id,
                attempt = job.attempts(),
                tries = job.payload().tries,
                %error,
                "transformation attempt failed; retrying"
            );
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, InMemoryCacheStore, ResultCache};
    use crate::error::Result;
    use crate::events::{BroadcastEventSink, TransformationEvent};
    use crate::jobs::{InMemoryJobQueue, JobQueue, QueueConfig};
    use crate::media::Content;
    use crate::provider::{ProviderAdapter, ProviderRequest, ProviderResponse, ProvidersConfig};
    use crate::transformer::PromptTransformer;
    use crate::types::Context;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider;

    #[async_trait]
    impl ProviderAdapter for StubProvider {
        async fn send(&self, _request: ProviderRequest) -> Result<ProviderResponse> {
            Ok(ProviderResponse::Text("done".into()))
        }
    }

    /// Rejects its input the first `failures` times
    fn flaky(name: &str, failures: usize) -> PromptTransformer {
        let seen = Arc::new(AtomicUsize::new(0));
        PromptTransformer::new(name, "p").before(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) < failures {
                Err(Error::validation("content", "not yet"))
            } else {
                Ok(())
            }
        })
    }

    fn worker(events: &BroadcastEventSink, transformer: PromptTransformer) -> (InMemoryJobQueue, Worker) {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = ResultCache::new(Arc::new(InMemoryCacheStore::new()), config);
        let pipeline = TransformerPipeline::new(Arc::new(StubProvider), cache, ProvidersConfig::default());
        let registry = TransformerRegistry::new();
        registry.register(Arc::new(transformer));

        let (queue, receiver) = InMemoryJobQueue::new(8);
        let worker = Worker::new(receiver, pipeline, registry, Arc::new(events.clone()))
            .with_retry_delay(Duration::from_millis(1));
        (queue, worker)
    }

    fn payload(transformer: &str, tries: u32) -> JobPayload {
        let config = QueueConfig {
            tries,
            ..QueueConfig::default()
        };
        JobPayload::new(transformer, &Content::from("input"), Context::new(), &config)
    }

    fn drain(receiver: &mut tokio::sync::broadcast::Receiver<TransformationEvent>) -> Vec<TransformationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let events = BroadcastEventSink::new(32);
        let mut receiver = events.subscribe();
        let (_queue, worker) = worker(&events, flaky("flaky", 2));

        let state = worker.process(payload("flaky", 3)).await;
        assert_eq!(state, JobState::Completed);

        let events = drain(&mut receiver);
        let started = events.iter().filter(|e| matches!(e, TransformationEvent::Started { .. })).count();
        assert_eq!(started, 3);
        assert!(matches!(events.last(), Some(TransformationEvent::Completed { .. })));
        assert!(!events.iter().any(|e| matches!(e, TransformationEvent::Failed { terminal: true, .. })));
    }

    #[tokio::test]
    async fn test_exhausted_tries_emit_terminal_failure() {
        let events = BroadcastEventSink::new(32);
        let mut receiver = events.subscribe();
        let (_queue, worker) = worker(&events, flaky("stubborn", usize::MAX));

        let state = worker.process(payload("stubborn", 2)).await;
        assert_eq!(state, JobState::Failed);

        let events = drain(&mut receiver);
        let failures: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                TransformationEvent::Failed { terminal, .. } => Some(*terminal),
                _ => None,
            })
            .collect();
        assert_eq!(failures, [false, false, true]);
    }

    #[tokio::test]
    async fn test_configuration_errors_are_not_retried() {
        let events = BroadcastEventSink::new(32);
        let mut receiver = events.subscribe();
        let (_queue, worker) = worker(&events, flaky("present", 0));

        let state = worker.process(payload("absent", 3)).await;
        assert_eq!(state, JobState::Failed);

        let started = drain(&mut receiver)
            .iter()
            .filter(|e| matches!(e, TransformationEvent::Started { .. }))
            .count();
        assert_eq!(started, 1);
    }

    #[tokio::test]
    async fn test_scoped_entry_is_released_after_final_state() {
        let events = BroadcastEventSink::new(32);
        let (_queue, worker) = worker(&events, flaky("shared", 0));

        let job = payload("shared", 1).scoped();
        let key = job.registry_key().to_string();
        worker.registry.register_as(key.clone(), Arc::new(flaky("shared", 0)));

        assert_eq!(worker.process(job).await, JobState::Completed);
        assert!(!worker.registry.contains(&key));
        assert!(worker.registry.contains("shared"));

        let failing = payload("shared", 1).scoped();
        let key = failing.registry_key().to_string();
        worker.registry.register_as(key.clone(), Arc::new(flaky("shared", usize::MAX)));

        assert_eq!(worker.process(failing).await, JobState::Failed);
        assert!(!worker.registry.contains(&key));
    }

    #[tokio::test]
    async fn test_run_drains_queue() {
        let events = BroadcastEventSink::new(32);
        let mut receiver = events.subscribe();
        let (queue, worker) = worker(&events, flaky("ok", 0));
        let handle = worker.spawn();

        let job = payload("ok", 1);
        let id = job.id;
        queue.push(job).await.unwrap();

        loop {
            let event = receiver.recv().await.unwrap();
            if event.is_final() {
                assert_eq!(event.job_id(), id);
                assert!(matches!(event, TransformationEvent::Completed { .. }));
                break;
            }
        }

        drop(queue);
        handle.await.unwrap();
    }
}
