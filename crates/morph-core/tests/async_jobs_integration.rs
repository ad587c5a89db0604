//! Queued dispatch through the in-process runtime


use morph_core::{
    Content, Dispatch, Media, MediaKind, MorphConfig, PromptTransformer, Runtime, TransformationEvent,
};
use serde_json::json;
use std::sync::Arc;
use test_support::{AlwaysFailingProvider, RecordingProvider};

async fn wait_for_final(
    receiver: &mut tokio::sync::broadcast::Receiver<TransformationEvent>,
) -> (Vec<TransformationEvent>, TransformationEvent) {
    let mut seen = Vec::new();
    loop {
        let event = receiver.recv().await.unwrap();
        if event.is_final() {
            return (seen, event);
        }
        seen.push(event);
    }
}

#[tokio::test]
async fn test_async_dispatch_completes_through_worker() {
    let provider = RecordingProvider::text("queued-summary");
    let runtime = Runtime::from_config(&MorphConfig::default(), provider.clone()).unwrap();
    let mut receiver = runtime.events.subscribe();
    let _worker = runtime.worker.spawn();

    let mut context = morph_core::Context::new();
    context.insert("request".into(), json!("r-1"));

    let dispatch = runtime
        .orchestrator
        .request()
        .with_text("a long article")
        .with_transformer(Arc::new(PromptTransformer::new("summarizer", "Summarize")))
        .with_context(context)
        .with_async()
        .run()
        .await
        .unwrap();
    let pending = match dispatch {
        Dispatch::Pending(pending) => pending,
        Dispatch::Completed(_) => panic!("expected a pending job"),
    };

    let (before, last) = wait_for_final(&mut receiver).await;
    assert!(matches!(before.first(), Some(TransformationEvent::Started { .. })));
    match last {
        TransformationEvent::Completed { job_id, result, context } => {
            assert_eq!(job_id, pending.id);
            assert_eq!(result.content(), Some("queued-summary"));
            assert_eq!(context["request"], json!("r-1"));
        }
        other => panic!("unexpected final event {:?}", other),
    }
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_same_named_transformers_run_with_their_own_prompts() {
    let provider = RecordingProvider::text("ok");
    let runtime = Runtime::from_config(&MorphConfig::default(), provider.clone()).unwrap();
    let mut receiver = runtime.events.subscribe();

    // both jobs are queued before the worker starts
    let mut ids = Vec::new();
    for prompt in ["PROMPT-A", "PROMPT-B"] {
        let dispatch = runtime
            .orchestrator
            .request()
            .with_text("same input")
            .with_transformer(Arc::new(PromptTransformer::new("summarizer", prompt)))
            .with_async()
            .run()
            .await
            .unwrap();
        match dispatch {
            Dispatch::Pending(pending) => ids.push(pending.id),
            Dispatch::Completed(_) => panic!("expected a pending job"),
        }
    }
    let _worker = runtime.worker.spawn();

    for id in &ids {
        let (_, last) = wait_for_final(&mut receiver).await;
        assert_eq!(last.job_id(), *id);
        assert!(matches!(last, TransformationEvent::Completed { .. }));
    }

    let prompts: Vec<Content> = provider
        .requests()
        .iter()
        .map(|request| request.messages[0].content.clone())
        .collect();
    assert_eq!(prompts, [Content::from("PROMPT-A"), Content::from("PROMPT-B")]);
}

#[tokio::test]
async fn test_queued_media_reaches_provider_intact() {
    let provider = RecordingProvider::text("a cat");
    let runtime = Runtime::from_config(&MorphConfig::default(), provider.clone()).unwrap();
    let mut receiver = runtime.events.subscribe();
    let _worker = runtime.worker.spawn();

    let bytes: Vec<u8> = (0u8..64).collect();
    let media = Media::new(MediaKind::Image, bytes.clone())
        .with_mime_type("image/png")
        .with_title("cat.png");

    runtime
        .orchestrator
        .request()
        .with_content(Content::Media(media.clone()))
        .with_transformer(Arc::new(PromptTransformer::new("captioner", "Describe")))
        .with_async()
        .run()
        .await
        .unwrap();

    let (_, last) = wait_for_final(&mut receiver).await;
    assert!(matches!(last, TransformationEvent::Completed { .. }));

    let request = provider.last_request().unwrap();
    assert_eq!(request.messages.last().unwrap().content, Content::Media(media));
}

#[tokio::test]
async fn test_provider_failure_completes_with_failed_result() {
    let runtime = Runtime::from_config(&MorphConfig::default(), Arc::new(AlwaysFailingProvider)).unwrap();
    let mut receiver = runtime.events.subscribe();
    let _worker = runtime.worker.spawn();

    runtime
        .orchestrator
        .request()
        .with_text("x")
        .with_transformer(Arc::new(PromptTransformer::new("summarizer", "Summarize")))
        .with_async()
        .run()
        .await
        .unwrap();

    let (_, last) = wait_for_final(&mut receiver).await;
    match last {
        TransformationEvent::Completed { result, .. } => {
            assert!(!result.is_successful());
            assert!(!result.errors().is_empty());
        }
        other => panic!("unexpected final event {:?}", other),
    }
}
