//! Event-channel grammar tests: reasoning before completion, one
//! `done` last, cancellation still terminates cleanly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axon_llm::{BudgetConstraints, CacheConfig, LlmOrchestrator};
use axon_stream::{GatewayError, StreamingCoordinator};
use axon_types::{
    ChatMessage, ChunkStream, CompletionChunk, CompletionRequest, CompletionResponse, Event,
    LlmProvider, ProviderError, StaticRouter, TokenUsage,
};
use futures::stream;
use tokio_util::sync::CancellationToken;

/// A provider that streams a fixed set of chunks, optionally pausing
/// between them.
struct ScriptedProvider {
    name: &'static str,
    chunks: Vec<&'static str>,
    delay: Duration,
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        Ok(CompletionResponse {
            model: request.model,
            text: self.chunks.concat(),
            usage: TokenUsage::new(50, 20),
        })
    }

    async fn stream_completion(
        &self,
        cancel: CancellationToken,
        request: CompletionRequest,
    ) -> Result<ChunkStream, ProviderError> {
        let model = request.model.clone();
        let delay = self.delay;
        let chunks: Vec<CompletionChunk> = self
            .chunks
            .iter()
            .map(|text| CompletionChunk::content("cmpl-1", 1_700_000_000, model.clone(), *text))
            .chain(std::iter::once(CompletionChunk::finish(
                "cmpl-1",
                1_700_000_000,
                model.clone(),
            )))
            .collect();

        Ok(ChunkStream::new(stream::unfold(
            (chunks.into_iter(), cancel, delay),
            |(mut chunks, cancel, delay)| async move {
                if !delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return None,
                    }
                }
                let chunk = chunks.next()?;
                Some((Ok(chunk), (chunks, cancel, delay)))
            },
        )))
    }

    async fn check_health(&self) -> bool {
        true
    }
}

fn coordinator(provider: Arc<ScriptedProvider>) -> (StreamingCoordinator, Arc<LlmOrchestrator>) {
    let orchestrator = Arc::new(LlmOrchestrator::new(
        BudgetConstraints::default(),
        CacheConfig::default(),
    ));
    let router = Arc::new(StaticRouter::new().with_prefix("", provider));
    let coordinator =
        StreamingCoordinator::new(Arc::clone(&orchestrator), HashMap::new(), router);
    (coordinator, orchestrator)
}

fn request(text: &str) -> CompletionRequest {
    CompletionRequest::new("gpt-4o", vec![ChatMessage::user(text)])
}

async fn collect(mut rx: tokio::sync::mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn reasoning_precedes_completion_and_done_is_last() {
    let provider = Arc::new(ScriptedProvider {
        name: "openai",
        chunks: vec!["Four", "."],
        delay: Duration::ZERO,
    });
    let (coordinator, orchestrator) = coordinator(provider);

    let rx = coordinator
        .process_request(request("What is 2+2?"), "sequential_basic", CancellationToken::new())
        .unwrap();
    let events = collect(rx).await;

    // the streamed completion is charged against the session budget
    // ("gpt-4o" on "openai" has a profile, so the estimate has a price)
    assert!(orchestrator.session_spent().await > rust_decimal::Decimal::ZERO);
    assert!(
        orchestrator
            .spent_by_agent()
            .await
            .contains_key("stream_coordinator")
    );

    let kinds: Vec<u8> = events
        .iter()
        .map(|e| match e {
            Event::Reasoning(_) => 0,
            Event::Completion(_) => 1,
            Event::Error { .. } => 2,
            Event::Done { .. } => 3,
        })
        .collect();

    // strictly: all reasoning, then all completion, then done
    let mut sorted = kinds.clone();
    sorted.sort_unstable();
    assert_eq!(kinds, sorted, "events out of order: {kinds:?}");
    assert!(kinds.contains(&0), "no reasoning events");
    assert!(kinds.contains(&1), "no completion events");
    assert_eq!(kinds.iter().filter(|k| **k == 3).count(), 1);
    assert!(events.last().unwrap().is_done());

    // chunk text survives intact and in order
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            Event::Completion(chunk) => Some(chunk.content_text()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Four.");
}

#[tokio::test]
async fn invalid_requests_fail_synchronously() {
    let provider = Arc::new(ScriptedProvider {
        name: "openai",
        chunks: vec!["x"],
        delay: Duration::ZERO,
    });
    let (coordinator, _orchestrator) = coordinator(provider);

    let mut bad = request("hello");
    bad.model = String::new();
    assert!(matches!(
        coordinator.process_request(bad, "sequential_basic", CancellationToken::new()),
        Err(GatewayError::Request(_))
    ));

    let err = coordinator
        .process_request(request("hello"), "no_such_workflow", CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, GatewayError::Pipeline(_)));
}

#[tokio::test]
async fn cancellation_mid_stream_still_ends_with_done() {
    let provider = Arc::new(ScriptedProvider {
        name: "openai",
        chunks: vec!["a", "b", "c", "d", "e", "f", "g", "h"],
        delay: Duration::from_millis(30),
    });
    let (coordinator, _orchestrator) = coordinator(provider);

    let cancel = CancellationToken::new();
    let mut rx = coordinator
        .process_request(request("What is 2+2?"), "sequential_basic", cancel.clone())
        .unwrap();

    let mut events = Vec::new();
    let mut completions = 0;
    while let Some(event) = rx.recv().await {
        if matches!(event, Event::Completion(_)) {
            completions += 1;
            if completions == 1 {
                cancel.cancel();
            }
        }
        events.push(event);
    }

    assert!(completions >= 1);
    assert!(events.last().unwrap().is_done());
    assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
}

#[tokio::test]
async fn unroutable_model_reports_error_then_done() {
    let orchestrator = Arc::new(LlmOrchestrator::new(
        BudgetConstraints::default(),
        CacheConfig::default(),
    ));
    let router = Arc::new(StaticRouter::new());
    let coordinator = StreamingCoordinator::new(orchestrator, HashMap::new(), router);

    let rx = coordinator
        .process_request(request("What is 2+2?"), "sequential_basic", CancellationToken::new())
        .unwrap();
    let events = collect(rx).await;

    assert!(events.iter().any(|e| matches!(
        e,
        Event::Error { code, .. } if code == "no_provider_for_model"
    )));
    assert!(matches!(events.last(), Some(Event::Done { success: false })));
}
