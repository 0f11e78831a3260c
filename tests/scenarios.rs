//! End-to-end gateway scenarios over mock providers and data sources.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axon_context::{AgentContext, Namespace};
use axon_llm::{BudgetConstraints, CacheConfig, LlmOrchestrator};
use axon_stream::StreamingCoordinator;
use axon_types::{
    Artifact, ChatMessage, ChunkStream, CompletionChunk, CompletionRequest, CompletionResponse,
    DataSourceClient, Event, LlmProvider, ProviderError, RetrievalError, SourceQuery,
    StaticRouter, TokenUsage, artifact::ArtifactContent,
};
use futures::stream;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Mock provider used both for orchestrated sub-tasks (`complete`)
/// and for the final user-visible stream (`stream_completion`).
struct MockProvider {
    name: &'static str,
    chunks: Vec<&'static str>,
    chunk_delay: Duration,
    complete_calls: AtomicUsize,
}

impl MockProvider {
    fn new(name: &'static str, chunks: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            name,
            chunks,
            chunk_delay: Duration::ZERO,
            complete_calls: AtomicUsize::new(0),
        })
    }

    fn slow(name: &'static str, chunks: Vec<&'static str>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            chunks,
            chunk_delay: delay,
            complete_calls: AtomicUsize::new(0),
        })
    }

    fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            model: request.model,
            text: format!("sub-task response from {}", self.name),
            usage: TokenUsage::new(120, 80),
        })
    }

    async fn stream_completion(
        &self,
        cancel: CancellationToken,
        request: CompletionRequest,
    ) -> Result<ChunkStream, ProviderError> {
        let model = request.model.clone();
        let delay = self.chunk_delay;
        let chunks: Vec<CompletionChunk> = self
            .chunks
            .iter()
            .map(|text| CompletionChunk::content("cmpl-e2e", 1_700_000_000, model.clone(), *text))
            .chain(std::iter::once(CompletionChunk::finish(
                "cmpl-e2e",
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

struct FixtureSource {
    name: &'static str,
    artifacts: Vec<Artifact>,
}

#[async_trait]
impl DataSourceClient for FixtureSource {
    fn source_name(&self) -> &str {
        self.name
    }

    async fn execute_query(
        &self,
        _cancel: CancellationToken,
        _query: SourceQuery,
    ) -> Result<Vec<Artifact>, RetrievalError> {
        Ok(self.artifacts.clone())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn fixture_artifact(id: &str, source: &str, title: &str) -> Artifact {
    Artifact {
        id: id.to_string(),
        source: source.to_string(),
        kind: "issue".to_string(),
        title: title.to_string(),
        content: ArtifactContent::inline(serde_json::json!({
            "title": title,
            "url": format!("https://{source}.example.com/{id}"),
        })),
        relevance: 0.85,
    }
}

fn fixture_sources() -> HashMap<String, Arc<dyn DataSourceClient>> {
    let mut map: HashMap<String, Arc<dyn DataSourceClient>> = HashMap::new();
    map.insert(
        "gitlab".into(),
        Arc::new(FixtureSource {
            name: "gitlab",
            artifacts: vec![
                fixture_artifact("101", "gitlab", "Critical crash in production ingest"),
                fixture_artifact("102", "gitlab", "Critical latency regression in production"),
            ],
        }),
    );
    map.insert(
        "youtrack".into(),
        Arc::new(FixtureSource {
            name: "youtrack",
            artifacts: vec![fixture_artifact(
                "YT-9",
                "youtrack",
                "Production outage follow-up critical",
            )],
        }),
    );
    map
}

struct Harness {
    coordinator: StreamingCoordinator,
    provider: Arc<MockProvider>,
    snapshots: mpsc::Receiver<AgentContext>,
}

fn harness(budget: BudgetConstraints) -> Harness {
    let provider = MockProvider::new("openai", vec!["All ", "good."]);
    harness_with_provider(budget, provider)
}

fn harness_with_provider(budget: BudgetConstraints, provider: Arc<MockProvider>) -> Harness {
    let mut orchestrator = LlmOrchestrator::new(budget, CacheConfig::default());
    orchestrator.register_provider(provider.clone(), true);
    let orchestrator = Arc::new(orchestrator);

    let router = Arc::new(StaticRouter::new().with_prefix("", provider.clone()));
    let (snapshot_tx, snapshots) = mpsc::channel(8);
    let coordinator = StreamingCoordinator::new(orchestrator, fixture_sources(), router)
        .with_snapshot_channel(snapshot_tx);
    Harness {
        coordinator,
        provider,
        snapshots,
    }
}

fn request(text: &str) -> CompletionRequest {
    CompletionRequest::new("gpt-4o", vec![ChatMessage::user(text)])
}

async fn run(
    harness: &mut Harness,
    text: &str,
    workflow: &str,
) -> (Vec<Event>, AgentContext) {
    let rx = harness
        .coordinator
        .process_request(request(text), workflow, CancellationToken::new())
        .unwrap();
    let events = collect(rx).await;
    let snapshot = harness.snapshots.recv().await.expect("final snapshot");
    (events, snapshot)
}

async fn collect(mut rx: mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn completion_text(events: &[Event]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Completion(chunk) => Some(chunk.content_text()),
            _ => None,
        })
        .collect()
}

/// Cross-cutting checks every sealed context must satisfy.
fn assert_invariants(ctx: &AgentContext) {
    // keys_written within permitted namespaces
    let validator = axon_agents::default_validator();
    for run in &ctx.audit.agent_runs {
        for key in &run.keys_written {
            let ns = Namespace::from_str(key).expect("known namespace");
            assert!(
                validator.may_write(&run.agent_id, ns),
                "{} wrote unpermitted namespace {key}",
                run.agent_id
            );
        }
    }

    // per-agent cost tallies sum to the total
    let sum: Decimal = ctx.llm.usage.by_agent.values().copied().sum();
    assert_eq!(sum, ctx.llm.usage.cost_usd);

    // audit timestamps never decrease
    for pair in ctx.audit.agent_runs.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }

    // every conclusion's evidence resolves
    let fact_ids: Vec<&str> = ctx.enrichment.facts.iter().map(|f| f.id.as_str()).collect();
    let hyp_ids: Vec<&str> = ctx
        .reasoning
        .hypotheses
        .iter()
        .map(|h| h.id.as_str())
        .collect();
    for conclusion in &ctx.reasoning.conclusions {
        for evidence in &conclusion.evidence {
            assert!(
                fact_ids.contains(&evidence.as_str()) || hyp_ids.contains(&evidence.as_str()),
                "unresolvable evidence {evidence}"
            );
        }
    }

    // dependency map is acyclic
    assert!(axon_agents::structure::is_acyclic(
        &ctx.reasoning.dependency_map
    ));
}

fn assert_done_last(events: &[Event]) {
    assert!(events.last().unwrap().is_done(), "done not last: {events:?}");
    assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
}

// ── S1: simple sequential ───────────────────────────────────────────

#[tokio::test]
async fn s1_simple_sequential_math_question() {
    let mut harness = harness(BudgetConstraints::default());
    let (events, ctx) = run(&mut harness, "What is 2+2?", "sequential_basic").await;

    // non-query intent, retrieval skipped
    assert_ne!(ctx.reasoning.intents[0].intent_type, "query");
    let planner = ctx
        .audit
        .agent_runs
        .iter()
        .find(|r| r.agent_id == "retrieval_planner")
        .unwrap();
    assert_eq!(planner.status, axon_context::RunStatus::Skipped);

    // one conclusion referencing zero facts (evidence is hypothesis ids)
    assert!(!ctx.reasoning.conclusions.is_empty());
    for conclusion in &ctx.reasoning.conclusions {
        for evidence in &conclusion.evidence {
            assert!(
                !ctx.enrichment.facts.iter().any(|f| &f.id == evidence),
                "evidence unexpectedly references a fact"
            );
        }
    }

    // no LLM calls, no cost
    assert_eq!(harness.provider.complete_calls(), 0);
    assert_eq!(ctx.llm.usage.cost_usd, Decimal::ZERO);

    assert!(!ctx.reasoning.summary.is_empty());
    assert_eq!(completion_text(&events), "All good.");
    assert_done_last(&events);
    assert_invariants(&ctx);
}

// ── S2: parallel retrieval ──────────────────────────────────────────

#[tokio::test]
async fn s2_parallel_retrieval_across_two_sources() {
    let mut harness = harness(BudgetConstraints::default());
    let (events, ctx) = run(
        &mut harness,
        "What critical production issues do we have in GitLab and YouTrack?",
        "parallel_retrieval",
    )
    .await;

    // confident query intent
    assert_eq!(ctx.reasoning.intents[0].intent_type, "query");
    assert!(ctx.reasoning.intents[0].confidence >= 0.9);

    // at least one query per source
    let sources: Vec<&str> = ctx
        .retrieval
        .queries
        .iter()
        .map(|q| q.query.source.as_str())
        .collect();
    assert!(sources.contains(&"gitlab"));
    assert!(sources.contains(&"youtrack"));
    assert!(ctx.retrieval.queries.len() >= 2);

    // artifacts from both sources
    for source in ["gitlab", "youtrack"] {
        assert!(
            ctx.retrieval.artifacts.iter().any(|a| a.source == source),
            "no artifact from {source}"
        );
    }

    // facts deduplicated by (source, id)
    let mut keys: Vec<(String, String)> =
        ctx.enrichment.facts.iter().map(|f| f.key()).collect();
    keys.sort();
    let before = keys.len();
    keys.dedup();
    assert_eq!(keys.len(), before);

    // validation passed, one summary
    assert!(ctx.diagnostics.validation_reports[0].passed);
    assert!(!ctx.reasoning.summary.is_empty());

    assert_done_last(&events);
    assert_invariants(&ctx);
}

// ── S3: conditional branch with clarification ───────────────────────

#[tokio::test]
async fn s3_conditional_clarification_skips_completion() {
    let mut harness = harness(BudgetConstraints::default());
    let (events, ctx) = run(&mut harness, "Show me something", "conditional_validation").await;

    // two leading intents within 0.05 produced a clarification warning
    assert!(
        ctx.diagnostics
            .warnings
            .iter()
            .any(|w| w.code == "clarification_questions")
    );

    // planner and validation were skipped by their conditions
    for agent in ["retrieval_planner", "validation"] {
        let run = ctx
            .audit
            .agent_runs
            .iter()
            .find(|r| r.agent_id == agent)
            .unwrap();
        assert_eq!(run.status, axon_context::RunStatus::Skipped, "{agent}");
    }

    // events: reasoning only, then done — no completion phase
    assert!(events.iter().any(|e| matches!(e, Event::Reasoning(_))));
    assert!(!events.iter().any(|e| matches!(e, Event::Completion(_))));
    assert_done_last(&events);
    assert_invariants(&ctx);
}

// ── S4: budget exhaustion ───────────────────────────────────────────

#[tokio::test]
async fn s4_budget_exhaustion_degrades_to_rules() {
    let budget = BudgetConstraints {
        session_budget_usd: Decimal::new(1, 5), // $0.00001
        critical_agents: vec![],
        ..BudgetConstraints::default()
    };
    let mut harness = harness(budget);
    // vague query naming sources: intent detection escalates (first LLM
    // call, consumes the budget), inference would escalate but is refused
    let (events, ctx) = run(
        &mut harness,
        "stuff breaking in gitlab and youtrack",
        "sequential_basic",
    )
    .await;

    // exactly one provider call: the second agent was refused up front
    assert_eq!(harness.provider.complete_calls(), 1);
    assert!(ctx.llm.usage.cost_usd > Decimal::ZERO);
    assert!(
        ctx.diagnostics
            .warnings
            .iter()
            .any(|w| w.code == "budget_exceeded"),
        "no budget warning: {:?}",
        ctx.diagnostics.warnings
    );

    // the pipeline completed and still produced a summary
    assert!(!ctx.reasoning.summary.is_empty());
    assert_done_last(&events);
    assert_invariants(&ctx);
}

// ── S5: cache hit ───────────────────────────────────────────────────

#[tokio::test]
async fn s5_identical_requests_hit_the_cache() {
    let mut harness = harness(BudgetConstraints::default());
    let message = "stuff breaking in gitlab and youtrack";

    let (events_first, ctx_first) = run(&mut harness, message, "sequential_basic").await;
    let calls_after_first = harness.provider.complete_calls();
    let (events_second, ctx_second) = run(&mut harness, message, "sequential_basic").await;

    // second run used the cache: no further provider calls, lower cost
    assert_eq!(harness.provider.complete_calls(), calls_after_first);
    assert!(ctx_second.llm.usage.cost_usd < ctx_first.llm.usage.cost_usd);
    assert!(
        ctx_second
            .llm
            .decisions
            .iter()
            .any(|d| d.reason.contains("cache")),
        "no cache decision: {:?}",
        ctx_second.llm.decisions
    );

    // the client-visible chunks are byte-identical across runs
    assert_eq!(completion_text(&events_first), completion_text(&events_second));
    assert_invariants(&ctx_second);
}

// ── S6: client cancellation ─────────────────────────────────────────

#[tokio::test]
async fn s6_client_cancellation_terminates_cleanly() {
    let provider = MockProvider::slow(
        "openai",
        vec!["a", "b", "c", "d", "e", "f"],
        Duration::from_millis(25),
    );
    let mut harness = harness_with_provider(BudgetConstraints::default(), provider);

    let cancel = CancellationToken::new();
    let mut rx = harness
        .coordinator
        .process_request(request("What is 2+2?"), "sequential_basic", cancel.clone())
        .unwrap();

    let mut events = Vec::new();
    let mut seen_completion = false;
    loop {
        let Ok(next) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await else {
            panic!("event channel stalled after cancellation");
        };
        let Some(event) = next else { break };
        if matches!(event, Event::Completion(_)) && !seen_completion {
            seen_completion = true;
            cancel.cancel();
        }
        events.push(event);
    }

    assert!(seen_completion);
    assert_done_last(&events);

    let ctx = harness.snapshots.recv().await.expect("final snapshot");
    assert!(
        ctx.diagnostics
            .warnings
            .iter()
            .any(|w| w.code == "client_canceled"),
        "no client_canceled warning"
    );
    assert!(ctx.sealed);
}
