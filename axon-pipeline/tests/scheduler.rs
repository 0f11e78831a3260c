//! Integration tests for the pipeline scheduler with stub agents.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axon_context::{
    AgentContext, ContextHandle, Namespace, RunStatus, Validator,
};
use axon_pipeline::{
    AgentError, AgentRegistry, AgentSpec, Condition, ExecutionMode, PipelineConfig,
    PipelineError, ReasoningAgent, ReasoningManager, compile,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// A stub agent that writes one reasoning field, with optional
/// scripted failures.
struct StubAgent {
    id: String,
    preconditions: Vec<String>,
    postconditions: Vec<String>,
    /// Fail this many invocations before succeeding.
    fail_first: usize,
    /// Sleep this long inside execute (to trigger timeouts).
    delay: Duration,
    /// Skip writing postcondition fields (to trigger rollback).
    write_nothing: bool,
    invocations: AtomicUsize,
}

impl StubAgent {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            preconditions: vec![],
            postconditions: vec![],
            fail_first: 0,
            delay: Duration::ZERO,
            write_nothing: false,
            invocations: AtomicUsize::new(0),
        }
    }

    fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningAgent for StubAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    fn preconditions(&self) -> Vec<String> {
        self.preconditions.clone()
    }

    fn postconditions(&self) -> Vec<String> {
        self.postconditions.clone()
    }

    async fn execute(
        &self,
        cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError> {
        let attempt = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => return Err(AgentError::Fatal("canceled".into())),
            }
        }
        if attempt <= self.fail_first {
            return Err(AgentError::Retryable(format!("scripted failure {attempt}")));
        }
        if self.write_nothing {
            return Ok(());
        }
        ctx.safe_set(
            &self.id,
            Namespace::Reasoning,
            "confidence_scores",
            json!({ self.id.clone(): 1.0 }),
        )
        .await?;
        Ok(())
    }
}

fn validator_for(ids: &[&str]) -> Validator {
    let mut v = Validator::new();
    for id in ids {
        v.register_agent(*id, ["reasoning", "diagnostics", "audit"]);
    }
    v.register_agent("orchestrator", ["*"]);
    v
}

fn harness(agents: Vec<Arc<StubAgent>>) -> (ReasoningManager, ContextHandle) {
    let ids: Vec<&str> = agents.iter().map(|a| a.id.as_str()).collect();
    let validator = validator_for(&ids);
    let mut registry = AgentRegistry::new();
    for agent in &agents {
        registry.register(Arc::clone(agent) as Arc<dyn ReasoningAgent>);
    }
    let manager = ReasoningManager::new(registry).with_retry_backoff(Duration::from_millis(1));
    let handle = ContextHandle::new(AgentContext::new("sess", "trace"), validator);
    (manager, handle)
}

#[tokio::test]
async fn sequential_pipeline_runs_in_level_order_and_audits() {
    let a = Arc::new(StubAgent::new("a"));
    let b = Arc::new(StubAgent::new("b"));
    let (manager, handle) = harness(vec![a.clone(), b.clone()]);

    let config = PipelineConfig::new(
        ExecutionMode::Sequential,
        vec![AgentSpec::new("a"), AgentSpec::new("b").after("a")],
    );
    let compiled = compile(&config, handle.validator()).unwrap();

    let report = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.status_of("a"), Some(RunStatus::Succeeded));
    assert_eq!(report.status_of("b"), Some(RunStatus::Succeeded));

    let ctx = handle.snapshot().await;
    assert_eq!(ctx.audit.agent_runs.len(), 2);
    assert_eq!(ctx.audit.agent_runs[0].agent_id, "a");
    assert_eq!(ctx.audit.agent_runs[1].agent_id, "b");
    // timestamps never decrease
    assert!(ctx.audit.agent_runs[0].timestamp <= ctx.audit.agent_runs[1].timestamp);
    // keys_written stay within permitted namespaces
    for run in &ctx.audit.agent_runs {
        for key in &run.keys_written {
            let ns: Namespace = key.parse().expect("known namespace");
            assert!(handle.validator().may_write(&run.agent_id, ns));
        }
    }
}

#[tokio::test]
async fn retries_restore_the_snapshot_and_eventually_succeed() {
    let mut flaky = StubAgent::new("flaky");
    flaky.fail_first = 2;
    let flaky = Arc::new(flaky);
    let (manager, handle) = harness(vec![flaky.clone()]);

    let config = PipelineConfig::new(
        ExecutionMode::Sequential,
        vec![AgentSpec::new("flaky").with_retry(2)],
    );
    let compiled = compile(&config, handle.validator()).unwrap();
    let report = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.status_of("flaky"), Some(RunStatus::Succeeded));
    assert_eq!(flaky.invocations(), 3);
    let ctx = handle.snapshot().await;
    assert_eq!(ctx.audit.agent_runs[0].attempts, 3);
}

#[tokio::test]
async fn failure_without_retries_degrades_gracefully() {
    let mut failing = StubAgent::new("failing");
    failing.fail_first = usize::MAX;
    let failing = Arc::new(failing);
    let downstream = Arc::new(StubAgent::new("downstream"));
    let (manager, handle) = harness(vec![failing, downstream.clone()]);

    let config = PipelineConfig::new(
        ExecutionMode::Sequential,
        vec![
            AgentSpec::new("failing"),
            AgentSpec::new("downstream").after("failing"),
        ],
    );
    let compiled = compile(&config, handle.validator()).unwrap();
    let report = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.status_of("failing"), Some(RunStatus::Failed));
    // the pipeline continued
    assert_eq!(report.status_of("downstream"), Some(RunStatus::Succeeded));

    let ctx = handle.snapshot().await;
    assert!(
        ctx.diagnostics
            .errors
            .iter()
            .any(|e| e.agent_id == "failing" && e.code == "agent_failed")
    );
}

#[tokio::test]
async fn critical_agent_failure_aborts_the_pipeline() {
    let mut failing = StubAgent::new("critical_one");
    failing.fail_first = usize::MAX;
    let failing = Arc::new(failing);
    let downstream = Arc::new(StubAgent::new("downstream"));
    let (manager, handle) = harness(vec![failing, downstream.clone()]);

    let mut config = PipelineConfig::new(
        ExecutionMode::Sequential,
        vec![
            AgentSpec::new("critical_one"),
            AgentSpec::new("downstream").after("critical_one"),
        ],
    );
    config.critical_agents = vec!["critical_one".to_string()];
    let compiled = compile(&config, handle.validator()).unwrap();

    let error = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(error, PipelineError::CriticalAgentFailed { .. }));
    assert_eq!(downstream.invocations(), 0);

    let ctx = handle.snapshot().await;
    assert!(
        ctx.diagnostics
            .errors
            .iter()
            .any(|e| e.code == "critical_agent_failed"
                && e.severity == axon_context::Severity::Critical)
    );
}

#[tokio::test]
async fn missing_precondition_skips_without_fail_on_violation() {
    let mut gated = StubAgent::new("gated");
    gated.preconditions = vec!["enrichment.facts".to_string()];
    let gated = Arc::new(gated);
    let (manager, handle) = harness(vec![gated.clone()]);

    let config = PipelineConfig::new(ExecutionMode::Sequential, vec![AgentSpec::new("gated")]);
    let compiled = compile(&config, handle.validator()).unwrap();
    let report = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.status_of("gated"), Some(RunStatus::Skipped));
    assert_eq!(gated.invocations(), 0);
}

#[tokio::test]
async fn missing_precondition_fails_with_fail_on_violation() {
    let mut gated = StubAgent::new("gated");
    gated.preconditions = vec!["enrichment.facts".to_string()];
    let gated = Arc::new(gated);
    let (manager, handle) = harness(vec![gated]);

    let mut config =
        PipelineConfig::new(ExecutionMode::Sequential, vec![AgentSpec::new("gated")]);
    config.options.fail_on_violation = true;
    let compiled = compile(&config, handle.validator()).unwrap();
    let report = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(
        report.status_of("gated"),
        Some(RunStatus::FailedPrecondition)
    );
    let ctx = handle.snapshot().await;
    assert!(
        ctx.diagnostics
            .errors
            .iter()
            .any(|e| e.code == "failed_precondition")
    );
}

#[tokio::test]
async fn unmet_postcondition_rolls_back_the_run()
{
    let mut hollow = StubAgent::new("hollow");
    hollow.postconditions = vec!["reasoning.summary".to_string()];
    let hollow = Arc::new(hollow);
    let (manager, handle) = harness(vec![hollow]);

    let config = PipelineConfig::new(ExecutionMode::Sequential, vec![AgentSpec::new("hollow")]);
    let compiled = compile(&config, handle.validator()).unwrap();
    let report = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(
        report.status_of("hollow"),
        Some(RunStatus::FailedPostcondition)
    );
    let ctx = handle.snapshot().await;
    // the confidence score it wrote was rolled back
    assert!(ctx.reasoning.confidence_scores.is_empty());
}

#[tokio::test]
async fn timeout_is_reported_and_not_retried_by_default() {
    let mut slow = StubAgent::new("slow");
    slow.delay = Duration::from_millis(500);
    let slow = Arc::new(slow);
    let (manager, handle) = harness(vec![slow.clone()]);

    let config = PipelineConfig::new(
        ExecutionMode::Sequential,
        vec![AgentSpec::new("slow").with_timeout_ms(20)],
    );
    let compiled = compile(&config, handle.validator()).unwrap();
    let report = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.status_of("slow"), Some(RunStatus::Timeout));
    assert_eq!(slow.invocations(), 1);
}

#[tokio::test]
async fn conditions_skip_agents_in_conditional_mode() {
    let planner = Arc::new(StubAgent::new("planner"));
    let (manager, handle) = harness(vec![planner.clone()]);

    let config = PipelineConfig::new(
        ExecutionMode::Conditional,
        vec![AgentSpec::new("planner").when(Condition::HasQueryIntent)],
    );
    let compiled = compile(&config, handle.validator()).unwrap();
    let report = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap();

    // no query intent in a fresh context
    assert_eq!(report.status_of("planner"), Some(RunStatus::Skipped));
    assert_eq!(planner.invocations(), 0);
}

#[tokio::test]
async fn parallel_level_runs_concurrently_and_audits_in_id_order() {
    // Two agents with a shared delay: concurrent execution finishes in
    // roughly one delay, and audit order is deterministic by id.
    let mut x = StubAgent::new("x");
    x.delay = Duration::from_millis(40);
    let mut w = StubAgent::new("w");
    w.delay = Duration::from_millis(40);
    let x = Arc::new(x);
    let w = Arc::new(w);

    let mut validator = Validator::new();
    validator.register_agent("x", ["reasoning", "diagnostics", "audit"]);
    validator.register_agent("w", ["enrichment", "diagnostics", "audit"]);
    let mut registry = AgentRegistry::new();
    registry.register(Arc::clone(&x) as Arc<dyn ReasoningAgent>);
    registry.register(Arc::clone(&w) as Arc<dyn ReasoningAgent>);
    let manager = ReasoningManager::new(registry);
    let handle = ContextHandle::new(AgentContext::new("sess", "trace"), validator);

    let config = PipelineConfig::new(
        ExecutionMode::Parallel,
        vec![AgentSpec::new("x"), AgentSpec::new("w")],
    );
    let compiled = compile(&config, handle.validator()).unwrap();

    let started = std::time::Instant::now();
    let report = manager
        .run("test", &compiled, &handle, CancellationToken::new(), None)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // "w" may not write reasoning, so its safe_set fails
    assert_eq!(report.status_of("x"), Some(RunStatus::Succeeded));
    assert_eq!(report.status_of("w"), Some(RunStatus::Failed));
    assert!(elapsed < Duration::from_millis(200), "level did not fan out");

    let ctx = handle.snapshot().await;
    let ids: Vec<&str> = ctx
        .audit
        .agent_runs
        .iter()
        .map(|r| r.agent_id.as_str())
        .collect();
    assert_eq!(ids, vec!["w", "x"]);
}

#[tokio::test]
async fn cancellation_stops_scheduling_new_levels() {
    let mut slow = StubAgent::new("slow");
    slow.delay = Duration::from_millis(100);
    let slow = Arc::new(slow);
    let never = Arc::new(StubAgent::new("never"));
    let (manager, handle) = harness(vec![slow, never.clone()]);

    let config = PipelineConfig::new(
        ExecutionMode::Sequential,
        vec![
            AgentSpec::new("slow"),
            AgentSpec::new("never").after("slow"),
        ],
    );
    let compiled = compile(&config, handle.validator()).unwrap();

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let report = manager
        .run("test", &compiled, &handle, cancel, None)
        .await
        .unwrap();
    assert!(report.canceled);
    assert_eq!(never.invocations(), 0);
}
