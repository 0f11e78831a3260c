//! Integration tests: validator, diff tracker, size checker, and
//! externalization working against one shared context.

use std::sync::Arc;

use axon_context::{
    AgentContext, ArtifactStore, ContextHandle, DiffTracker, Intent, IntentOrigin,
    MemoryArtifactStore, Namespace, SizeChecker, SizeLimits, Validator, externalize_artifacts,
};
use axon_types::{Artifact, artifact::ArtifactContent};
use serde_json::json;

fn default_validator() -> Validator {
    let mut v = Validator::new();
    v.register_agent("intent_detection", ["reasoning", "diagnostics", "audit"]);
    v.register_agent(
        "retrieval_executor",
        ["retrieval", "diagnostics", "audit"],
    );
    v.register_agent("orchestrator", ["*"]);
    v
}

#[tokio::test]
async fn agent_writes_flow_into_audit_diffs() {
    let handle = ContextHandle::new(AgentContext::new("sess-1", "trace-1"), default_validator());
    let mut tracker = DiffTracker::new(handle.snapshot().await);

    handle
        .safe_set(
            "intent_detection",
            Namespace::Reasoning,
            "intents",
            json!([{"type": "query", "confidence": 0.92, "origin": "rules"}]),
        )
        .await
        .unwrap();

    let current = handle.snapshot().await;
    let diff = tracker.capture("intent_detection", &current);
    assert_eq!(diff.counts.get("intents_added"), Some(&1));

    // the scheduler owns audit; record the diff there
    handle
        .privileged_mut(|ctx| ctx.audit.diffs.push(diff))
        .await;
    assert_eq!(handle.snapshot().await.audit.diffs.len(), 1);
}

#[tokio::test]
async fn denied_write_changes_nothing_and_reports_namespace() {
    let handle = ContextHandle::new(AgentContext::new("sess-1", "trace-1"), default_validator());
    let before = handle.snapshot().await.serialize().unwrap();

    let err = handle
        .safe_set(
            "intent_detection",
            Namespace::Enrichment,
            "facts",
            json!([]),
        )
        .await
        .unwrap_err();

    assert_eq!(err.namespace, Namespace::Enrichment);
    assert_eq!(err.agent_id, "intent_detection");
    assert_eq!(handle.snapshot().await.serialize().unwrap(), before);
}

#[tokio::test]
async fn clone_isolation_holds_for_every_namespace() {
    let mut original = AgentContext::new("sess-1", "trace-1");
    original.reasoning.intents.push(Intent {
        intent_type: "query".into(),
        confidence: 0.9,
        origin: IntentOrigin::Rules,
    });

    let clone = original.clone();
    original.reasoning.intents.clear();
    original.metadata.locale = "xx-XX".into();
    original.llm.provider = Some("other".into());

    assert_eq!(clone.reasoning.intents.len(), 1);
    assert_eq!(clone.metadata.locale, "en-US");
    assert_eq!(clone.llm.provider, None);
}

#[tokio::test]
async fn size_check_then_externalize_then_check_passes() {
    let limits = SizeLimits {
        max_namespace_bytes: 2048,
        max_inline_artifact_bytes: 512,
        ..SizeLimits::default()
    };
    let checker = SizeChecker::new(limits);
    let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());

    let mut ctx = AgentContext::new("sess-1", "trace-1");
    ctx.retrieval.artifacts.push(Artifact {
        id: "a-1".into(),
        source: "gitlab".into(),
        kind: "issue".into(),
        title: "big".into(),
        content: ArtifactContent::inline(json!({"blob": "x".repeat(3000)})),
        relevance: 0.8,
    });

    assert!(checker.check(&ctx).is_err());

    let moved = externalize_artifacts(&mut ctx, &store, &limits).await.unwrap();
    assert_eq!(moved, 1);
    assert!(checker.check(&ctx).is_ok());

    // content is recoverable from the store through the reference
    let ArtifactContent::External { reference, .. } = &ctx.retrieval.artifacts[0].content else {
        panic!("artifact was not externalized");
    };
    let bytes = store.get(&reference.id, &reference.checksum).await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(payload["blob"].as_str().unwrap().len(), 3000);
}

#[tokio::test]
async fn sealed_snapshot_round_trips() {
    let handle = ContextHandle::new(AgentContext::new("sess-1", "trace-1"), default_validator());
    handle
        .safe_set(
            "intent_detection",
            Namespace::Reasoning,
            "summary",
            json!("the summary"),
        )
        .await
        .unwrap();
    handle.seal().await;

    let snapshot = handle.snapshot().await;
    let bytes = snapshot.serialize().unwrap();
    let restored = AgentContext::deserialize(&bytes).unwrap();
    assert!(restored.sealed);
    assert_eq!(restored.reasoning.summary, "the summary");
}
