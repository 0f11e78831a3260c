//! Validation: structural checks over the reasoning state.

use crate::structure::is_acyclic;
use crate::support::ids;
use axon_context::{AgentContext, ContextHandle, Namespace, ValidationCheck, ValidationReport};
use axon_pipeline::{AgentError, ReasoningAgent};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Checks slot completeness per intent, cycle-freeness of the
/// dependency map, and that every conclusion's evidence resolves to a
/// known fact or hypothesis. Failed checks come with `auto_fixes`
/// hints for the host.
pub struct ValidationAgent;

impl ValidationAgent {
    /// Create the agent.
    pub fn new() -> Self {
        Self
    }
}

impl Default for ValidationAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Run all checks against a snapshot.
pub fn validate(ctx: &AgentContext) -> ValidationReport {
    let mut checks = Vec::new();
    let mut auto_fixes = Vec::new();

    // slot completeness: each intent class implies filled slots
    let mut slot_failures = Vec::new();
    for intent in &ctx.reasoning.intents {
        match intent.intent_type.as_str() {
            "query" => {
                if ctx.retrieval.queries.is_empty() {
                    slot_failures.push("query intent without retrieval queries");
                }
            }
            _ => {
                if ctx.reasoning.conclusions.is_empty() {
                    slot_failures.push("intent without a conclusion");
                }
            }
        }
    }
    if !slot_failures.is_empty() {
        auto_fixes.push("re-run retrieval_planner and inference for the unfilled slots".into());
    }
    checks.push(ValidationCheck {
        name: "slot_completeness".into(),
        passed: slot_failures.is_empty(),
        detail: slot_failures.join("; ").to_string(),
    });

    // dependency map references and acyclicity
    let hypothesis_ids: HashSet<&str> = ctx
        .reasoning
        .hypotheses
        .iter()
        .map(|h| h.id.as_str())
        .collect();
    let mut unknown_refs: Vec<String> = Vec::new();
    for (id, deps) in &ctx.reasoning.dependency_map {
        if !hypothesis_ids.contains(id.as_str()) {
            unknown_refs.push(id.clone());
        }
        for dep in deps {
            if !hypothesis_ids.contains(dep.as_str()) {
                unknown_refs.push(dep.clone());
            }
        }
    }
    let acyclic = is_acyclic(&ctx.reasoning.dependency_map);
    if !acyclic {
        auto_fixes.push("drop the back-edge closing the hypothesis cycle".into());
    }
    if !unknown_refs.is_empty() {
        auto_fixes.push("remove dependency entries for unknown hypothesis ids".into());
    }
    checks.push(ValidationCheck {
        name: "dependency_acyclic".into(),
        passed: acyclic && unknown_refs.is_empty(),
        detail: if unknown_refs.is_empty() {
            String::new()
        } else {
            format!("unknown hypothesis ids: {}", unknown_refs.join(", "))
        },
    });

    // evidence resolution
    let fact_ids: HashSet<&str> = ctx.enrichment.facts.iter().map(|f| f.id.as_str()).collect();
    let mut unresolved: Vec<String> = Vec::new();
    for conclusion in &ctx.reasoning.conclusions {
        for evidence in &conclusion.evidence {
            if !fact_ids.contains(evidence.as_str())
                && !hypothesis_ids.contains(evidence.as_str())
            {
                unresolved.push(format!("{} -> {evidence}", conclusion.id));
            }
        }
    }
    if !unresolved.is_empty() {
        auto_fixes.push("drop evidence entries that resolve to nothing".into());
    }
    checks.push(ValidationCheck {
        name: "evidence_resolvable".into(),
        passed: unresolved.is_empty(),
        detail: unresolved.join("; ").to_string(),
    });

    ValidationReport {
        timestamp: Utc::now(),
        passed: checks.iter().all(|c| c.passed),
        checks,
        auto_fixes,
    }
}

#[async_trait]
impl ReasoningAgent for ValidationAgent {
    fn agent_id(&self) -> &str {
        ids::VALIDATION
    }

    fn postconditions(&self) -> Vec<String> {
        vec!["diagnostics.validation_reports".into()]
    }

    async fn execute(
        &self,
        _cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError> {
        let snapshot = ctx.snapshot().await;
        let report = validate(&snapshot);

        let mut reports = snapshot.diagnostics.validation_reports;
        reports.push(report);
        ctx.safe_set(
            self.agent_id(),
            Namespace::Diagnostics,
            "validation_reports",
            serde_json::to_value(&reports).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        Ok(())
    }
}
