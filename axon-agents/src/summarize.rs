//! Summarization: the human-facing wrap-up of a pipeline run.

use crate::support::ids;
use axon_context::{AgentContext, ContextHandle, Namespace};
use axon_pipeline::{AgentError, ReasoningAgent};
use async_trait::async_trait;
use serde_json::json;
use std::fmt::Write;
use tokio_util::sync::CancellationToken;

/// Composes a structured summary from the drawn conclusions plus a
/// machine-usable artifact list for downstream consumers.
pub struct SummarizationAgent;

impl SummarizationAgent {
    /// Create the agent.
    pub fn new() -> Self {
        Self
    }
}

impl Default for SummarizationAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the summary text from a snapshot.
pub fn compose_summary(ctx: &AgentContext) -> String {
    let mut out = String::new();

    if let Some(top) = ctx.reasoning.intents.first() {
        let _ = writeln!(
            out,
            "Intent: {} (confidence {:.2})",
            top.intent_type, top.confidence
        );
    }

    if !ctx.reasoning.conclusions.is_empty() {
        let _ = writeln!(out, "Conclusions:");
        for conclusion in &ctx.reasoning.conclusions {
            let _ = writeln!(
                out,
                "- {} (confidence {:.2}, {} evidence item(s))",
                conclusion.statement,
                conclusion.confidence,
                conclusion.evidence.len()
            );
        }
    }

    if !ctx.enrichment.facts.is_empty() {
        let _ = writeln!(
            out,
            "Grounded in {} fact(s) from {} source(s).",
            ctx.enrichment.facts.len(),
            ctx.enrichment
                .facts
                .iter()
                .map(|f| f.source.as_str())
                .collect::<std::collections::HashSet<_>>()
                .len()
        );
    }

    if !ctx.retrieval.artifacts.is_empty() {
        let ids: Vec<String> = ctx
            .retrieval
            .artifacts
            .iter()
            .map(|a| format!("{}:{}", a.source, a.id))
            .collect();
        let _ = writeln!(out, "Artifacts: {}", ids.join(", "));
    }

    let clarifications: Vec<&str> = ctx
        .diagnostics
        .warnings
        .iter()
        .filter(|w| w.code == "clarification_questions")
        .map(|w| w.message.as_str())
        .collect();
    for clarification in clarifications {
        let _ = writeln!(out, "Clarification needed: {clarification}");
    }

    if out.is_empty() {
        out.push_str("No conclusions were drawn for this request.");
    }
    out.trim_end().to_string()
}

#[async_trait]
impl ReasoningAgent for SummarizationAgent {
    fn agent_id(&self) -> &str {
        ids::SUMMARIZATION
    }

    fn preconditions(&self) -> Vec<String> {
        vec!["reasoning.conclusions".into()]
    }

    fn postconditions(&self) -> Vec<String> {
        vec!["reasoning.summary".into()]
    }

    async fn execute(
        &self,
        _cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError> {
        let snapshot = ctx.snapshot().await;
        let summary = compose_summary(&snapshot);
        ctx.safe_set(self.agent_id(), Namespace::Reasoning, "summary", json!(summary))
            .await?;
        Ok(())
    }
}
