//! Retrieval planning: which sources to ask, with what query.

use crate::support::ids;
use axon_context::{ContextHandle, Namespace, QueryRecord, RetrievalPlan};
use axon_pipeline::{AgentError, ReasoningAgent};
use axon_types::SourceQuery;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Cap on sources per plan.
const MAX_SOURCES_PER_PLAN: usize = 3;
/// Cap on total queries per run.
const MAX_QUERIES: usize = 10;
/// Volume cap per query.
const MAX_RESULTS: usize = 20;

/// Plans retrieval for hypotheses that need external data: picks
/// sources, derives filters from qualifiers, assigns priorities, and
/// normalizes one query per `(hypothesis, source)` under time and
/// volume caps.
pub struct RetrievalPlannerAgent {
    default_sources: Vec<String>,
}

impl RetrievalPlannerAgent {
    /// A planner falling back to `default_sources` when the message
    /// names none.
    pub fn new(default_sources: Vec<String>) -> Self {
        Self { default_sources }
    }
}

/// Normalize a query string for one source's dialect. Sources with
/// structured search get key:value terms; everything else gets plain
/// keywords.
pub fn normalize_query(source: &str, keywords: &[String], qualifiers: &[String]) -> String {
    match source {
        "gitlab" | "github" => {
            let mut parts: Vec<String> = qualifiers
                .iter()
                .map(|q| format!("label:{q}"))
                .collect();
            parts.push("state:opened".to_string());
            parts.extend(keywords.iter().cloned());
            parts.join(" ")
        }
        "youtrack" | "jira" => {
            let mut parts: Vec<String> = Vec::new();
            if !qualifiers.is_empty() {
                parts.push(format!("priority: {}", qualifiers.join(", ")));
            }
            parts.push("state: open".to_string());
            parts.extend(keywords.iter().cloned());
            parts.join(" ")
        }
        _ => {
            let mut parts = keywords.to_vec();
            parts.extend(qualifiers.iter().cloned());
            parts.join(" ")
        }
    }
}

#[async_trait]
impl ReasoningAgent for RetrievalPlannerAgent {
    fn agent_id(&self) -> &str {
        ids::RETRIEVAL_PLANNER
    }

    fn preconditions(&self) -> Vec<String> {
        vec!["reasoning.intents".into(), "reasoning.hypotheses".into()]
    }

    fn postconditions(&self) -> Vec<String> {
        vec!["retrieval.plans".into(), "retrieval.queries".into()]
    }

    async fn execute(
        &self,
        _cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError> {
        let (intents, hypotheses, entities) = ctx
            .with(|c| {
                (
                    c.reasoning.intents.clone(),
                    c.reasoning.hypotheses.clone(),
                    c.reasoning.entities.clone(),
                )
            })
            .await;

        let query_intent = intents.iter().any(|i| i.intent_type == "query");
        if !query_intent {
            ctx.push_warning(
                self.agent_id(),
                "no_retrieval_needed",
                "no query intent detected, nothing to plan",
            )
            .await?;
            return Ok(());
        }

        let mut sources = entities.get("sources").cloned().unwrap_or_default();
        if sources.is_empty() {
            sources = self.default_sources.clone();
        }
        sources.truncate(MAX_SOURCES_PER_PLAN);
        if sources.is_empty() {
            ctx.push_warning(
                self.agent_id(),
                "no_sources_available",
                "query intent but no sources named or configured",
            )
            .await?;
            return Ok(());
        }

        let qualifiers = entities.get("qualifiers").cloned().unwrap_or_default();
        let keywords = entities.get("keywords").cloned().unwrap_or_default();
        let priority = if qualifiers.iter().any(|q| q == "critical" || q == "urgent") {
            1
        } else {
            2
        };
        let mut filters = BTreeMap::new();
        for qualifier in &qualifiers {
            match qualifier.as_str() {
                "critical" | "urgent" | "severe" | "major" => {
                    filters.insert("severity".to_string(), qualifier.clone());
                }
                "production" => {
                    filters.insert("environment".to_string(), qualifier.clone());
                }
                _ => {}
            }
        }

        let mut plans: Vec<RetrievalPlan> = Vec::new();
        let mut queries: Vec<QueryRecord> = Vec::new();

        // one plan per query hypothesis that names a source, else one
        // plan for the root query hypothesis over all sources
        let source_hyps: Vec<_> = hypotheses
            .iter()
            .filter(|h| h.intent_type == "query")
            .filter(|h| sources.iter().any(|s| h.statement.contains(s.as_str())))
            .collect();

        let planned: Vec<(String, Vec<String>)> = if source_hyps.is_empty() {
            let root = hypotheses
                .iter()
                .find(|h| h.intent_type == "query")
                .map(|h| h.id.clone())
                .unwrap_or_else(|| "hyp-0".to_string());
            vec![(root, sources.clone())]
        } else {
            source_hyps
                .iter()
                .map(|h| {
                    let matched: Vec<String> = sources
                        .iter()
                        .filter(|s| h.statement.contains(s.as_str()))
                        .cloned()
                        .collect();
                    (h.id.clone(), matched)
                })
                .collect()
        };

        for (index, (hypothesis_id, plan_sources)) in planned.into_iter().enumerate() {
            let plan_id = format!("plan-{}", index + 1);
            for source in &plan_sources {
                if queries.len() >= MAX_QUERIES {
                    ctx.push_warning(
                        self.agent_id(),
                        "query_cap_reached",
                        format!("query volume capped at {MAX_QUERIES}"),
                    )
                    .await?;
                    break;
                }
                let query = SourceQuery {
                    id: format!("q-{}", queries.len() + 1),
                    source: source.clone(),
                    query: normalize_query(source, &keywords, &qualifiers),
                    filters: filters.clone(),
                    limit: MAX_RESULTS,
                };
                queries.push(QueryRecord {
                    query,
                    executed: false,
                    artifact_ids: vec![],
                    error: None,
                });
            }
            plans.push(RetrievalPlan {
                id: plan_id,
                hypothesis_id,
                sources: plan_sources,
                filters: filters.clone(),
                priority,
                max_results: MAX_RESULTS,
            });
        }

        ctx.safe_set(
            self.agent_id(),
            Namespace::Retrieval,
            "plans",
            serde_json::to_value(&plans).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        ctx.safe_set(
            self.agent_id(),
            Namespace::Retrieval,
            "queries",
            serde_json::to_value(&queries).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_query_speaks_each_dialect() {
        let keywords = vec!["issues".to_string()];
        let qualifiers = vec!["critical".to_string()];
        let gitlab = normalize_query("gitlab", &keywords, &qualifiers);
        assert!(gitlab.contains("label:critical"));
        assert!(gitlab.contains("state:opened"));

        let youtrack = normalize_query("youtrack", &keywords, &qualifiers);
        assert!(youtrack.contains("priority: critical"));

        let plain = normalize_query("wiki", &keywords, &qualifiers);
        assert_eq!(plain, "issues critical");
    }
}
