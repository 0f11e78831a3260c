//! Inference: deterministic rules first, LLM only when warranted.

use crate::support::{estimate_tokens, ids, record_llm_outcome};
use axon_context::{
    Alternative, Conclusion, ContextHandle, Fact, Hypothesis, InferenceStep, Namespace,
};
use axon_llm::{LlmError, LlmOrchestrator, LlmTask, TaskType};
use axon_pipeline::{AgentError, ReasoningAgent};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Rule confidence below which the agent consults the LLM.
const LLM_THRESHOLD: f64 = 0.8;

/// Draws one conclusion per hypothesis. Rules compute confidence from
/// supporting facts; the `inference` LLM task runs only when rule
/// confidence is low or the evidence spans multiple sources, and a
/// budget refusal falls back to the rule result with a warning.
pub struct InferenceAgent {
    orchestrator: Arc<LlmOrchestrator>,
}

impl InferenceAgent {
    /// An inference agent using `orchestrator` for escalations.
    pub fn new(orchestrator: Arc<LlmOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Facts supporting a hypothesis: facts from a source the hypothesis
/// names, or every fact for a general hypothesis.
fn supporting_facts<'a>(hypothesis: &Hypothesis, facts: &'a [Fact]) -> Vec<&'a Fact> {
    let named: Vec<&Fact> = facts
        .iter()
        .filter(|f| hypothesis.statement.contains(f.source.as_str()))
        .collect();
    if named.is_empty() {
        facts.iter().collect()
    } else {
        named
    }
}

#[async_trait]
impl ReasoningAgent for InferenceAgent {
    fn agent_id(&self) -> &str {
        ids::INFERENCE
    }

    fn preconditions(&self) -> Vec<String> {
        // enrichment.facts is read when present; inference still draws
        // direct-answer conclusions on an evidence-free run
        vec!["reasoning.hypotheses".into()]
    }

    fn postconditions(&self) -> Vec<String> {
        vec![
            "reasoning.conclusions".into(),
            "reasoning.inference_chain".into(),
        ]
    }

    async fn execute(
        &self,
        cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError> {
        let (hypotheses, facts) = ctx
            .with(|c| (c.reasoning.hypotheses.clone(), c.enrichment.facts.clone()))
            .await;

        let mut conclusions: Vec<Conclusion> = Vec::new();
        let mut chain: Vec<InferenceStep> = Vec::new();
        let mut alternatives: Vec<Alternative> = Vec::new();
        let mut confidence_scores: BTreeMap<String, f64> = BTreeMap::new();
        let mut best_by_intent: BTreeMap<String, usize> = BTreeMap::new();

        for (index, hypothesis) in hypotheses.iter().enumerate() {
            let support = supporting_facts(hypothesis, &facts);
            let conclusion_id = format!("con-{}", index + 1);

            let (mut statement, evidence, mut confidence) = if support.is_empty() {
                (
                    format!("{} (no external evidence needed)", hypothesis.statement),
                    vec![hypothesis.id.clone()],
                    hypothesis.confidence,
                )
            } else {
                let mean: f64 = support.iter().map(|f| f.confidence).sum::<f64>()
                    / support.len() as f64;
                let sources: HashSet<&str> =
                    support.iter().map(|f| f.source.as_str()).collect();
                (
                    format!(
                        "{} — supported by {} record(s) from {} source(s)",
                        hypothesis.statement,
                        support.len(),
                        sources.len()
                    ),
                    support.iter().map(|f| f.id.clone()).collect(),
                    mean * hypothesis.confidence.max(0.5),
                )
            };
            let mut method = "rules".to_string();

            let multi_source = {
                let sources: HashSet<&str> = support.iter().map(|f| f.source.as_str()).collect();
                sources.len() > 1
            };
            let escalate =
                !support.is_empty() && (confidence < LLM_THRESHOLD || multi_source);

            if escalate && !cancel.is_cancelled() {
                let prompt = format!(
                    "Hypothesis: {}\nEvidence:\n{}\nState a one-sentence conclusion.",
                    hypothesis.statement,
                    support
                        .iter()
                        .map(|f| format!("- [{}] {}", f.source, f.statement))
                        .collect::<Vec<_>>()
                        .join("\n")
                );
                let task = LlmTask {
                    agent_id: self.agent_id().to_string(),
                    task_type: TaskType::Inference,
                    context_size: estimate_tokens(&prompt),
                    prompt,
                    max_tokens: Some(256),
                    temperature: 0.0,
                    use_cache: true,
                };
                match self.orchestrator.execute(task).await {
                    Ok(outcome) => {
                        record_llm_outcome(ctx, self.agent_id(), &outcome).await?;
                        let text = outcome.text.trim();
                        if !text.is_empty() {
                            alternatives.push(Alternative {
                                conclusion_id: conclusion_id.clone(),
                                statement: statement.clone(),
                                confidence,
                            });
                            statement = text.to_string();
                            confidence = confidence.max(0.85);
                            method = "llm".to_string();
                        }
                    }
                    Err(LlmError::BudgetExceeded { .. }) => {
                        ctx.push_warning(
                            self.agent_id(),
                            "budget_exceeded",
                            "inference escalation skipped, keeping rule-based conclusion",
                        )
                        .await?;
                    }
                    Err(error) => {
                        ctx.push_warning(
                            self.agent_id(),
                            "llm_escalation_failed",
                            error.to_string(),
                        )
                        .await?;
                    }
                }
            }

            debug!(conclusion = %conclusion_id, method = %method, confidence, "conclusion drawn");
            confidence_scores.insert(conclusion_id.clone(), confidence);
            chain.push(InferenceStep {
                conclusion_id: conclusion_id.clone(),
                basis: evidence.clone(),
                method,
            });

            // keep one conclusion per intent class; weaker ones become
            // alternatives
            match best_by_intent.get(&hypothesis.intent_type).copied() {
                Some(best_index) if conclusions[best_index].confidence >= confidence => {
                    alternatives.push(Alternative {
                        conclusion_id: conclusions[best_index].id.clone(),
                        statement,
                        confidence,
                    });
                }
                Some(best_index) => {
                    let replaced = std::mem::replace(
                        &mut conclusions[best_index],
                        Conclusion {
                            id: conclusion_id,
                            hypothesis_id: hypothesis.id.clone(),
                            statement,
                            confidence,
                            evidence,
                        },
                    );
                    alternatives.push(Alternative {
                        conclusion_id: conclusions[best_index].id.clone(),
                        statement: replaced.statement,
                        confidence: replaced.confidence,
                    });
                }
                None => {
                    best_by_intent.insert(hypothesis.intent_type.clone(), conclusions.len());
                    conclusions.push(Conclusion {
                        id: conclusion_id,
                        hypothesis_id: hypothesis.id.clone(),
                        statement,
                        confidence,
                        evidence,
                    });
                }
            }
        }

        ctx.safe_set(
            self.agent_id(),
            Namespace::Reasoning,
            "conclusions",
            serde_json::to_value(&conclusions).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        ctx.safe_set(
            self.agent_id(),
            Namespace::Reasoning,
            "inference_chain",
            serde_json::to_value(&chain).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        if !alternatives.is_empty() {
            ctx.safe_set(
                self.agent_id(),
                Namespace::Reasoning,
                "alternatives",
                serde_json::to_value(&alternatives)
                    .map_err(|e| AgentError::Fatal(e.to_string()))?,
            )
            .await?;
        }
        ctx.safe_set(
            self.agent_id(),
            Namespace::Reasoning,
            "confidence_scores",
            json!(confidence_scores),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn hypothesis(id: &str, statement: &str) -> Hypothesis {
        Hypothesis {
            id: id.into(),
            intent_type: "query".into(),
            statement: statement.into(),
            confidence: 0.9,
        }
    }

    fn fact(id: &str, source: &str) -> Fact {
        Fact {
            id: id.into(),
            source: source.into(),
            timestamp: Utc::now(),
            confidence: 0.8,
            statement: format!("record {id}"),
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn source_named_hypotheses_get_their_sources_facts() {
        let hyp = hypothesis("h1", "relevant records exist in gitlab");
        let facts = vec![fact("1", "gitlab"), fact("2", "youtrack")];
        let support = supporting_facts(&hyp, &facts);
        assert_eq!(support.len(), 1);
        assert_eq!(support[0].source, "gitlab");
    }

    #[test]
    fn general_hypotheses_see_all_facts() {
        let hyp = hypothesis("h1", "the user needs current information");
        let facts = vec![fact("1", "gitlab"), fact("2", "youtrack")];
        assert_eq!(supporting_facts(&hyp, &facts).len(), 2);
    }
}
