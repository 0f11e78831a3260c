//! Reasoning structure: hypotheses and their dependency graph.

use crate::support::ids;
use axon_context::{ContextHandle, Hypothesis, Namespace};
use axon_pipeline::{AgentError, ReasoningAgent};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Derives hypotheses per detected intent and links them in an
/// explicit dependency DAG keyed by hypothesis id.
pub struct ReasoningStructureAgent;

impl ReasoningStructureAgent {
    /// Create the agent.
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReasoningStructureAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Verify the dependency map has no cycles (Kahn's algorithm).
pub fn is_acyclic(map: &BTreeMap<String, Vec<String>>) -> bool {
    let mut indegree: BTreeMap<&str, usize> = map.keys().map(|k| (k.as_str(), 0)).collect();
    for deps in map.values() {
        for dep in deps {
            if let Some(d) = indegree.get_mut(dep.as_str()) {
                *d += 1;
            }
        }
    }
    let mut ready: Vec<&str> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(k, _)| *k)
        .collect();
    let mut removed = 0usize;
    while let Some(node) = ready.pop() {
        removed += 1;
        if let Some(deps) = map.get(node) {
            for dep in deps {
                if let Some(d) = indegree.get_mut(dep.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(dep.as_str());
                    }
                }
            }
        }
    }
    removed == map.len()
}

#[async_trait]
impl ReasoningAgent for ReasoningStructureAgent {
    fn agent_id(&self) -> &str {
        ids::REASONING_STRUCTURE
    }

    fn preconditions(&self) -> Vec<String> {
        vec!["reasoning.intents".into()]
    }

    fn postconditions(&self) -> Vec<String> {
        vec!["reasoning.hypotheses".into(), "reasoning.dependency_map".into()]
    }

    async fn execute(
        &self,
        _cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError> {
        let (intents, entities) = ctx
            .with(|c| (c.reasoning.intents.clone(), c.reasoning.entities.clone()))
            .await;

        let mut hypotheses: Vec<Hypothesis> = Vec::new();
        let mut dependency_map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut counter = 0usize;
        let mut next_id = || {
            counter += 1;
            format!("hyp-{counter}")
        };

        for intent in intents.iter().filter(|i| i.confidence >= 0.5) {
            match intent.intent_type.as_str() {
                "query" => {
                    let root = next_id();
                    hypotheses.push(Hypothesis {
                        id: root.clone(),
                        intent_type: intent.intent_type.clone(),
                        statement: "the user needs current information from external systems"
                            .to_string(),
                        confidence: intent.confidence * 0.9,
                    });
                    dependency_map.insert(root.clone(), vec![]);

                    let sources = entities.get("sources").cloned().unwrap_or_default();
                    for source in sources {
                        let id = next_id();
                        hypotheses.push(Hypothesis {
                            id: id.clone(),
                            intent_type: intent.intent_type.clone(),
                            statement: format!("relevant records exist in {source}"),
                            confidence: intent.confidence * 0.85,
                        });
                        dependency_map.insert(id, vec![root.clone()]);
                    }
                }
                "question" => {
                    let id = next_id();
                    hypotheses.push(Hypothesis {
                        id: id.clone(),
                        intent_type: intent.intent_type.clone(),
                        statement: "the question can be answered directly without retrieval"
                            .to_string(),
                        confidence: intent.confidence * 0.9,
                    });
                    dependency_map.insert(id, vec![]);
                }
                "command" => {
                    let id = next_id();
                    hypotheses.push(Hypothesis {
                        id: id.clone(),
                        intent_type: intent.intent_type.clone(),
                        statement: "the request is an information command; interpret and answer"
                            .to_string(),
                        confidence: intent.confidence * 0.9,
                    });
                    dependency_map.insert(id, vec![]);
                }
                _ => {
                    let id = next_id();
                    hypotheses.push(Hypothesis {
                        id: id.clone(),
                        intent_type: intent.intent_type.clone(),
                        statement: "a conversational response suffices".to_string(),
                        confidence: intent.confidence * 0.9,
                    });
                    dependency_map.insert(id, vec![]);
                }
            }
        }

        if hypotheses.is_empty() {
            // low-confidence intents only; keep one generic hypothesis
            // so downstream agents have something to reason over
            let id = next_id();
            hypotheses.push(Hypothesis {
                id: id.clone(),
                intent_type: "conversation".to_string(),
                statement: "a conversational response suffices".to_string(),
                confidence: 0.5,
            });
            dependency_map.insert(id, vec![]);
            ctx.push_warning(
                self.agent_id(),
                "low_confidence_intents",
                "no intent reached 0.5, using a generic hypothesis",
            )
            .await?;
        }

        if !is_acyclic(&dependency_map) {
            return Err(AgentError::Fatal(
                "constructed dependency map contains a cycle".to_string(),
            ));
        }

        ctx.safe_set(
            self.agent_id(),
            Namespace::Reasoning,
            "hypotheses",
            serde_json::to_value(&hypotheses).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        ctx.safe_set(
            self.agent_id(),
            Namespace::Reasoning,
            "dependency_map",
            json!(dependency_map),
        )
        .await?;
        Ok(())
    }
}
