//! Context synthesis: artifacts in, deduplicated facts out.

use crate::support::{ids, tokens_of};
use axon_context::{
    ContextHandle, ContextLink, DerivedKnowledge, Fact, Namespace, Relationship,
};
use axon_pipeline::{AgentError, ReasoningAgent};
use axon_types::{Artifact, artifact::ArtifactContent};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tokio_util::sync::CancellationToken;

/// Cap on derived co-occurrence edges.
const MAX_RELATIONSHIPS: usize = 100;

/// Normalizes retrieved artifacts into the uniform [`Fact`] schema,
/// deduplicates by `(source, id)`, derives per-source and cross-source
/// knowledge, and links facts that share vocabulary.
pub struct ContextSynthesizerAgent;

impl ContextSynthesizerAgent {
    /// Create the agent.
    pub fn new() -> Self {
        Self
    }
}

impl Default for ContextSynthesizerAgent {
    fn default() -> Self {
        Self::new()
    }
}

fn fact_from(artifact: &Artifact) -> Fact {
    let statement = if artifact.title.is_empty() {
        match &artifact.content {
            ArtifactContent::Inline(value) => value
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or("untitled record")
                .to_string(),
            ArtifactContent::External { .. } => "externalized record".to_string(),
        }
    } else {
        artifact.title.clone()
    };
    let payload = match &artifact.content {
        ArtifactContent::Inline(value) => value.clone(),
        ArtifactContent::External { .. } => serde_json::Value::Null,
    };
    Fact {
        id: artifact.id.clone(),
        source: artifact.source.clone(),
        timestamp: Utc::now(),
        confidence: artifact.relevance.clamp(0.5, 1.0),
        statement,
        payload,
    }
}

#[async_trait]
impl ReasoningAgent for ContextSynthesizerAgent {
    fn agent_id(&self) -> &str {
        ids::CONTEXT_SYNTHESIZER
    }

    fn preconditions(&self) -> Vec<String> {
        vec!["retrieval.artifacts".into()]
    }

    fn postconditions(&self) -> Vec<String> {
        vec![
            "enrichment.facts".into(),
            "enrichment.derived_knowledge".into(),
            "enrichment.relationships".into(),
        ]
    }

    async fn execute(
        &self,
        _cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError> {
        let artifacts = ctx.with(|c| c.retrieval.artifacts.clone()).await;

        let mut facts: Vec<Fact> = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut duplicates = 0usize;
        for artifact in &artifacts {
            let fact = fact_from(artifact);
            if seen.insert(fact.key()) {
                facts.push(fact);
            } else {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            ctx.push_warning(
                self.agent_id(),
                "duplicate_artifacts",
                format!("dropped {duplicates} duplicate artifact(s) by (source, id)"),
            )
            .await?;
        }

        // per-source aggregation, then cross-source corroboration
        let mut by_source: BTreeMap<&str, Vec<&Fact>> = BTreeMap::new();
        for fact in &facts {
            by_source.entry(fact.source.as_str()).or_default().push(fact);
        }
        let mut derived: Vec<DerivedKnowledge> = Vec::new();
        for (index, (source, group)) in by_source.iter().enumerate() {
            derived.push(DerivedKnowledge {
                id: format!("dk-{}", index + 1),
                statement: format!("{} matching record(s) found in {source}", group.len()),
                derived_from: group.iter().map(|f| f.id.clone()).collect(),
                confidence: group
                    .iter()
                    .map(|f| f.confidence)
                    .fold(0.0, f64::max),
            });
        }
        if by_source.len() >= 2 {
            derived.push(DerivedKnowledge {
                id: format!("dk-{}", derived.len() + 1),
                statement: format!(
                    "findings corroborated across {} sources",
                    by_source.len()
                ),
                derived_from: facts.iter().map(|f| f.id.clone()).collect(),
                confidence: 0.9,
            });
        }

        // co-occurrence edges between facts sharing vocabulary
        let vocab: Vec<(String, HashSet<String>)> = facts
            .iter()
            .map(|f| {
                (
                    f.id.clone(),
                    tokens_of(&f.statement, 5).into_iter().collect(),
                )
            })
            .collect();
        let mut relationships: Vec<Relationship> = Vec::new();
        'outer: for i in 0..vocab.len() {
            for j in (i + 1)..vocab.len() {
                if relationships.len() >= MAX_RELATIONSHIPS {
                    break 'outer;
                }
                if vocab[i].1.intersection(&vocab[j].1).next().is_some() {
                    relationships.push(Relationship {
                        from_id: vocab[i].0.clone(),
                        to_id: vocab[j].0.clone(),
                        kind: "co_occurs".to_string(),
                    });
                }
            }
        }
        if relationships.is_empty() {
            ctx.push_warning(
                self.agent_id(),
                "no_relationships",
                "no co-occurrence links between the synthesized facts",
            )
            .await?;
        }

        let links: Vec<ContextLink> = facts
            .iter()
            .filter_map(|f| {
                let url = f.payload.get("url")?.as_str()?;
                Some(ContextLink {
                    label: f.statement.clone(),
                    source: f.source.clone(),
                    location: url.to_string(),
                })
            })
            .collect();

        ctx.safe_set(
            self.agent_id(),
            Namespace::Enrichment,
            "facts",
            serde_json::to_value(&facts).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        ctx.safe_set(
            self.agent_id(),
            Namespace::Enrichment,
            "derived_knowledge",
            serde_json::to_value(&derived).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        ctx.safe_set(
            self.agent_id(),
            Namespace::Enrichment,
            "relationships",
            serde_json::to_value(&relationships).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        if !links.is_empty() {
            ctx.safe_set(
                self.agent_id(),
                Namespace::Enrichment,
                "context_links",
                serde_json::to_value(&links).map_err(|e| AgentError::Fatal(e.to_string()))?,
            )
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(id: &str, source: &str, title: &str) -> Artifact {
        Artifact {
            id: id.into(),
            source: source.into(),
            kind: "issue".into(),
            title: title.into(),
            content: ArtifactContent::inline(json!({"title": title})),
            relevance: 0.8,
        }
    }

    #[test]
    fn facts_inherit_identity_and_statement() {
        let fact = fact_from(&artifact("42", "gitlab", "Crash in prod"));
        assert_eq!(fact.id, "42");
        assert_eq!(fact.source, "gitlab");
        assert_eq!(fact.statement, "Crash in prod");
        assert!((fact.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn untitled_artifacts_fall_back_to_payload_title() {
        let mut a = artifact("1", "gitlab", "");
        a.content = ArtifactContent::inline(json!({"title": "from payload"}));
        assert_eq!(fact_from(&a).statement, "from payload");
    }
}
