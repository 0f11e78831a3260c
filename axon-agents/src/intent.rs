//! Intent detection: rule-based classification with LLM escalation.

use crate::support::{estimate_tokens, ids, record_llm_outcome, tokens_of};
use axon_context::{ContextHandle, Intent, IntentOrigin, Namespace};
use axon_llm::{LlmError, LlmOrchestrator, LlmTask, TaskType};
use axon_pipeline::{AgentError, ReasoningAgent};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sources the rule tables recognize in user text.
pub const KNOWN_SOURCES: [&str; 6] = [
    "gitlab",
    "youtrack",
    "github",
    "jira",
    "confluence",
    "slack",
];

const QUERY_CUES: [&str; 12] = [
    "issue", "issues", "bug", "bugs", "error", "errors", "incident", "ticket", "status",
    "outage", "failing", "blocker",
];

const QUALIFIER_CUES: [&str; 5] = ["critical", "production", "urgent", "severe", "major"];

const COMMAND_CUES: [&str; 9] = [
    "show", "list", "find", "get", "give", "fetch", "display", "open", "run",
];

const INTERROGATIVES: [&str; 10] = [
    "what", "why", "how", "when", "where", "who", "which", "is", "are", "does",
];

const VAGUE_WORDS: [&str; 3] = ["something", "anything", "stuff"];

/// Confidence below which the rules escalate to the LLM.
const ESCALATION_THRESHOLD: f64 = 0.8;

/// Top-2 margin below which a clarification warning is emitted.
const CLARIFICATION_MARGIN: f64 = 0.05;

/// Rule-based classification of one message. Returns intents sorted by
/// descending confidence, plus extracted entities.
pub fn classify(message: &str) -> (Vec<Intent>, BTreeMap<String, Vec<String>>) {
    let lowered = message.to_lowercase();
    let words = tokens_of(&lowered, 1);

    let sources: Vec<String> = KNOWN_SOURCES
        .iter()
        .filter(|s| lowered.contains(*s))
        .map(|s| s.to_string())
        .collect();
    let qualifiers: Vec<String> = QUALIFIER_CUES
        .iter()
        .filter(|q| words.iter().any(|w| w == *q))
        .map(|q| q.to_string())
        .collect();

    let query_hits = QUERY_CUES.iter().filter(|c| words.iter().any(|w| w == *c)).count()
        + qualifiers.len();
    let command_hit = words
        .first()
        .map(|w| COMMAND_CUES.contains(&w.as_str()))
        .unwrap_or(false);
    let interrogative = words
        .first()
        .map(|w| INTERROGATIVES.contains(&w.as_str()))
        .unwrap_or(false)
        || message.trim_end().ends_with('?');
    let arithmetic = lowered
        .chars()
        .collect::<Vec<_>>()
        .windows(3)
        .any(|w| w[0].is_ascii_digit() && "+-*/".contains(w[1]) && w[2].is_ascii_digit());
    let vague = VAGUE_WORDS.iter().any(|v| words.iter().any(|w| w == *v));

    let mut intents: Vec<Intent> = Vec::new();
    let rule = |intent_type: &str, confidence: f64| Intent {
        intent_type: intent_type.to_string(),
        confidence: confidence.clamp(0.0, 1.0),
        origin: IntentOrigin::Rules,
    };

    if query_hits > 0 || !sources.is_empty() {
        let mut confidence = 0.5 + 0.1 * query_hits as f64;
        if !sources.is_empty() {
            confidence += 0.2;
        }
        intents.push(rule("query", confidence.min(0.97)));
    }
    if interrogative && sources.is_empty() && query_hits == 0 {
        let confidence = if arithmetic { 0.95 } else { 0.85 };
        intents.push(rule("question", confidence));
    } else if interrogative {
        intents.push(rule("question", 0.6));
    }
    if command_hit {
        intents.push(rule("command", 0.6));
    }
    if intents.is_empty() || vague {
        intents.push(rule("conversation", 0.58));
    }

    intents.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut entities = BTreeMap::new();
    if !sources.is_empty() {
        entities.insert("sources".to_string(), sources);
    }
    if !qualifiers.is_empty() {
        entities.insert("qualifiers".to_string(), qualifiers);
    }
    let keywords: Vec<String> = {
        let mut seen = std::collections::HashSet::new();
        tokens_of(&lowered, 5)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .take(5)
            .collect()
    };
    if !keywords.is_empty() {
        entities.insert("keywords".to_string(), keywords);
    } else {
        entities.insert(
            "keywords".to_string(),
            words.into_iter().take(3).collect(),
        );
    }

    (intents, entities)
}

/// Parse an LLM classification response: either a JSON array of
/// `{type, confidence}` objects or `type: confidence` lines.
fn parse_llm_intents(text: &str) -> Option<Vec<Intent>> {
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(text.trim()) {
        let intents: Vec<Intent> = items
            .iter()
            .filter_map(|item| {
                let intent_type = item.get("type")?.as_str()?.to_string();
                let confidence = item.get("confidence")?.as_f64()?;
                Some(Intent {
                    intent_type,
                    confidence: confidence.clamp(0.0, 1.0),
                    origin: IntentOrigin::Llm,
                })
            })
            .collect();
        if !intents.is_empty() {
            return Some(intents);
        }
    }

    let intents: Vec<Intent> = text
        .lines()
        .filter_map(|line| {
            let (intent_type, confidence) = line.split_once(':')?;
            let confidence: f64 = confidence.trim().parse().ok()?;
            let intent_type = intent_type.trim().to_lowercase();
            if intent_type.is_empty() || intent_type.contains(' ') {
                return None;
            }
            Some(Intent {
                intent_type,
                confidence: confidence.clamp(0.0, 1.0),
                origin: IntentOrigin::Llm,
            })
        })
        .collect();
    (!intents.is_empty()).then_some(intents)
}

/// Detects the user's intent from the last user message.
///
/// Rules run first; when the top confidence lands under 0.8 the agent
/// escalates to the `intent_classification` task. A failed escalation
/// (no provider, budget refusal) keeps the rule result and records a
/// warning. Two leading intents within 0.05 of each other produce a
/// `clarification_questions` warning.
pub struct IntentDetectionAgent {
    message: String,
    orchestrator: Arc<LlmOrchestrator>,
}

impl IntentDetectionAgent {
    /// An agent classifying `message`.
    pub fn new(message: impl Into<String>, orchestrator: Arc<LlmOrchestrator>) -> Self {
        Self {
            message: message.into(),
            orchestrator,
        }
    }
}

#[async_trait]
impl ReasoningAgent for IntentDetectionAgent {
    fn agent_id(&self) -> &str {
        ids::INTENT_DETECTION
    }

    fn postconditions(&self) -> Vec<String> {
        vec!["reasoning.intents".into(), "reasoning.entities".into()]
    }

    async fn execute(
        &self,
        cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError> {
        let (mut intents, entities) = classify(&self.message);
        let top_confidence = intents.first().map(|i| i.confidence).unwrap_or(0.0);
        debug!(top = top_confidence, n = intents.len(), "rule classification done");

        if top_confidence < ESCALATION_THRESHOLD && !cancel.is_cancelled() {
            let prompt = format!(
                "Classify the intent of this message as one of query, command, \
                 question, conversation. Reply as `type: confidence` lines.\n\n{}",
                self.message
            );
            let task = LlmTask {
                agent_id: self.agent_id().to_string(),
                task_type: TaskType::IntentClassification,
                context_size: estimate_tokens(&prompt),
                prompt,
                max_tokens: Some(128),
                temperature: 0.0,
                use_cache: true,
            };
            match self.orchestrator.execute(task).await {
                Ok(outcome) => {
                    record_llm_outcome(ctx, self.agent_id(), &outcome).await?;
                    match parse_llm_intents(&outcome.text) {
                        Some(mut llm_intents) => {
                            llm_intents.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
                            intents = llm_intents;
                        }
                        None => {
                            ctx.push_warning(
                                self.agent_id(),
                                "llm_escalation_unparseable",
                                "classification response not parseable, keeping rule result",
                            )
                            .await?;
                        }
                    }
                }
                Err(LlmError::BudgetExceeded { .. }) => {
                    ctx.push_warning(
                        self.agent_id(),
                        "budget_exceeded",
                        "intent escalation skipped, rules-only classification",
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

        if intents.len() >= 2 && intents[0].confidence - intents[1].confidence < CLARIFICATION_MARGIN
        {
            ctx.push_warning(
                self.agent_id(),
                "clarification_questions",
                format!(
                    "ambiguous intent: {} ({:.2}) vs {} ({:.2}); consider asking \
                     which the user meant",
                    intents[0].intent_type,
                    intents[0].confidence,
                    intents[1].intent_type,
                    intents[1].confidence
                ),
            )
            .await?;
        }

        ctx.safe_set(
            self.agent_id(),
            Namespace::Reasoning,
            "intents",
            serde_json::to_value(&intents).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        ctx.safe_set(
            self.agent_id(),
            Namespace::Reasoning,
            "entities",
            json!(entities),
        )
        .await?;
        Ok(())
    }
}
