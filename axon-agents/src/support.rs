//! Shared plumbing for the agents.

use axon_context::{ContextHandle, Namespace};
use axon_llm::LlmOutcome;
use axon_pipeline::AgentError;

/// Agent id constants, matching the pipeline configuration vocabulary.
pub mod ids {
    /// Intent detection agent id.
    pub const INTENT_DETECTION: &str = "intent_detection";
    /// Reasoning structure agent id.
    pub const REASONING_STRUCTURE: &str = "reasoning_structure";
    /// Retrieval planner agent id.
    pub const RETRIEVAL_PLANNER: &str = "retrieval_planner";
    /// Retrieval executor agent id.
    pub const RETRIEVAL_EXECUTOR: &str = "retrieval_executor";
    /// Context synthesizer agent id.
    pub const CONTEXT_SYNTHESIZER: &str = "context_synthesizer";
    /// Inference agent id.
    pub const INFERENCE: &str = "inference";
    /// Validation agent id.
    pub const VALIDATION: &str = "validation";
    /// Summarization agent id.
    pub const SUMMARIZATION: &str = "summarization";
}

/// The default permission table: each agent gets only the namespaces
/// it owns, the scheduler (registered as `orchestrator`) gets all.
/// LLM-using agents additionally own `llm` so they can account their
/// own usage and decisions.
pub fn default_validator() -> axon_context::Validator {
    let mut validator = axon_context::Validator::new();
    validator.register_agent(
        ids::INTENT_DETECTION,
        ["reasoning", "llm", "diagnostics", "audit"],
    );
    validator.register_agent(ids::REASONING_STRUCTURE, ["reasoning", "diagnostics", "audit"]);
    validator.register_agent(ids::RETRIEVAL_PLANNER, ["retrieval", "diagnostics", "audit"]);
    validator.register_agent(ids::RETRIEVAL_EXECUTOR, ["retrieval", "diagnostics", "audit"]);
    validator.register_agent(
        ids::CONTEXT_SYNTHESIZER,
        ["enrichment", "diagnostics", "audit"],
    );
    validator.register_agent(
        ids::INFERENCE,
        ["reasoning", "enrichment", "llm", "diagnostics", "audit"],
    );
    validator.register_agent(ids::VALIDATION, ["diagnostics", "audit"]);
    validator.register_agent(ids::SUMMARIZATION, ["reasoning", "diagnostics", "audit"]);
    validator.register_agent("orchestrator", ["*"]);
    validator
}

/// Record one LLM outcome into the context's `llm` namespace: running
/// usage totals, the per-agent cost tally, the decision log, cache
/// counters, and the most recent provider/model selection.
pub async fn record_llm_outcome(
    ctx: &ContextHandle,
    agent_id: &str,
    outcome: &LlmOutcome,
) -> Result<(), AgentError> {
    let mut llm = ctx.with(|c| c.llm.clone()).await;

    llm.usage.prompt_tokens += outcome.tokens.prompt_tokens;
    llm.usage.completion_tokens += outcome.tokens.completion_tokens;
    llm.usage.total_tokens += outcome.tokens.total_tokens;
    llm.usage.cost_usd += outcome.cost;
    *llm.usage
        .by_agent
        .entry(agent_id.to_string())
        .or_default() += outcome.cost;
    llm.decisions.push(outcome.decision.clone());
    if outcome.cache_hit {
        llm.cache.hits += 1;
    } else {
        llm.cache.misses += 1;
    }
    llm.provider = Some(outcome.model.provider.clone());
    llm.model = Some(outcome.model.model.clone());

    for (field, value) in [
        ("usage", serde_json::to_value(&llm.usage)),
        ("decisions", serde_json::to_value(&llm.decisions)),
        ("cache", serde_json::to_value(llm.cache)),
        ("provider", serde_json::to_value(&llm.provider)),
        ("model", serde_json::to_value(&llm.model)),
    ] {
        let value = value.map_err(|e| AgentError::Fatal(e.to_string()))?;
        ctx.safe_set(agent_id, Namespace::Llm, field, value).await?;
    }
    Ok(())
}

/// Rough token estimate for prompt sizing (4 chars per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Lowercased word tokens of at least `min_len` characters.
pub fn tokens_of(text: &str, min_len: usize) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= min_len)
        .map(|t| t.to_lowercase())
        .collect()
}
