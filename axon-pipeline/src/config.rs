//! Pipeline configuration.
//!
//! The descriptor arrives from an external file; unknown keys are
//! rejected at load via `deny_unknown_fields` so typos fail at startup
//! rather than silently changing behavior.

use axon_context::AgentContext;
use serde::{Deserialize, Serialize};

/// How the DAG's levels are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Linearized deterministically by `(level, id)`.
    Sequential,
    /// All agents in a level run concurrently.
    Parallel,
    /// Sequential, with per-agent conditions deciding participation.
    Conditional,
}

/// A boolean condition evaluated against the live context. Agents
/// whose condition is false are skipped without a postcondition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Always run.
    Always,
    /// A `query`-class intent was detected.
    HasQueryIntent,
    /// The planner produced at least one retrieval plan.
    HasRetrievalPlan,
    /// A confident query intent makes this run high-stakes.
    HighStakes,
    /// A previous validation report failed.
    ValidationFailed,
}

impl Condition {
    /// Evaluate against a context snapshot.
    pub fn evaluate(&self, ctx: &AgentContext) -> bool {
        match self {
            Condition::Always => true,
            Condition::HasQueryIntent => ctx
                .reasoning
                .intents
                .iter()
                .any(|i| i.intent_type == "query"),
            Condition::HasRetrievalPlan => !ctx.retrieval.plans.is_empty(),
            Condition::HighStakes => ctx
                .reasoning
                .intents
                .iter()
                .any(|i| i.intent_type == "query" && i.confidence >= 0.9),
            Condition::ValidationFailed => ctx
                .diagnostics
                .validation_reports
                .iter()
                .any(|r| !r.passed),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// One agent's entry in the pipeline descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSpec {
    /// Agent id; must have a registered implementation.
    pub id: String,
    /// Disabled agents are left out of the compiled graph.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-run deadline.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after a failed run (0 = no retries).
    #[serde(default)]
    pub retry: u32,
    /// Agents that must complete before this one starts.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Participation condition; evaluated whenever declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl AgentSpec {
    /// A spec with defaults: enabled, 30 s timeout, no retries.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            timeout_ms: default_timeout_ms(),
            retry: 0,
            depends_on: Vec::new(),
            condition: None,
        }
    }

    /// Add a dependency edge.
    #[must_use]
    pub fn after(mut self, dependency: impl Into<String>) -> Self {
        self.depends_on.push(dependency.into());
        self
    }

    /// Attach a participation condition.
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Set the retry count.
    #[must_use]
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Scheduler behavior toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineOptions {
    /// Check pre/postconditions around every run.
    #[serde(default = "default_true")]
    pub validate_contract: bool,
    /// Record per-agent metrics into diagnostics.
    #[serde(default = "default_true")]
    pub track_performance: bool,
    /// Capture per-agent diffs into the audit trail.
    #[serde(default = "default_true")]
    pub capture_changes: bool,
    /// Treat a missing precondition as a failure instead of a skip.
    #[serde(default)]
    pub fail_on_violation: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            validate_contract: true,
            track_performance: true,
            capture_changes: true,
            fail_on_violation: false,
        }
    }
}

/// The full pipeline descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Execution mode.
    pub mode: ExecutionMode,
    /// The agents, with their dependencies and conditions.
    pub agents: Vec<AgentSpec>,
    /// Scheduler toggles.
    #[serde(default)]
    pub options: PipelineOptions,
    /// Agents whose failure aborts the whole pipeline.
    #[serde(default)]
    pub critical_agents: Vec<String>,
}

impl PipelineConfig {
    /// A config with default options and no critical agents.
    pub fn new(mode: ExecutionMode, agents: Vec<AgentSpec>) -> Self {
        Self {
            mode,
            agents,
            options: PipelineOptions::default(),
            critical_agents: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_context::{Intent, IntentOrigin};

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = r#"{
            "mode": "sequential",
            "agents": [{"id": "intent_detection", "surprise": 1}]
        }"#;
        assert!(serde_json::from_str::<PipelineConfig>(raw).is_err());

        let raw = r#"{
            "mode": "sequential",
            "agents": [{"id": "intent_detection"}],
            "surprise": true
        }"#;
        assert!(serde_json::from_str::<PipelineConfig>(raw).is_err());
    }

    #[test]
    fn defaults_fill_in_on_load() {
        let raw = r#"{"mode": "parallel", "agents": [{"id": "a"}]}"#;
        let config: PipelineConfig = serde_json::from_str(raw).unwrap();
        assert!(config.agents[0].enabled);
        assert_eq!(config.agents[0].timeout_ms, 30_000);
        assert_eq!(config.agents[0].retry, 0);
        assert!(config.options.validate_contract);
        assert!(!config.options.fail_on_violation);
    }

    #[test]
    fn conditions_read_the_live_context() {
        let mut ctx = AgentContext::new("s", "t");
        assert!(!Condition::HasQueryIntent.evaluate(&ctx));
        assert!(!Condition::HighStakes.evaluate(&ctx));

        ctx.reasoning.intents.push(Intent {
            intent_type: "query".into(),
            confidence: 0.95,
            origin: IntentOrigin::Rules,
        });
        assert!(Condition::HasQueryIntent.evaluate(&ctx));
        assert!(Condition::HighStakes.evaluate(&ctx));
        assert!(!Condition::HasRetrievalPlan.evaluate(&ctx));
        assert!(Condition::Always.evaluate(&ctx));
    }
}
