//! The entities carried by the context namespaces.

use axon_types::DurationMs;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an intent classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentOrigin {
    /// Produced by the rule tables.
    Rules,
    /// Produced by an LLM escalation.
    Llm,
}

/// A detected user intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Intent class (`"query"`, `"command"`, `"question"`, `"conversation"`).
    #[serde(rename = "type")]
    pub intent_type: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// How the intent was detected.
    pub origin: IntentOrigin,
}

/// A working hypothesis derived from an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Hypothesis identifier (`"hyp-1"`, …), referenced by the
    /// dependency map and by conclusion evidence.
    pub id: String,
    /// The intent class this hypothesis serves.
    pub intent_type: String,
    /// The hypothesis statement.
    pub statement: String,
    /// Prior confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A drawn conclusion. Every entry in `evidence` must resolve to a
/// fact id or a hypothesis id present in the context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conclusion {
    /// Conclusion identifier.
    pub id: String,
    /// The hypothesis this conclusion settles.
    pub hypothesis_id: String,
    /// The conclusion statement.
    pub statement: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Fact ids and hypothesis ids supporting the conclusion.
    pub evidence: Vec<String>,
}

/// One step of the inference chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceStep {
    /// The conclusion this step produced.
    pub conclusion_id: String,
    /// Evidence ids consumed by the step.
    pub basis: Vec<String>,
    /// How the step was made (`"rules"` or `"llm"`).
    pub method: String,
}

/// A rejected or lower-ranked alternative to a conclusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    /// The conclusion the alternative competes with.
    pub conclusion_id: String,
    /// The alternative statement.
    pub statement: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A normalized fact synthesized from retrieved artifacts.
///
/// Facts are uniquely keyed by `(source, id)` after synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Identifier within the source.
    pub id: String,
    /// The source the fact came from.
    pub source: String,
    /// When the underlying data was produced or retrieved.
    pub timestamp: DateTime<Utc>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// The fact statement.
    pub statement: String,
    /// Structured payload carried along for downstream agents.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl Fact {
    /// The `(source, id)` dedup key.
    pub fn key(&self) -> (String, String) {
        (self.source.clone(), self.id.clone())
    }
}

/// Knowledge derived from combining facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedKnowledge {
    /// Identifier.
    pub id: String,
    /// The derived statement.
    pub statement: String,
    /// Fact ids the derivation consumed.
    pub derived_from: Vec<String>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// An explicit edge between two facts or entities. No back-pointers —
/// relationships are `(from, to)` id pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Edge source id.
    pub from_id: String,
    /// Edge target id.
    pub to_id: String,
    /// Relationship kind (`"co_occurs"`, `"references"`, …).
    pub kind: String,
}

/// A link to external context a consumer may follow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextLink {
    /// Human-readable label.
    pub label: String,
    /// The source that provided the link.
    pub source: String,
    /// Location (URL or source-specific reference).
    pub location: String,
}

/// A retrieval plan for one hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalPlan {
    /// Plan identifier.
    pub id: String,
    /// The hypothesis the plan serves.
    pub hypothesis_id: String,
    /// Sources to query.
    pub sources: Vec<String>,
    /// Filters applied to every query of this plan.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
    /// Plan priority; lower runs first.
    pub priority: u8,
    /// Volume cap per source.
    pub max_results: usize,
}

/// The record of one executed (or attempted) query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    /// The normalized query.
    pub query: axon_types::SourceQuery,
    /// Whether execution was attempted and completed.
    pub executed: bool,
    /// Ids of the artifacts the query produced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifact_ids: Vec<String>,
    /// Failure detail when the query did not complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate token and cost accounting for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageTotals {
    /// All tokens across all calls.
    pub total_tokens: u64,
    /// Prompt tokens across all calls.
    pub prompt_tokens: u64,
    /// Completion tokens across all calls.
    pub completion_tokens: u64,
    /// Total cost in USD.
    pub cost_usd: Decimal,
    /// Cost per agent; sums to `cost_usd`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_agent: BTreeMap<String, Decimal>,
}

/// One model-selection decision by the LLM orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmDecision {
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// The agent the decision served.
    pub agent_id: String,
    /// The task type that drove selection.
    pub task_type: String,
    /// Selected provider.
    pub provider: String,
    /// Selected model.
    pub model: String,
    /// Why this model was selected (`"default"`, `"fallback"`,
    /// `"budget_degradation"`, `"cache_hit"`, …).
    pub reason: String,
    /// Task complexity class.
    pub complexity: String,
}

/// Cache effectiveness counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Responses served from cache.
    pub hits: u64,
    /// Responses that went to a provider.
    pub misses: u64,
}

/// Severity of a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Recoverable; the pipeline continued.
    Low,
    /// Degraded behavior.
    Medium,
    /// An agent was aborted.
    High,
    /// The pipeline was aborted.
    Critical,
}

/// An error captured in diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticError {
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
    /// The agent (or `"pipeline"`) it belongs to.
    pub agent_id: String,
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// How bad it was.
    pub severity: Severity,
}

/// A warning captured in diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticWarning {
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
    /// The agent it belongs to.
    pub agent_id: String,
    /// Stable machine-readable code (`"clarification_questions"`,
    /// `"source_unavailable"`, `"budget_exceeded"`, …).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Per-agent execution metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Number of invocations (including retries).
    pub invocations: u64,
    /// Total wall-clock time across invocations.
    pub total_duration_ms: DurationMs,
    /// Invocations that ended in failure.
    pub failures: u64,
}

/// Pipeline-level performance counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Total pipeline duration.
    pub total_duration_ms: DurationMs,
    /// Metrics keyed by agent id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agent_metrics: BTreeMap<String, AgentMetrics>,
}

/// One check inside a validation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCheck {
    /// Check name (`"slot_completeness"`, `"dependency_acyclic"`,
    /// `"evidence_resolvable"`).
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Failure detail, empty when passed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

/// A report produced by the validation agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
    /// Whether all checks passed.
    pub passed: bool,
    /// The individual checks.
    pub checks: Vec<ValidationCheck>,
    /// Suggested automatic fixes for failed checks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_fixes: Vec<String>,
}

/// Terminal status of one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The agent completed and its postconditions held.
    Succeeded,
    /// The agent errored out of all retries.
    Failed,
    /// The agent was skipped (condition false or precondition missing
    /// with `fail_on_violation` off).
    Skipped,
    /// A precondition was missing and `fail_on_violation` was on.
    FailedPrecondition,
    /// The agent ran but its postconditions did not hold.
    FailedPostcondition,
    /// The agent exceeded its deadline.
    Timeout,
}

impl RunStatus {
    /// Whether this status counts as a failure for metrics.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed
                | RunStatus::FailedPrecondition
                | RunStatus::FailedPostcondition
                | RunStatus::Timeout
        )
    }
}

/// Audit record of one agent run. Append-only, strictly non-decreasing
/// in timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
    /// The agent that ran.
    pub agent_id: String,
    /// How the run ended.
    pub status: RunStatus,
    /// Wall-clock duration.
    pub duration_ms: DurationMs,
    /// Namespaces the run wrote (from the captured diff).
    pub keys_written: Vec<String>,
    /// Execution attempts (1 + retries used).
    pub attempts: u32,
    /// Error message for failed runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A scalar field change captured in a diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChange {
    /// Dotted field path (`"llm.provider"`).
    pub field: String,
    /// Previous value.
    pub from: serde_json::Value,
    /// New value.
    pub to: serde_json::Value,
}

/// Compact record of what one agent changed in the context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDiff {
    /// The agent the diff belongs to.
    pub agent_id: String,
    /// When the diff was captured.
    pub timestamp: DateTime<Utc>,
    /// Added-item counts keyed by `<array>_added` (`"intents_added"`,
    /// `"facts_added"`, …). Zero counts are omitted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counts: BTreeMap<String, u64>,
    /// Scalar changes (`provider`, `model`, `summary`, `locale`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
    /// Cost added during the run.
    pub cost_added: Decimal,
    /// Names of the namespaces that changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces_changed: Vec<String>,
}

impl ContextDiff {
    /// An empty diff for `agent_id` at `timestamp`.
    pub fn empty(agent_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            agent_id: agent_id.into(),
            timestamp,
            counts: BTreeMap::new(),
            changes: Vec::new(),
            cost_added: Decimal::ZERO,
            namespaces_changed: Vec::new(),
        }
    }

    /// Whether the diff records no changes.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty() && self.changes.is_empty() && self.cost_added.is_zero()
    }
}
