//! The seven context namespaces and typed field routing.
//!
//! Agent writes arrive as `(namespace, field, serde_json::Value)`
//! triples through the validator; each namespace deserializes the value
//! into the typed field and rejects unknown fields and type mismatches.

use crate::entities::*;
use axon_types::{Artifact, SessionId, TraceId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A top-level section of the context with its own write-permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Session identity; read-only after creation except `locale`.
    Metadata,
    /// Intents, hypotheses, conclusions, summary.
    Reasoning,
    /// Facts, derived knowledge, relationships.
    Enrichment,
    /// Plans, queries, artifacts.
    Retrieval,
    /// Provider/model selection, usage, decisions, cache counters.
    Llm,
    /// Errors, warnings, performance, validation reports.
    Diagnostics,
    /// Agent runs and diffs. Scheduler-owned.
    Audit,
}

impl Namespace {
    /// All namespaces in canonical order.
    pub const ALL: [Namespace; 7] = [
        Namespace::Metadata,
        Namespace::Reasoning,
        Namespace::Enrichment,
        Namespace::Retrieval,
        Namespace::Llm,
        Namespace::Diagnostics,
        Namespace::Audit,
    ];

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Metadata => "metadata",
            Namespace::Reasoning => "reasoning",
            Namespace::Enrichment => "enrichment",
            Namespace::Retrieval => "retrieval",
            Namespace::Llm => "llm",
            Namespace::Diagnostics => "diagnostics",
            Namespace::Audit => "audit",
        }
    }

    /// Whether this namespace carries agent data, as opposed to the
    /// scheduler-mediated bookkeeping sections. Same-level writer
    /// conflict detection only applies to data namespaces.
    pub fn is_data(&self) -> bool {
        !matches!(self, Namespace::Diagnostics | Namespace::Audit)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .iter()
            .copied()
            .find(|ns| ns.as_str() == s)
            .ok_or(())
    }
}

/// Why a field write was rejected by its namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The field does not exist in the namespace.
    Unknown,
    /// The field exists but may not be written after creation.
    ReadOnly,
    /// The value did not deserialize into the field's type.
    Type(String),
}

fn coerce<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, FieldError> {
    serde_json::from_value(value).map_err(|e| FieldError::Type(e.to_string()))
}

/// Session identity. Read-only after creation except `locale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataNs {
    /// Client session identifier.
    pub session_id: SessionId,
    /// Correlation id for this run.
    pub trace_id: TraceId,
    /// Context creation time.
    pub created_at: DateTime<Utc>,
    /// BCP-47 locale tag.
    pub locale: String,
}

impl MetadataNs {
    pub(crate) fn set_field(
        &mut self,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), FieldError> {
        match field {
            "locale" => {
                self.locale = coerce(value)?;
                Ok(())
            }
            "session_id" | "trace_id" | "created_at" => Err(FieldError::ReadOnly),
            _ => Err(FieldError::Unknown),
        }
    }
}

/// The reasoning namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningNs {
    /// Detected intents.
    pub intents: Vec<Intent>,
    /// Extracted entities, keyed by entity class.
    pub entities: BTreeMap<String, Vec<String>>,
    /// Working hypotheses.
    pub hypotheses: Vec<Hypothesis>,
    /// Drawn conclusions.
    pub conclusions: Vec<Conclusion>,
    /// Hypothesis dependency edges: id → prerequisite ids.
    pub dependency_map: BTreeMap<String, Vec<String>>,
    /// Steps taken by the inference agent.
    pub inference_chain: Vec<InferenceStep>,
    /// Alternatives that lost to the drawn conclusions.
    pub alternatives: Vec<Alternative>,
    /// Free-form confidence scores keyed by subject.
    pub confidence_scores: BTreeMap<String, f64>,
    /// The human-facing summary.
    pub summary: String,
}

impl ReasoningNs {
    pub(crate) fn set_field(
        &mut self,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), FieldError> {
        match field {
            "intents" => self.intents = coerce(value)?,
            "entities" => self.entities = coerce(value)?,
            "hypotheses" => self.hypotheses = coerce(value)?,
            "conclusions" => self.conclusions = coerce(value)?,
            "dependency_map" => self.dependency_map = coerce(value)?,
            "inference_chain" => self.inference_chain = coerce(value)?,
            "alternatives" => self.alternatives = coerce(value)?,
            "confidence_scores" => self.confidence_scores = coerce(value)?,
            "summary" => self.summary = coerce(value)?,
            _ => return Err(FieldError::Unknown),
        }
        Ok(())
    }
}

/// The enrichment namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentNs {
    /// Normalized facts, uniquely keyed by `(source, id)`.
    pub facts: Vec<Fact>,
    /// Knowledge derived from facts.
    pub derived_knowledge: Vec<DerivedKnowledge>,
    /// Explicit relationship edges.
    pub relationships: Vec<Relationship>,
    /// Links a consumer may follow.
    pub context_links: Vec<ContextLink>,
}

impl EnrichmentNs {
    pub(crate) fn set_field(
        &mut self,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), FieldError> {
        match field {
            "facts" => self.facts = coerce(value)?,
            "derived_knowledge" => self.derived_knowledge = coerce(value)?,
            "relationships" => self.relationships = coerce(value)?,
            "context_links" => self.context_links = coerce(value)?,
            _ => return Err(FieldError::Unknown),
        }
        Ok(())
    }
}

/// The retrieval namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalNs {
    /// Retrieval plans, one per hypothesis that needs data.
    pub plans: Vec<RetrievalPlan>,
    /// Executed and attempted queries.
    pub queries: Vec<QueryRecord>,
    /// Retrieved artifacts, inline or externalized.
    pub artifacts: Vec<Artifact>,
}

impl RetrievalNs {
    pub(crate) fn set_field(
        &mut self,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), FieldError> {
        match field {
            "plans" => self.plans = coerce(value)?,
            "queries" => self.queries = coerce(value)?,
            "artifacts" => self.artifacts = coerce(value)?,
            _ => return Err(FieldError::Unknown),
        }
        Ok(())
    }
}

/// The llm namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmNs {
    /// Provider of the most recent selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model of the most recent selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Aggregate usage.
    pub usage: UsageTotals,
    /// Model-selection decisions in order.
    pub decisions: Vec<LlmDecision>,
    /// Cache effectiveness counters.
    pub cache: CacheStats,
}

impl LlmNs {
    pub(crate) fn set_field(
        &mut self,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), FieldError> {
        match field {
            "provider" => self.provider = coerce(value)?,
            "model" => self.model = coerce(value)?,
            "usage" => self.usage = coerce(value)?,
            "decisions" => self.decisions = coerce(value)?,
            "cache" => self.cache = coerce(value)?,
            _ => return Err(FieldError::Unknown),
        }
        Ok(())
    }
}

/// The diagnostics namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsNs {
    /// Captured errors.
    pub errors: Vec<DiagnosticError>,
    /// Captured warnings.
    pub warnings: Vec<DiagnosticWarning>,
    /// Performance counters.
    pub performance: PerformanceReport,
    /// Validation agent output.
    pub validation_reports: Vec<ValidationReport>,
}

impl DiagnosticsNs {
    pub(crate) fn set_field(
        &mut self,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), FieldError> {
        match field {
            "errors" => self.errors = coerce(value)?,
            "warnings" => self.warnings = coerce(value)?,
            "performance" => self.performance = coerce(value)?,
            "validation_reports" => self.validation_reports = coerce(value)?,
            _ => return Err(FieldError::Unknown),
        }
        Ok(())
    }
}

/// The audit namespace. Append-only; written by the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditNs {
    /// One record per agent run, in completion order.
    pub agent_runs: Vec<AgentRun>,
    /// One diff per captured run.
    pub diffs: Vec<ContextDiff>,
}

impl AuditNs {
    pub(crate) fn set_field(
        &mut self,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), FieldError> {
        match field {
            "agent_runs" => self.agent_runs = coerce(value)?,
            "diffs" => self.diffs = coerce(value)?,
            _ => return Err(FieldError::Unknown),
        }
        Ok(())
    }
}

/// Lengths of every bounded array in the context, for the size checker.
pub(crate) fn array_lengths(
    reasoning: &ReasoningNs,
    enrichment: &EnrichmentNs,
    retrieval: &RetrievalNs,
    llm: &LlmNs,
    diagnostics: &DiagnosticsNs,
    audit: &AuditNs,
) -> Vec<(&'static str, usize)> {
    vec![
        ("reasoning.intents", reasoning.intents.len()),
        ("reasoning.hypotheses", reasoning.hypotheses.len()),
        ("reasoning.conclusions", reasoning.conclusions.len()),
        ("reasoning.inference_chain", reasoning.inference_chain.len()),
        ("reasoning.alternatives", reasoning.alternatives.len()),
        ("enrichment.facts", enrichment.facts.len()),
        (
            "enrichment.derived_knowledge",
            enrichment.derived_knowledge.len(),
        ),
        ("enrichment.relationships", enrichment.relationships.len()),
        ("enrichment.context_links", enrichment.context_links.len()),
        ("retrieval.plans", retrieval.plans.len()),
        ("retrieval.queries", retrieval.queries.len()),
        ("retrieval.artifacts", retrieval.artifacts.len()),
        ("llm.decisions", llm.decisions.len()),
        ("diagnostics.errors", diagnostics.errors.len()),
        ("diagnostics.warnings", diagnostics.warnings.len()),
        (
            "diagnostics.validation_reports",
            diagnostics.validation_reports.len(),
        ),
        ("audit.agent_runs", audit.agent_runs.len()),
        ("audit.diffs", audit.diffs.len()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn namespace_round_trips_by_name() {
        for ns in Namespace::ALL {
            assert_eq!(Namespace::from_str(ns.as_str()), Ok(ns));
        }
        assert!(Namespace::from_str("nope").is_err());
    }

    #[test]
    fn data_namespaces_exclude_bookkeeping() {
        assert!(Namespace::Reasoning.is_data());
        assert!(Namespace::Metadata.is_data());
        assert!(!Namespace::Diagnostics.is_data());
        assert!(!Namespace::Audit.is_data());
    }

    #[test]
    fn set_field_rejects_unknown_field() {
        let mut ns = ReasoningNs::default();
        assert_eq!(
            ns.set_field("intentz", json!([])),
            Err(FieldError::Unknown)
        );
    }

    #[test]
    fn set_field_rejects_type_mismatch() {
        let mut ns = ReasoningNs::default();
        assert!(matches!(
            ns.set_field("summary", json!({"not": "a string"})),
            Err(FieldError::Type(_))
        ));
    }

    #[test]
    fn metadata_is_read_only_except_locale() {
        let mut md = MetadataNs {
            session_id: "s".into(),
            trace_id: "t".into(),
            created_at: Utc::now(),
            locale: "en-US".into(),
        };
        assert_eq!(
            md.set_field("session_id", json!("other")),
            Err(FieldError::ReadOnly)
        );
        md.set_field("locale", json!("de-DE")).unwrap();
        assert_eq!(md.locale, "de-DE");
    }
}
