//! Task types and model-selection strategies.

use crate::profile::ModelRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The semantic task an agent asks the orchestrator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Classify the user's intent.
    IntentClassification,
    /// Extract named entities from the user message.
    EntityExtraction,
    /// Generate hypotheses for an intent.
    HypothesisGeneration,
    /// Analyze dependencies between hypotheses.
    DependencyAnalysis,
    /// Decide which sources to query.
    RetrievalPlanning,
    /// Normalize a query into a source's dialect.
    QueryNormalization,
    /// Extract facts from raw artifacts.
    FactExtraction,
    /// Derive knowledge by combining facts.
    KnowledgeDerivation,
    /// Map relationships between facts.
    RelationshipMapping,
    /// Draw conclusions from hypotheses and facts.
    Inference,
    /// Weigh conflicting evidence.
    EvidenceEvaluation,
    /// Validate the reasoning state.
    Validation,
    /// Compose the final summary.
    Summarization,
    /// Formulate a clarification question.
    Clarification,
    /// Anything without a dedicated strategy.
    GeneralCompletion,
}

impl TaskType {
    /// All task types, in table order.
    pub const ALL: [TaskType; 15] = [
        TaskType::IntentClassification,
        TaskType::EntityExtraction,
        TaskType::HypothesisGeneration,
        TaskType::DependencyAnalysis,
        TaskType::RetrievalPlanning,
        TaskType::QueryNormalization,
        TaskType::FactExtraction,
        TaskType::KnowledgeDerivation,
        TaskType::RelationshipMapping,
        TaskType::Inference,
        TaskType::EvidenceEvaluation,
        TaskType::Validation,
        TaskType::Summarization,
        TaskType::Clarification,
        TaskType::GeneralCompletion,
    ];

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::IntentClassification => "intent_classification",
            TaskType::EntityExtraction => "entity_extraction",
            TaskType::HypothesisGeneration => "hypothesis_generation",
            TaskType::DependencyAnalysis => "dependency_analysis",
            TaskType::RetrievalPlanning => "retrieval_planning",
            TaskType::QueryNormalization => "query_normalization",
            TaskType::FactExtraction => "fact_extraction",
            TaskType::KnowledgeDerivation => "knowledge_derivation",
            TaskType::RelationshipMapping => "relationship_mapping",
            TaskType::Inference => "inference",
            TaskType::EvidenceEvaluation => "evidence_evaluation",
            TaskType::Validation => "validation",
            TaskType::Summarization => "summarization",
            TaskType::Clarification => "clarification",
            TaskType::GeneralCompletion => "general_completion",
        }
    }

    /// The cache-TTL family this task belongs to.
    pub fn cache_family(&self) -> CacheFamily {
        match self {
            TaskType::IntentClassification
            | TaskType::EntityExtraction
            | TaskType::Clarification => CacheFamily::Classification,
            TaskType::RetrievalPlanning
            | TaskType::QueryNormalization
            | TaskType::FactExtraction
            | TaskType::KnowledgeDerivation
            | TaskType::RelationshipMapping
            | TaskType::Summarization
            | TaskType::GeneralCompletion => CacheFamily::Synthesis,
            TaskType::HypothesisGeneration
            | TaskType::DependencyAnalysis
            | TaskType::Inference
            | TaskType::EvidenceEvaluation
            | TaskType::Validation => CacheFamily::Inference,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache-TTL families; each has its own TTL in the cache config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFamily {
    /// Stable classifications; long TTL.
    Classification,
    /// Synthesis over retrieved data; medium TTL.
    Synthesis,
    /// Inference over live state; short TTL.
    Inference,
}

/// Complexity class of a task, recorded with every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Pattern matching and extraction.
    Simple,
    /// Structured synthesis.
    Moderate,
    /// Multi-step reasoning.
    Complex,
}

impl Complexity {
    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

/// Per-task-type model selection strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelectionStrategy {
    /// The task this strategy covers.
    pub task_type: TaskType,
    /// Complexity class.
    pub complexity: Complexity,
    /// First choice.
    pub default_model: ModelRef,
    /// Second choice.
    pub fallback_1: ModelRef,
    /// Third choice.
    pub fallback_2: ModelRef,
    /// Largest context this strategy accepts before promoting to a
    /// longer-context model.
    pub max_context_size: usize,
    /// Whether responses are deterministic enough to cache at any
    /// temperature.
    pub deterministic: bool,
}

impl ModelSelectionStrategy {
    /// The fallback chain, default first.
    pub fn chain(&self) -> [&ModelRef; 3] {
        [&self.default_model, &self.fallback_1, &self.fallback_2]
    }
}

/// The built-in strategy table, one entry per task type.
pub fn default_strategies() -> Vec<ModelSelectionStrategy> {
    let cheap = |task_type, deterministic| ModelSelectionStrategy {
        task_type,
        complexity: Complexity::Simple,
        default_model: ModelRef::new("openai", "gpt-4o-mini"),
        fallback_1: ModelRef::new("anthropic", "claude-3-haiku"),
        fallback_2: ModelRef::new("ollama", "llama3"),
        max_context_size: 8_000,
        deterministic,
    };
    let standard = |task_type| ModelSelectionStrategy {
        task_type,
        complexity: Complexity::Moderate,
        default_model: ModelRef::new("openai", "gpt-4o-mini"),
        fallback_1: ModelRef::new("anthropic", "claude-3-5-sonnet"),
        fallback_2: ModelRef::new("openai", "gpt-3.5-turbo"),
        max_context_size: 32_000,
        deterministic: false,
    };
    let frontier = |task_type| ModelSelectionStrategy {
        task_type,
        complexity: Complexity::Complex,
        default_model: ModelRef::new("openai", "gpt-4o"),
        fallback_1: ModelRef::new("anthropic", "claude-3-5-sonnet"),
        fallback_2: ModelRef::new("openai", "gpt-4o-mini"),
        max_context_size: 100_000,
        deterministic: false,
    };

    vec![
        cheap(TaskType::IntentClassification, true),
        cheap(TaskType::EntityExtraction, true),
        cheap(TaskType::Clarification, false),
        cheap(TaskType::QueryNormalization, true),
        standard(TaskType::RetrievalPlanning),
        standard(TaskType::FactExtraction),
        standard(TaskType::KnowledgeDerivation),
        standard(TaskType::RelationshipMapping),
        standard(TaskType::Summarization),
        standard(TaskType::GeneralCompletion),
        frontier(TaskType::HypothesisGeneration),
        frontier(TaskType::DependencyAnalysis),
        frontier(TaskType::Inference),
        frontier(TaskType::EvidenceEvaluation),
        frontier(TaskType::Validation),
    ]
}
