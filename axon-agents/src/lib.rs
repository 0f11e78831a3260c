#![deny(missing_docs)]
//! # axon-agents — the reasoning agents
//!
//! Eight single-responsibility agents behind the
//! [`axon_pipeline::ReasoningAgent`] interface: intent detection,
//! reasoning structure, retrieval planning and execution, context
//! synthesis, inference, validation, and summarization. Rule tables do
//! the deterministic work; the LLM orchestrator is consulted only when
//! the rules are not confident, and budget refusals degrade to
//! rules-only behavior with a warning.
//!
//! [`default_registry`] wires all eight up for one request;
//! [`support::default_validator`] carries the matching permission
//! table.

pub mod executor;
pub mod inference;
pub mod intent;
pub mod planner;
pub mod structure;
pub mod summarize;
pub mod support;
pub mod synthesizer;
pub mod validation;

pub use executor::RetrievalExecutorAgent;
pub use inference::InferenceAgent;
pub use intent::IntentDetectionAgent;
pub use planner::RetrievalPlannerAgent;
pub use structure::ReasoningStructureAgent;
pub use summarize::SummarizationAgent;
pub use support::{default_validator, ids, record_llm_outcome};
pub use synthesizer::ContextSynthesizerAgent;
pub use validation::ValidationAgent;

use axon_llm::LlmOrchestrator;
use axon_pipeline::AgentRegistry;
use axon_types::DataSourceClient;
use std::collections::HashMap;
use std::sync::Arc;

/// Build the standard agent registry for one request.
///
/// `user_message` is the last user message of the request (what intent
/// detection classifies), `sources` the data-source clients available
/// to the retrieval executor.
pub fn default_registry(
    user_message: &str,
    orchestrator: Arc<LlmOrchestrator>,
    sources: HashMap<String, Arc<dyn DataSourceClient>>,
) -> AgentRegistry {
    let default_sources: Vec<String> = sources.keys().cloned().collect();
    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(IntentDetectionAgent::new(
        user_message,
        Arc::clone(&orchestrator),
    )));
    registry.register(Arc::new(ReasoningStructureAgent::new()));
    registry.register(Arc::new(RetrievalPlannerAgent::new(default_sources)));
    registry.register(Arc::new(RetrievalExecutorAgent::new(sources)));
    registry.register(Arc::new(ContextSynthesizerAgent::new()));
    registry.register(Arc::new(InferenceAgent::new(orchestrator)));
    registry.register(Arc::new(ValidationAgent::new()));
    registry.register(Arc::new(SummarizationAgent::new()));
    registry
}
