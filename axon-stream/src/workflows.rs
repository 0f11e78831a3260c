//! The named pipeline workflows.

use axon_pipeline::{AgentSpec, Condition, ExecutionMode, PipelineConfig};
use axon_agents::ids;
use std::collections::HashMap;

/// Named workflow table. Hosts may load their own descriptors from
/// configuration; these three ship built in.
#[derive(Debug, Clone)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, PipelineConfig>,
}

impl WorkflowRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            workflows: HashMap::new(),
        }
    }

    /// The built-in workflows: `sequential_basic`, `parallel_retrieval`,
    /// `conditional_validation`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert("sequential_basic", sequential_basic());
        registry.insert("parallel_retrieval", parallel_retrieval());
        registry.insert("conditional_validation", conditional_validation());
        registry
    }

    /// Add or replace a workflow.
    pub fn insert(&mut self, name: impl Into<String>, config: PipelineConfig) {
        self.workflows.insert(name.into(), config);
    }

    /// Look up a workflow by name.
    pub fn get(&self, name: &str) -> Option<&PipelineConfig> {
        self.workflows.get(name)
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn full_chain() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new(ids::INTENT_DETECTION),
        AgentSpec::new(ids::REASONING_STRUCTURE).after(ids::INTENT_DETECTION),
        AgentSpec::new(ids::RETRIEVAL_PLANNER)
            .after(ids::REASONING_STRUCTURE)
            .when(Condition::HasQueryIntent),
        AgentSpec::new(ids::RETRIEVAL_EXECUTOR)
            .after(ids::RETRIEVAL_PLANNER)
            .when(Condition::HasQueryIntent),
        AgentSpec::new(ids::CONTEXT_SYNTHESIZER).after(ids::RETRIEVAL_EXECUTOR),
        AgentSpec::new(ids::INFERENCE)
            .after(ids::CONTEXT_SYNTHESIZER)
            .after(ids::REASONING_STRUCTURE),
        AgentSpec::new(ids::VALIDATION).after(ids::INFERENCE),
        AgentSpec::new(ids::SUMMARIZATION).after(ids::VALIDATION),
    ]
}

/// The default linear chain: skip retrieval unless a query intent is
/// present, always infer and summarize.
pub fn sequential_basic() -> PipelineConfig {
    PipelineConfig::new(ExecutionMode::Sequential, full_chain())
}

/// The same chain under the parallel scheduler. Levels are mostly
/// single-agent; the fan-out happens inside the retrieval executor,
/// which runs its queries concurrently.
pub fn parallel_retrieval() -> PipelineConfig {
    let mut config = PipelineConfig::new(ExecutionMode::Parallel, full_chain());
    config.critical_agents = vec![ids::INTENT_DETECTION.to_string()];
    config
}

/// A gated variant: retrieval only when a plan exists, validation only
/// for high-stakes runs. Ambiguous requests fall through to a
/// clarification summary without inference.
pub fn conditional_validation() -> PipelineConfig {
    PipelineConfig::new(
        ExecutionMode::Conditional,
        vec![
            AgentSpec::new(ids::INTENT_DETECTION),
            AgentSpec::new(ids::REASONING_STRUCTURE).after(ids::INTENT_DETECTION),
            AgentSpec::new(ids::RETRIEVAL_PLANNER)
                .after(ids::REASONING_STRUCTURE)
                .when(Condition::HasRetrievalPlan),
            AgentSpec::new(ids::VALIDATION)
                .after(ids::RETRIEVAL_PLANNER)
                .when(Condition::HighStakes),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_agents::default_validator;
    use axon_pipeline::compile;

    #[test]
    fn builtin_workflows_compile_against_the_default_permissions() {
        let validator = default_validator();
        let registry = WorkflowRegistry::builtin();
        for name in ["sequential_basic", "parallel_retrieval", "conditional_validation"] {
            let config = registry.get(name).expect("builtin workflow");
            compile(config, &validator).unwrap_or_else(|e| panic!("{name} failed: {e}"));
        }
    }

    #[test]
    fn unknown_workflow_is_absent() {
        assert!(WorkflowRegistry::builtin().get("nope").is_none());
    }
}
