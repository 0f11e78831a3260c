//! Pipeline compile and execution errors.

use axon_context::Namespace;
use thiserror::Error;

/// Errors from pipeline compilation and execution.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The dependency graph contains a cycle.
    #[error("pipeline has a dependency cycle involving: {}", agents.join(", "))]
    Cycle {
        /// Agents on the cycle (or unreachable because of it).
        agents: Vec<String>,
    },

    /// An agent depends on an id that is not in the pipeline.
    #[error("agent {agent} depends on unknown agent {dependency}")]
    UnknownDependency {
        /// The agent with the bad edge.
        agent: String,
        /// The missing dependency id.
        dependency: String,
    },

    /// The same agent id appears twice in the configuration.
    #[error("duplicate agent id {0}")]
    DuplicateAgent(String),

    /// Two same-level agents may write the same data namespace.
    #[error(
        "conflicting writers to namespace {namespace} at one level: {}", agents.join(", ")
    )]
    ConflictingWriters {
        /// The contested namespace.
        namespace: Namespace,
        /// The agents that both may write it.
        agents: Vec<String>,
    },

    /// A configured agent id has no registered implementation.
    #[error("no registered agent for id {0}")]
    UnknownAgent(String),

    /// The named workflow is not configured.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// A critical agent failed; the pipeline was aborted.
    #[error("critical agent {agent} failed: {message}")]
    CriticalAgentFailed {
        /// The critical agent.
        agent: String,
        /// Why it failed.
        message: String,
    },
}
