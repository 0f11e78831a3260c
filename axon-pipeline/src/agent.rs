//! The agent interface the scheduler executes.
//!
//! Agents are opaque to the DAG compiler: four methods, registered in
//! a table keyed by agent id. Contracts are dotted context paths whose
//! existence rule lives in `axon_context::contract`.

use axon_context::{ContextHandle, ContextViolation};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// An error returned by an agent's `execute`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AgentError {
    /// Transient failure; the scheduler's retry policy decides.
    #[error("retryable: {0}")]
    Retryable(String),

    /// Permanent failure; retrying won't help.
    #[error("fatal: {0}")]
    Fatal(String),

    /// An LLM budget refusal escalated out of the agent. Non-critical
    /// agents handle budget refusals internally; this surfaces only
    /// from critical agents.
    #[error("budget: {0}")]
    Budget(String),

    /// A context write was rejected. Always fatal: the permission
    /// table does not change mid-run.
    #[error(transparent)]
    Violation(#[from] ContextViolation),
}

impl AgentError {
    /// Whether the scheduler may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Retryable(_))
    }
}

/// A single-responsibility reasoning agent.
///
/// Implementations must be idempotent given an identical input
/// context, must only mutate the context through
/// [`ContextHandle::safe_set`] and the diagnostics append methods, and
/// must return promptly when `cancel` fires.
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// The stable agent id the pipeline configuration refers to.
    fn agent_id(&self) -> &str;

    /// Dotted context paths that must be satisfied before this agent
    /// runs.
    fn preconditions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Dotted context paths this agent promises to populate.
    fn postconditions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Do the work.
    async fn execute(
        &self,
        cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError>;
}

/// Registry of agent implementations keyed by id.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn ReasoningAgent>>,
}

impl AgentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its own id.
    pub fn register(&mut self, agent: Arc<dyn ReasoningAgent>) {
        self.agents.insert(agent.agent_id().to_string(), agent);
    }

    /// Look up an agent by id.
    pub fn get(&self, id: &str) -> Option<&Arc<dyn ReasoningAgent>> {
        self.agents.get(id)
    }

    /// Whether an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }
}
