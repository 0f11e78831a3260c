//! Orchestrator error types.

use crate::strategy::TaskType;
use axon_types::ProviderError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from the LLM orchestrator.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// The agent's or session's budget does not allow another call.
    /// Returned before any provider is invoked; callers fall back to
    /// rules-only or cache-only behavior.
    #[error("budget exceeded for {agent_id}: spent {spent}, limit {limit}")]
    BudgetExceeded {
        /// The agent that asked for the call.
        agent_id: String,
        /// Relevant spend so far.
        spent: Decimal,
        /// The limit that was hit.
        limit: Decimal,
    },

    /// No model in the fallback chain can fit the context.
    #[error("context of {context_size} tokens exceeds every model in the chain (max {max})")]
    ContextTooLarge {
        /// Tokens the caller needs.
        context_size: usize,
        /// Largest context limit available in the chain.
        max: usize,
    },

    /// No registered, healthy, credentialed provider serves the chain.
    #[error("no healthy provider for task {task_type}")]
    NoHealthyProvider {
        /// The task that could not be served.
        task_type: TaskType,
    },

    /// No strategy covers the requested task type.
    #[error("no strategy for task type {0}")]
    UnknownTaskType(TaskType),

    /// The last provider in the chain failed; passed through verbatim.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
