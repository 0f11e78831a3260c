#![deny(missing_docs)]
//! # axon-llm — dynamic LLM orchestration
//!
//! Maps `(task_type, constraints)` to `(provider, model)`: static
//! [`ModelProfile`] and [`ModelSelectionStrategy`] tables drive
//! selection, a [`BudgetTracker`] enforces session and per-agent
//! budgets with emergency degradation, a [`ResponseCache`] serves
//! repeat prompts, and every selection lands in a decision log.
//!
//! The orchestrator never panics on provider trouble: a failed
//! provider falls through to the next model in the chain, and an
//! exhausted chain returns the last provider error verbatim.

pub mod budget;
pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod profile;
pub mod strategy;

pub use budget::{BudgetConstraints, BudgetTracker};
pub use cache::{CacheConfig, CachedResponse, ResponseCache, cache_key};
pub use error::LlmError;
pub use orchestrator::{LlmOrchestrator, LlmOutcome, LlmTask};
pub use profile::{
    ModelCapabilities, ModelProfile, ModelRef, QualityTier, SpeedTier, default_profiles,
};
pub use strategy::{
    CacheFamily, Complexity, ModelSelectionStrategy, TaskType, default_strategies,
};
