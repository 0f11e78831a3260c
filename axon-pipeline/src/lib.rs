#![deny(missing_docs)]
//! # axon-pipeline — the reasoning DAG scheduler
//!
//! A declarative [`PipelineConfig`] compiles into levels
//! ([`graph::compile`]): cycles, duplicate ids, unknown dependencies,
//! and same-level writers to one data namespace are rejected up front.
//! The [`ReasoningManager`] then executes the levels — sequentially,
//! in parallel, or conditionally — enforcing agent contracts,
//! retrying with a fixed backoff, rolling back failed runs, and
//! appending every run and diff to the context's audit trail.

pub mod agent;
pub mod config;
pub mod error;
pub mod graph;
pub mod manager;

pub use agent::{AgentError, AgentRegistry, ReasoningAgent};
pub use config::{AgentSpec, Condition, ExecutionMode, PipelineConfig, PipelineOptions};
pub use error::PipelineError;
pub use graph::{CompiledPipeline, compile};
pub use manager::{PipelineReport, ReasoningManager};
