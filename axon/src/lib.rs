#![deny(missing_docs)]
//! # axon — an OpenAI-compatible reasoning gateway core
//!
//! Clients send chat-completion requests; a multi-agent reasoning
//! pipeline enriches the request over a namespaced blackboard, a
//! dynamic LLM orchestrator picks a model per sub-task under budget,
//! and the downstream completion streams back interleaved with
//! reasoning events.
//!
//! This crate re-exports the workspace by feature:
//!
//! | feature | crates |
//! |---------|--------|
//! | `core` (default) | [`types`], [`context`] |
//! | `llm` | adds [`llm`] |
//! | `pipeline` | adds [`pipeline`] |
//! | `agents` | adds [`agents`] |
//! | `stream` / `full` | adds [`stream`] |
//!
//! ```ignore
//! use axon::stream::StreamingCoordinator;
//! use axon::types::{ChatMessage, CompletionRequest};
//!
//! let rx = coordinator.process_request(
//!     CompletionRequest::new("gpt-4o", vec![ChatMessage::user("hi")]),
//!     "sequential_basic",
//!     cancel,
//! )?;
//! ```

#[cfg(feature = "core")]
pub use axon_context as context;
#[cfg(feature = "core")]
pub use axon_types as types;

#[cfg(feature = "llm")]
pub use axon_llm as llm;

#[cfg(feature = "pipeline")]
pub use axon_pipeline as pipeline;

#[cfg(feature = "agents")]
pub use axon_agents as agents;

#[cfg(feature = "stream")]
pub use axon_stream as stream;
