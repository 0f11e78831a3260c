#![deny(missing_docs)]
//! # axon-types — shared vocabulary for the axon reasoning gateway
//!
//! This crate defines the protocol boundaries the rest of the workspace
//! composes around:
//!
//! | Boundary | Types | What it does |
//! |----------|-------|-------------|
//! | Ingress | [`CompletionRequest`], [`ChatMessage`] | OpenAI-compatible chat request |
//! | Egress | [`Event`], [`CompletionChunk`] | Ordered event channel to the client |
//! | Model backend | [`LlmProvider`] | Streaming completion provider |
//! | Data backend | [`DataSourceClient`] | Query → artifacts |
//! | Routing | [`ProviderRouter`] | Client model name → provider |
//!
//! Every boundary trait here is object-safe (`async-trait`) because the
//! gateway holds implementations behind `Arc<dyn …>` registries keyed by
//! name. Everything is `serde`-serializable with a stable snake_case wire
//! format; durations serialize as plain millisecond integers and money as
//! decimal strings.

pub mod artifact;
pub mod chat;
pub mod duration;
pub mod error;
pub mod event;
pub mod id;
pub mod provider;
pub mod router;
pub mod source;

pub use artifact::{Artifact, ArtifactContent, ExternalReference};
pub use chat::{
    ChatMessage, ChunkChoice, ChunkDelta, CompletionChunk, CompletionRequest, CompletionResponse,
    Role, TokenUsage,
};
pub use duration::DurationMs;
pub use error::{ProviderError, RequestError, RetrievalError, StreamFault};
pub use event::{Event, ReasoningEvent};
pub use id::{SessionId, TraceId};
pub use provider::{ChunkStream, LlmProvider};
pub use router::{ProviderRouter, StaticRouter};
pub use source::{DataSourceClient, SourceQuery};
