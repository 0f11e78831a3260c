//! The LLM provider boundary.
//!
//! Providers live behind `Arc<dyn LlmProvider>` in registries keyed by
//! name, so the trait is object-safe via `async-trait`. Wire adapters
//! (OpenAI, Anthropic, local runtimes) implement it outside the core.

use crate::chat::{CompletionChunk, CompletionRequest, CompletionResponse};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// A pinned, boxed stream of completion chunks.
///
/// Providers must end the stream (return `None`) at end of completion
/// or when the cancellation token fires; an in-band `Err` reports a
/// mid-stream failure and must also be the last item.
pub struct ChunkStream {
    /// The stream of chunks. Consume with `StreamExt::next()`.
    pub receiver: Pin<Box<dyn Stream<Item = Result<CompletionChunk, ProviderError>> + Send>>,
}

impl ChunkStream {
    /// Wrap a stream of chunk results.
    pub fn new(
        stream: impl Stream<Item = Result<CompletionChunk, ProviderError>> + Send + 'static,
    ) -> Self {
        Self {
            receiver: Box::pin(stream),
        }
    }
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream").finish_non_exhaustive()
    }
}

/// An LLM backend.
///
/// Two entry points: [`complete`](LlmProvider::complete) for agent
/// sub-tasks where the orchestrator wants the whole text, and
/// [`stream_completion`](LlmProvider::stream_completion) for the final
/// user-visible completion.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name (`"openai"`, `"anthropic"`, `"local"`, …).
    fn name(&self) -> &str;

    /// Run a completion to the end and return the full response.
    async fn complete(&self, request: CompletionRequest)
    -> Result<CompletionResponse, ProviderError>;

    /// Run a completion as a chunk stream.
    ///
    /// The provider must stop promptly and end the stream when `cancel`
    /// fires.
    async fn stream_completion(
        &self,
        cancel: CancellationToken,
        request: CompletionRequest,
    ) -> Result<ChunkStream, ProviderError>;

    /// Whether the provider is currently able to serve requests.
    async fn check_health(&self) -> bool;
}
