//! Error types for the protocol boundaries.
//!
//! Subsystem-internal errors (context violations, pipeline compile
//! errors, orchestrator budget errors) live with their subsystems; this
//! module holds the errors that cross a boundary the host implements.

use thiserror::Error;

/// Ingress request validation errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request has no model name.
    #[error("missing model")]
    MissingModel,

    /// The request has no messages.
    #[error("empty messages")]
    EmptyMessages,

    /// A message failed validation.
    #[error("invalid message at index {index}: {reason}")]
    InvalidMessage {
        /// Zero-based index of the offending message.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },
}

impl RequestError {
    /// Stable machine-readable code for the error event payload.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::MissingModel => "missing_model",
            RequestError::EmptyMessages => "empty_messages",
            RequestError::InvalidMessage { .. } => "invalid_message",
        }
    }
}

/// Errors from LLM providers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP or network request failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Provider rate-limited the request.
    #[error("rate limited")]
    RateLimited,

    /// Authentication/authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// Could not parse the provider's response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether retrying this request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::RequestFailed(_)
        )
    }
}

/// Errors from data-source clients.
///
/// Retrieval failures degrade gracefully: the executor records them as
/// warnings, not pipeline errors.
#[non_exhaustive]
#[derive(Debug)]
pub enum RetrievalError {
    /// The named source is not reachable or not registered.
    SourceUnavailable {
        /// The source that could not be queried.
        source: String,
    },

    /// A query ran but failed.
    QueryFailed {
        /// The source the query targeted.
        source: String,
        /// The failure detail.
        message: String,
    },
}

impl std::fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalError::SourceUnavailable { source } => {
                write!(f, "source unavailable: {source}")
            }
            RetrievalError::QueryFailed { source, message } => {
                write!(f, "query failed against {source}: {message}")
            }
        }
    }
}

impl std::error::Error for RetrievalError {}

/// Errors in the client-facing event stream.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StreamFault {
    /// The client went away; the run was canceled.
    #[error("client canceled")]
    ClientCanceled,

    /// The completion stream failed mid-flight.
    #[error("stream failed: {0}")]
    StreamFailed(String),
}

impl StreamFault {
    /// Stable machine-readable code for the error event payload.
    pub fn code(&self) -> &'static str {
        match self {
            StreamFault::ClientCanceled => "client_canceled",
            StreamFault::StreamFailed(_) => "stream_failed",
        }
    }
}
