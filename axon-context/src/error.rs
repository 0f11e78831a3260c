//! Typed errors for context operations. None of these panic.

use crate::namespaces::Namespace;
use thiserror::Error;

/// A rejected write against the context.
#[derive(Debug, Clone, Error)]
#[error("context violation by {agent_id} on {namespace}.{key}: {message}")]
pub struct ContextViolation {
    /// The agent that attempted the write.
    pub agent_id: String,
    /// The namespace it targeted.
    pub namespace: Namespace,
    /// The field it targeted.
    pub key: String,
    /// Why the write was rejected.
    pub message: String,
}

/// A size or array limit was exceeded.
#[derive(Debug, Clone, Error)]
#[error("context size limit exceeded: {limit} is {current}, maximum {maximum}")]
pub struct ContextSizeError {
    /// Which limit was hit (`"total_bytes"`, `"namespace_bytes:reasoning"`,
    /// `"array_items:retrieval.artifacts"`).
    pub limit: String,
    /// The observed value.
    pub current: usize,
    /// The configured cap.
    pub maximum: usize,
}

/// Errors from context operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ContextError {
    /// A write was rejected by the validator.
    #[error(transparent)]
    Violation(#[from] ContextViolation),

    /// A size limit was exceeded.
    #[error(transparent)]
    Size(#[from] ContextSizeError),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The snapshot's schema version is not supported.
    #[error("unsupported schema version {found}, supported {supported}")]
    Version {
        /// Version found in the snapshot.
        found: String,
        /// The version this build supports.
        supported: String,
    },

    /// The artifact store rejected an externalization.
    #[error("externalization failed: {0}")]
    Externalization(String),
}
