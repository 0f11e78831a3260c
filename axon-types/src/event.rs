//! The ordered event channel vocabulary.
//!
//! One request produces one channel of [`Event`]s with a fixed grammar:
//! zero or more `reasoning` events, then zero or more `completion`
//! events, then optionally one `error`, then exactly one `done`. The
//! SSE adapter maps each event to one wire message and translates the
//! final `done` into a literal `data: [DONE]` line.

use crate::chat::CompletionChunk;
use serde::{Deserialize, Serialize};

/// A message on the client-facing event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Progress from the reasoning pipeline.
    Reasoning(ReasoningEvent),
    /// One streamed chunk of the final completion.
    Completion(CompletionChunk),
    /// A fatal error; always followed by `Done`.
    Error {
        /// Stable machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
    /// Stream terminator. Always the last event, emitted exactly once.
    Done {
        /// Whether the run completed without a fatal error.
        success: bool,
    },
}

impl Event {
    /// Whether this is the terminal event.
    pub fn is_done(&self) -> bool {
        matches!(self, Event::Done { .. })
    }
}

/// Payload of a `reasoning` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningEvent {
    /// The workflow being executed.
    pub workflow_name: String,
    /// Human-readable progress message.
    pub message: String,
    /// Pipeline stage (DAG level) the event refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<usize>,
    /// Structured payload (summary, agent decisions) for the caller.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl ReasoningEvent {
    /// A stage-progress event.
    pub fn stage(workflow: impl Into<String>, stage: usize, message: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow.into(),
            message: message.into(),
            stage: Some(stage),
            data: serde_json::Value::Null,
        }
    }

    /// The final summary event of a pipeline run.
    pub fn summary(
        workflow: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            workflow_name: workflow.into(),
            message: message.into(),
            stage: None,
            data,
        }
    }
}
