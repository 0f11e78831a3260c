//! OpenAI-compatible chat completion types.
//!
//! The ingress adapter hands the gateway a [`CompletionRequest`] in the
//! `chat.completions` shape; the gateway streams [`CompletionChunk`]s
//! back in the `chat.completion.chunk` shape. Only the fields the core
//! acts on are modeled; unrecognized request fields are the adapter's
//! problem, not ours.

use crate::error::RequestError;
use serde::{Deserialize, Serialize};

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instruction.
    System,
    /// A human user.
    User,
    /// The assistant.
    Assistant,
    /// A function/tool result message.
    Function,
}

/// One message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Optional author name (OpenAI allows it on function messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Convenience constructor for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    /// Convenience constructor for a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    /// Convenience constructor for an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }
}

/// An OpenAI-compatible chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Target model name. Required, non-empty.
    pub model: String,
    /// Conversation messages. Required, non-empty.
    pub messages: Vec<ChatMessage>,
    /// Whether the client asked for a streamed response.
    #[serde(default)]
    pub stream: bool,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Frequency penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Presence penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Stop sequences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    /// Caller-supplied end-user identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl CompletionRequest {
    /// Minimal request with a model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            temperature: None,
            max_tokens: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop: vec![],
            user: None,
        }
    }

    /// Validate the request against the ingress contract.
    ///
    /// # Errors
    ///
    /// `MissingModel` when `model` is empty, `EmptyMessages` when there
    /// are no messages, `InvalidMessage` when a message has empty content.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.model.trim().is_empty() {
            return Err(RequestError::MissingModel);
        }
        if self.messages.is_empty() {
            return Err(RequestError::EmptyMessages);
        }
        for (index, message) in self.messages.iter().enumerate() {
            if message.content.trim().is_empty() {
                return Err(RequestError::InvalidMessage {
                    index,
                    reason: "empty content".to_string(),
                });
            }
        }
        Ok(())
    }

    /// The content of the last user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Token counts reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens generated for the completion.
    pub completion_tokens: u64,
    /// Prompt plus completion tokens.
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage record; `total_tokens` is derived.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Accumulate another usage record into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A full (non-streamed) completion from a provider. Used by the LLM
/// orchestrator for agent sub-tasks, where the caller needs the whole
/// text at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The model that produced the completion.
    pub model: String,
    /// The completion text.
    pub text: String,
    /// Token accounting.
    pub usage: TokenUsage,
}

/// One streamed chunk, in the OpenAI `chat.completion.chunk` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChunk {
    /// Completion identifier, stable across all chunks of one stream.
    pub id: String,
    /// Always `"chat.completion.chunk"`.
    pub object: String,
    /// Unix timestamp (seconds) of creation.
    pub created: i64,
    /// The model producing the stream.
    pub model: String,
    /// Chunk choices (the gateway always emits exactly one).
    pub choices: Vec<ChunkChoice>,
}

/// One choice inside a streamed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index.
    pub index: u32,
    /// Incremental delta.
    pub delta: ChunkDelta,
    /// Set on the final chunk (`"stop"`, `"length"`, …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// The incremental payload of one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Present on the first chunk of a stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Incremental completion text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl CompletionChunk {
    /// A content-bearing chunk.
    pub fn content(
        id: impl Into<String>,
        created: i64,
        model: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: Some(text.into()),
                },
                finish_reason: None,
            }],
        }
    }

    /// The terminal chunk of a stream.
    pub fn finish(id: impl Into<String>, created: i64, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta::default(),
                finish_reason: Some("stop".to_string()),
            }],
        }
    }

    /// Concatenated delta content of this chunk's choices.
    pub fn content_text(&self) -> String {
        self.choices
            .iter()
            .filter_map(|c| c.delta.content.as_deref())
            .collect()
    }
}
