//! Static model profiles.
//!
//! Profiles describe what each `(provider, model)` pair costs and can
//! do. The table is immutable after construction; hosts may supply
//! their own in place of [`default_profiles`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A `(provider, model)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    /// Provider name, matching [`axon_types::LlmProvider::name`].
    pub provider: String,
    /// Model name in the provider's namespace.
    pub model: String,
}

impl ModelRef {
    /// Create a model reference.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Output quality class of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Good enough for classification and extraction.
    Basic,
    /// General-purpose quality.
    Standard,
    /// Frontier quality for hard reasoning.
    High,
}

/// Latency class of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTier {
    /// Sub-second first token.
    Fast,
    /// Interactive.
    Medium,
    /// Batch-grade.
    Slow,
}

/// What a model supports.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Token streaming.
    pub streaming: bool,
    /// Function/tool calling.
    pub functions: bool,
    /// Image input.
    pub vision: bool,
    /// Extended chain-of-thought output.
    pub chain_of_thought: bool,
}

/// Everything the orchestrator knows about one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProfile {
    /// The model this profile describes.
    pub model: ModelRef,
    /// Quality class.
    pub quality: QualityTier,
    /// Latency class.
    pub speed: SpeedTier,
    /// USD per 1000 tokens (prompt and completion averaged).
    pub cost_per_1k_tokens: Decimal,
    /// Maximum context window in tokens.
    pub context_limit: usize,
    /// Supported capabilities.
    pub capabilities: ModelCapabilities,
    /// Typical time to full response.
    pub avg_latency_ms: u64,
    /// Whether the model runs locally (no credentials, no wire cost).
    pub is_local: bool,
    /// Whether the provider requires credentials.
    pub requires_auth: bool,
}

fn usd_per_1k(milli_cents: i64) -> Decimal {
    // cost expressed in units of $0.00001 to keep the table readable
    Decimal::new(milli_cents, 5)
}

/// The built-in profile table.
pub fn default_profiles() -> Vec<ModelProfile> {
    let remote = |provider: &str,
                  model: &str,
                  quality: QualityTier,
                  speed: SpeedTier,
                  cost: i64,
                  context_limit: usize,
                  latency: u64| ModelProfile {
        model: ModelRef::new(provider, model),
        quality,
        speed,
        cost_per_1k_tokens: usd_per_1k(cost),
        context_limit,
        capabilities: ModelCapabilities {
            streaming: true,
            functions: true,
            vision: false,
            chain_of_thought: quality == QualityTier::High,
        },
        avg_latency_ms: latency,
        is_local: false,
        requires_auth: true,
    };

    vec![
        remote(
            "openai",
            "gpt-4o",
            QualityTier::High,
            SpeedTier::Medium,
            500,
            128_000,
            2_400,
        ),
        remote(
            "openai",
            "gpt-4o-mini",
            QualityTier::Standard,
            SpeedTier::Fast,
            15,
            128_000,
            900,
        ),
        remote(
            "openai",
            "gpt-3.5-turbo",
            QualityTier::Basic,
            SpeedTier::Fast,
            50,
            16_385,
            700,
        ),
        remote(
            "anthropic",
            "claude-3-5-sonnet",
            QualityTier::High,
            SpeedTier::Medium,
            300,
            200_000,
            2_100,
        ),
        remote(
            "anthropic",
            "claude-3-haiku",
            QualityTier::Basic,
            SpeedTier::Fast,
            25,
            200_000,
            650,
        ),
        ModelProfile {
            model: ModelRef::new("ollama", "llama3"),
            quality: QualityTier::Basic,
            speed: SpeedTier::Slow,
            cost_per_1k_tokens: Decimal::ZERO,
            context_limit: 8_192,
            capabilities: ModelCapabilities {
                streaming: true,
                ..ModelCapabilities::default()
            },
            avg_latency_ms: 4_500,
            is_local: true,
            requires_auth: false,
        },
    ]
}
