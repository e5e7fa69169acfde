//! Completion request / payload types
//!
//! The remote API reports token usage in different places depending on the
//! backend and its version. [`CompletionPayload`] mirrors every known location
//! as an optional field so a single payload can be deserialized from whichever
//! shape the backend produced; picking the right one is the card generator's
//! job.

use serde::{Deserialize, Serialize};

// ============================================================================
// Request
// ============================================================================

/// One "generate completion from prompt" call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier; empty means the backend default
    pub model: String,
    /// Fully rendered prompt
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Ask the backend to run its content-safety filter
    pub profanity_check: bool,
    /// Always false; cards are generated in one response
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: None,
            top_p: None,
            profanity_check: true,
            stream: false,
        }
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn profanity_check(mut self, enabled: bool) -> Self {
        self.profanity_check = enabled;
        self
    }
}

// ============================================================================
// Payload shapes
// ============================================================================

/// Raw completion result as returned by a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Per-generation results
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub full_generation: Vec<Generation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<GenerationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<LlmOutput>,
}

impl CompletionPayload {
    /// Payload carrying only generated text
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Card text: `text`, else `output`, else empty
    pub fn card_text(&self) -> &str {
        self.text
            .as_deref()
            .or(self.output.as_deref())
            .unwrap_or("")
    }
}

/// One generation inside `full_generation`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<GenerationMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<GenerationInfo>,
}

/// Message attached to a generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

/// Message-level usage (`input_tokens` / `output_tokens` naming)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_details: Option<InputTokenDetails>,
}

impl UsageMetadata {
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none()
            && self.output_tokens.is_none()
            && self.total_tokens.is_none()
            && self.input_token_details.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTokenDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<u64>,
}

/// `generation_info` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Top-level `llm_output` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

/// Completion-level usage (`prompt_tokens` / `completion_tokens` naming)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none() && self.completion_tokens.is_none() && self.total_tokens.is_none()
    }
}

// ============================================================================
// Normalized usage
// ============================================================================

/// Token accounting for one card; `None` means "unavailable"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
}

impl UsageInfo {
    /// All fields unavailable
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_unavailable(&self) -> bool {
        *self == Self::default()
    }

    /// Render a count, or `N/A` when unavailable
    pub fn display(value: Option<u64>) -> String {
        value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// LLM error
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    /// API error
    #[error("API error: {message} (code: {code:?})")]
    ApiError {
        code: Option<String>,
        message: String,
    },
    /// Authentication error
    #[error("Authentication failed: {0}")]
    AuthError(String),
    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Request timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Other error
    #[error("LLM error: {0}")]
    Other(String),
}

/// LLM result type
pub type LLMResult<T> = Result<T, LLMError>;
