//! Token usage normalization
//!
//! Shapes are tried in a fixed order and the first one carrying data wins:
//!
//! 1. message-level `usage_metadata` of a generation
//! 2. `generation_info.usage` (on a generation, then top-level)
//! 3. `llm_output.token_usage`
//!
//! Nothing found is not an error; every field is reported unavailable.
//! Cached tokens only exist in shape 1; the other shapes report zero.

use prodcards_kernel::llm::{CompletionPayload, TokenUsage, UsageInfo, UsageMetadata};

/// Where usage data was found in a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageShape<'a> {
    MessageMetadata(&'a UsageMetadata),
    GenerationInfo(&'a TokenUsage),
    LlmOutput(&'a TokenUsage),
    Missing,
}

impl<'a> UsageShape<'a> {
    /// Locate the first shape that carries usage data
    pub fn detect(payload: &'a CompletionPayload) -> Self {
        if let Some(meta) = payload
            .full_generation
            .iter()
            .filter_map(|g| g.message.as_ref()?.usage_metadata.as_ref())
            .find(|m| !m.is_empty())
        {
            return Self::MessageMetadata(meta);
        }

        let generation_usage = payload
            .full_generation
            .first()
            .and_then(|g| g.generation_info.as_ref()?.usage.as_ref())
            .filter(|u| !u.is_empty())
            .or_else(|| {
                payload
                    .generation_info
                    .as_ref()?
                    .usage
                    .as_ref()
                    .filter(|u| !u.is_empty())
            });
        if let Some(usage) = generation_usage {
            return Self::GenerationInfo(usage);
        }

        if let Some(usage) = payload
            .llm_output
            .as_ref()
            .and_then(|o| o.token_usage.as_ref())
            .filter(|u| !u.is_empty())
        {
            return Self::LlmOutput(usage);
        }

        Self::Missing
    }

    pub fn usage_info(&self) -> UsageInfo {
        match self {
            Self::MessageMetadata(meta) => UsageInfo {
                input_tokens: meta.input_tokens,
                output_tokens: meta.output_tokens,
                total_tokens: meta.total_tokens,
                cached_tokens: Some(
                    meta.input_token_details
                        .as_ref()
                        .and_then(|d| d.cache_read)
                        .unwrap_or(0),
                ),
            },
            Self::GenerationInfo(usage) | Self::LlmOutput(usage) => UsageInfo {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                cached_tokens: Some(0),
            },
            Self::Missing => UsageInfo::unavailable(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MessageMetadata(_) => "usage_metadata",
            Self::GenerationInfo(_) => "generation_info",
            Self::LlmOutput(_) => "llm_output",
            Self::Missing => "none",
        }
    }
}

/// Normalize whatever usage shape the payload carries
pub fn normalize_usage(payload: &CompletionPayload) -> UsageInfo {
    UsageShape::detect(payload).usage_info()
}
