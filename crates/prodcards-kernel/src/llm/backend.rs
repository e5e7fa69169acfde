//! Completion backend trait

use super::types::*;
use async_trait::async_trait;

/// A remote service able to turn one prompt into a [`CompletionPayload`].
///
/// Implementations own transport, authentication and the mapping of their
/// native response into the payload shapes. Retrying is not their concern;
/// the card generator wraps every call.
///
/// # Example
///
/// ```rust,ignore
/// use prodcards_kernel::llm::{CompletionBackend, CompletionPayload, CompletionRequest, LLMResult};
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl CompletionBackend for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     async fn complete(&self, request: CompletionRequest) -> LLMResult<CompletionPayload> {
///         Ok(CompletionPayload::from_text(request.prompt))
///     }
/// }
/// ```
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name, used in logs and traces
    fn name(&self) -> &str;

    /// Model used when the request leaves it empty
    fn default_model(&self) -> &str {
        ""
    }

    /// Send one completion request
    async fn complete(&self, request: CompletionRequest) -> LLMResult<CompletionPayload>;

    /// Health check
    async fn health_check(&self) -> LLMResult<bool> {
        Ok(true)
    }
}
