//! Card generation
//!
//! One card request walks `Built -> Sent -> {Succeeded, Retrying, Failed}`:
//! the prompt is rendered from the template and the matched record, the
//! backend is called through the retry loop, and the payload is reduced to
//! card text plus normalized [`UsageInfo`].

pub mod retry;
pub mod usage;

pub use retry::{BackoffStrategy, RetryPolicy, TRANSIENT_MARKERS};
pub use usage::{UsageShape, normalize_usage};

use crate::observability::{CardTracer, GenerationTrace, NoopTracer};
use crate::prompt::{PromptError, PromptTemplate};
use async_trait::async_trait;
use chrono::Utc;
use prodcards_kernel::Record;
use prodcards_kernel::llm::{
    CompletionBackend, CompletionPayload, CompletionRequest, LLMError, UsageInfo,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{Instrument, debug, info, warn};

/// Card generation errors
#[derive(Debug, Error)]
pub enum CardError {
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),
    /// The request reached the Failed state
    #[error("Card generation failed after {attempts} attempt(s): {source}")]
    Failed { attempts: u32, source: LLMError },
}

impl CardError {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Prompt(_) => 0,
            Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Input of one card request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRequest {
    pub user_input: String,
    /// `key: value` lines of the matched record
    pub product_data: String,
}

impl CardRequest {
    pub fn new(user_input: impl Into<String>, product_data: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            product_data: product_data.into(),
        }
    }

    /// Render every field of `record`, in column order
    pub fn from_record(user_input: impl Into<String>, record: &Record) -> Self {
        Self::new(user_input, record.render_fields())
    }
}

/// A generated card
#[derive(Debug, Clone)]
pub struct CardResponse {
    pub text: String,
    pub usage: UsageInfo,
    /// Raw backend payload, kept for token debugging
    pub payload: CompletionPayload,
    pub attempts: u32,
}

/// Lifecycle of one card request
#[derive(Debug, Clone, PartialEq)]
pub enum CardState {
    /// Prompt rendered
    Built { prompt_chars: usize },
    /// Attempt `attempt` sent to the backend (1-based)
    Sent { attempt: u32 },
    /// Attempt `attempt` failed with a transient error; next try after `wait`
    Retrying {
        attempt: u32,
        max_attempts: u32,
        wait: Duration,
        reason: String,
    },
    Succeeded { attempts: u32 },
    Failed { attempts: u32, reason: String },
}

impl CardState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}

/// Receives every state transition of a card request
#[async_trait]
pub trait CardObserver: Send + Sync {
    async fn on_state(&self, state: &CardState);
}

/// Observer that ignores transitions
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl CardObserver for NoopObserver {
    async fn on_state(&self, _state: &CardState) {}
}

/// Request parameters passed to the backend
#[derive(Debug, Clone)]
pub struct CardSettings {
    /// Empty means the backend default
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub profanity_check: bool,
}

impl Default for CardSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: Some(0.2),
            top_p: Some(1.0),
            profanity_check: true,
        }
    }
}

/// Builds prompts and drives the retry loop against a backend
pub struct CardGenerator {
    backend: Arc<dyn CompletionBackend>,
    template: PromptTemplate,
    settings: CardSettings,
    policy: RetryPolicy,
    tracer: Arc<dyn CardTracer>,
}

impl CardGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, template: PromptTemplate) -> Self {
        Self {
            backend,
            template,
            settings: CardSettings::default(),
            policy: RetryPolicy::default(),
            tracer: Arc::new(NoopTracer),
        }
    }

    pub fn with_settings(mut self, settings: CardSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn CardTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn backend(&self) -> &dyn CompletionBackend {
        self.backend.as_ref()
    }

    /// Model actually sent to the backend
    pub fn model(&self) -> &str {
        if self.settings.model.is_empty() {
            self.backend.default_model()
        } else {
            &self.settings.model
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn tracing_enabled(&self) -> bool {
        self.tracer.is_enabled()
    }

    /// Render the final prompt
    pub fn build_prompt(&self, request: &CardRequest) -> String {
        self.template
            .render(&request.user_input, &request.product_data)
    }

    fn completion_request(&self, prompt: String) -> CompletionRequest {
        let mut req = CompletionRequest::new(self.model(), prompt)
            .profanity_check(self.settings.profanity_check);
        req.temperature = self.settings.temperature;
        req.top_p = self.settings.top_p;
        req
    }

    /// Generate a card without observing transitions
    pub async fn generate(&self, request: &CardRequest) -> Result<CardResponse, CardError> {
        self.generate_observed(request, &NoopObserver).await
    }

    /// Generate a card, reporting each state transition to `observer`
    pub async fn generate_observed(
        &self,
        request: &CardRequest,
        observer: &dyn CardObserver,
    ) -> Result<CardResponse, CardError> {
        let started_at = Utc::now();
        let prompt = self.build_prompt(request);
        debug!("Prompt built ({} chars)", prompt.chars().count());
        observer
            .on_state(&CardState::Built {
                prompt_chars: prompt.chars().count(),
            })
            .await;

        let completion = self.completion_request(prompt.clone());
        let result = self.run_with_retry(completion, observer).await;

        let mut trace = GenerationTrace {
            trace_id: uuid::Uuid::new_v4().to_string(),
            backend: self.backend.name().to_string(),
            model: self.model().to_string(),
            user_input: request.user_input.clone(),
            prompt,
            output: None,
            usage: UsageInfo::unavailable(),
            attempts: 0,
            error: None,
            started_at,
            finished_at: Utc::now(),
        };

        match result {
            Ok((payload, attempts)) => {
                let shape = UsageShape::detect(&payload);
                debug!("Token usage read from {}", shape.label());
                let response = CardResponse {
                    text: payload.card_text().to_string(),
                    usage: shape.usage_info(),
                    attempts,
                    payload,
                };
                trace.output = Some(response.text.clone());
                trace.usage = response.usage;
                trace.attempts = attempts;
                self.tracer.record(&trace).await;
                observer.on_state(&CardState::Succeeded { attempts }).await;
                Ok(response)
            }
            Err((error, attempts)) => {
                trace.error = Some(error.to_string());
                trace.attempts = attempts;
                self.tracer.record(&trace).await;
                observer
                    .on_state(&CardState::Failed {
                        attempts,
                        reason: error.to_string(),
                    })
                    .await;
                Err(CardError::Failed {
                    attempts,
                    source: error,
                })
            }
        }
    }

    async fn run_with_retry(
        &self,
        request: CompletionRequest,
        observer: &dyn CardObserver,
    ) -> Result<(CompletionPayload, u32), (LLMError, u32)> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let attempt_span = tracing::info_span!("card.retry_attempt", attempt, max_attempts);
            observer.on_state(&CardState::Sent { attempt }).await;

            match self
                .backend
                .complete(request.clone())
                .instrument(attempt_span.clone())
                .await
            {
                Ok(payload) => {
                    if attempt > 1 {
                        info!("Request succeeded on attempt {}", attempt);
                    }
                    return Ok((payload, attempt));
                }
                Err(error) => {
                    let transient = self.policy.is_transient(&error);
                    if transient && attempt < max_attempts {
                        let wait = self.policy.delay_before(attempt + 1);
                        warn!(
                            "Request failed (attempt {}/{}): {}, retrying in {}s",
                            attempt,
                            max_attempts,
                            error,
                            wait.as_secs()
                        );
                        observer
                            .on_state(&CardState::Retrying {
                                attempt,
                                max_attempts,
                                wait,
                                reason: error.to_string(),
                            })
                            .await;
                        tokio::time::sleep(wait).instrument(attempt_span).await;
                        continue;
                    }

                    if transient {
                        warn!(
                            "Request failed after {} attempts. Last error: {}",
                            attempt, error
                        );
                    } else {
                        warn!("Non-retryable error on attempt {}: {}", attempt, error);
                    }
                    return Err((error, attempt));
                }
            }
        }

        Err((
            LLMError::Other("Retry loop completed without result".into()),
            max_attempts,
        ))
    }
}
