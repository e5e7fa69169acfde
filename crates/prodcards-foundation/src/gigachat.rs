//! GigaChat backend
//!
//! Two endpoints are involved: the OAuth endpoint exchanging the
//! authorization key for a short-lived access token, and the chat completions
//! endpoint. The token is cached and refreshed shortly before it expires.

use crate::config::AppConfig;
use async_trait::async_trait;
use prodcards_kernel::llm::{
    CompletionBackend, CompletionPayload, CompletionRequest, Generation, GenerationInfo,
    GenerationMessage, InputTokenDetails, LLMError, LLMResult, LlmOutput, TokenUsage,
    UsageMetadata,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_AUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
pub const DEFAULT_BASE_URL: &str = "https://gigachat.devices.sberbank.ru/api/v1";

/// Refresh the token this long before it expires
const TOKEN_REFRESH_MARGIN_MS: i64 = 60_000;

/// GigaChat provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GigaChatConfig {
    /// Base64 authorization key (`client_id:client_secret`)
    pub credentials: String,
    pub client_id: Option<String>,
    /// API scope, e.g. GIGACHAT_API_PERS
    pub scope: String,
    pub default_model: String,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Verify the server's TLS certificate
    pub verify_ssl: bool,
    pub auth_url: String,
    pub base_url: String,
}

impl Default for GigaChatConfig {
    fn default() -> Self {
        Self {
            credentials: String::new(),
            client_id: None,
            scope: "GIGACHAT_API_PERS".to_string(),
            default_model: "GigaChat-Lite".to_string(),
            timeout_secs: 120,
            verify_ssl: false,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl GigaChatConfig {
    pub fn new(credentials: impl Into<String>) -> Self {
        Self {
            credentials: credentials.into(),
            ..Default::default()
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            credentials: config.gigachat_api_key.clone().unwrap_or_default(),
            client_id: config.gigachat_client_id.clone(),
            scope: config.gigachat_scope.clone(),
            default_model: config.gigachat_model.clone(),
            timeout_secs: config.gigachat_timeout_secs,
            verify_ssl: config.gigachat_verify_ssl,
            ..Default::default()
        }
    }

    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    /// Unix epoch, milliseconds
    expires_at: i64,
}

impl AccessToken {
    fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms + TOKEN_REFRESH_MARGIN_MS < self.expires_at
    }
}

/// GigaChat chat completions provider
pub struct GigaChatProvider {
    client: reqwest::Client,
    config: GigaChatConfig,
    token: Mutex<Option<AccessToken>>,
}

impl GigaChatProvider {
    pub fn new(config: GigaChatConfig) -> LLMResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| LLMError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        if !config.verify_ssl {
            debug!("GigaChat TLS certificate verification is disabled");
        }

        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &GigaChatConfig {
        &self.config
    }

    /// Render the error and its source chain so transport causes stay visible
    fn map_error(err: reqwest::Error) -> LLMError {
        let mut detail = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }

        if err.is_timeout() {
            LLMError::Timeout(detail)
        } else if err.is_connect() || err.is_request() {
            LLMError::NetworkError(detail)
        } else {
            LLMError::Other(detail)
        }
    }

    async fn access_token(&self) -> LLMResult<String> {
        let mut cached = self.token.lock().await;
        let now_ms = chrono::Utc::now().timestamp_millis();
        if let Some(token) = cached.as_ref()
            && token.is_fresh(now_ms)
        {
            return Ok(token.value.clone());
        }

        if self.config.credentials.is_empty() {
            return Err(LLMError::ConfigError(
                "GigaChat authorization key is not set".to_string(),
            ));
        }

        debug!("Requesting GigaChat access token (scope {})", self.config.scope);
        let resp = self
            .client
            .post(&self.config.auth_url)
            .header("Authorization", format!("Basic {}", self.config.credentials))
            .header("RqUID", uuid::Uuid::new_v4().to_string())
            .header("Accept", "application/json")
            .form(&[("scope", self.config.scope.as_str())])
            .send()
            .await
            .map_err(Self::map_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Self::map_error)?;
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(LLMError::AuthError(text));
        }
        if !status.is_success() {
            return Err(LLMError::ApiError {
                code: Some(status.as_u16().to_string()),
                message: text,
            });
        }

        let parsed: OAuthResponse =
            serde_json::from_str(&text).map_err(|e| LLMError::SerializationError(e.to_string()))?;
        let token = AccessToken {
            value: parsed.access_token,
            expires_at: parsed.expires_at,
        };
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    fn into_payload(parsed: ChatResponse, fallback_model: &str) -> CompletionPayload {
        let choice = parsed.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let content = choice.map(|c| c.message.content).unwrap_or_default();

        let token_usage = parsed.usage.as_ref().map(|u| TokenUsage {
            prompt_tokens: Some(u.prompt_tokens),
            completion_tokens: Some(u.completion_tokens),
            total_tokens: Some(u.total_tokens),
        });
        let usage_metadata = parsed.usage.as_ref().map(|u| UsageMetadata {
            input_tokens: Some(u.prompt_tokens),
            output_tokens: Some(u.completion_tokens),
            total_tokens: Some(u.total_tokens),
            input_token_details: Some(InputTokenDetails {
                cache_read: Some(u.precached_prompt_tokens.unwrap_or(0)),
            }),
        });

        CompletionPayload {
            text: Some(content.clone()),
            output: None,
            full_generation: vec![Generation {
                text: Some(content.clone()),
                message: Some(GenerationMessage {
                    content: Some(content),
                    usage_metadata,
                }),
                generation_info: Some(GenerationInfo {
                    usage: None,
                    finish_reason,
                }),
            }],
            generation_info: None,
            llm_output: Some(LlmOutput {
                token_usage,
                model_name: Some(parsed.model.unwrap_or_else(|| fallback_model.to_string())),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthResponse {
    access_token: String,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
    #[serde(default)]
    precached_prompt_tokens: Option<u64>,
}

#[async_trait]
impl CompletionBackend for GigaChatProvider {
    fn name(&self) -> &str {
        "gigachat"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn complete(&self, request: CompletionRequest) -> LLMResult<CompletionPayload> {
        let token = self.access_token().await?;

        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": request.prompt}],
            "stream": false,
            "profanity_check": request.profanity_check,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(tp) = request.top_p {
            body["top_p"] = serde_json::json!(tp);
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut builder = self.client.post(&url).bearer_auth(&token).json(&body);
        if let Some(client_id) = &self.config.client_id {
            builder = builder.header("X-Client-ID", client_id);
        }
        let resp = builder.send().await.map_err(Self::map_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Self::map_error)?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!("GigaChat rejected the access token, it will be refreshed");
            self.invalidate_token().await;
            return Err(LLMError::AuthError(text));
        }
        if !status.is_success() {
            return Err(LLMError::ApiError {
                code: Some(status.as_u16().to_string()),
                message: text,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| LLMError::SerializationError(e.to_string()))?;
        Ok(Self::into_payload(parsed, &model))
    }

    async fn health_check(&self) -> LLMResult<bool> {
        self.access_token().await.map(|_| true)
    }
}
