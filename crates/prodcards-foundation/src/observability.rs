//! Card generation tracing
//!
//! Every card request can be reported to a [`CardTracer`]. The only real
//! sink is Langfuse's batch ingestion endpoint; when its keys are not
//! configured a [`NoopTracer`] is used. Emitting never affects the card.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use prodcards_kernel::llm::UsageInfo;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// One card request as seen by a tracer
#[derive(Debug, Clone, Serialize)]
pub struct GenerationTrace {
    pub trace_id: String,
    pub backend: String,
    pub model: String,
    pub user_input: String,
    pub prompt: String,
    /// Card text; `None` when generation failed
    pub output: Option<String>,
    pub usage: UsageInfo,
    pub attempts: u32,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GenerationTrace {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Receiver of finished card traces
#[async_trait]
pub trait CardTracer: Send + Sync {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn record(&self, trace: &GenerationTrace);
}

/// Tracer that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

#[async_trait]
impl CardTracer for NoopTracer {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn record(&self, _trace: &GenerationTrace) {}
}

/// Langfuse connection settings
#[derive(Debug, Clone)]
pub struct LangfuseConfig {
    pub public_key: String,
    pub secret_key: String,
    /// e.g. https://cloud.langfuse.com
    pub host: String,
    pub timeout_secs: u64,
}

impl LangfuseConfig {
    pub fn new(
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key: secret_key.into(),
            host: host.into(),
            timeout_secs: 10,
        }
    }

    fn ingestion_url(&self) -> String {
        format!("{}/api/public/ingestion", self.host.trim_end_matches('/'))
    }
}

/// Sends a trace-create and a generation-create event per card
pub struct LangfuseTracer {
    client: reqwest::Client,
    config: LangfuseConfig,
}

impl LangfuseTracer {
    pub fn new(config: LangfuseConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn timestamp(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Ingestion batch for one trace
    pub fn batch(trace: &GenerationTrace) -> serde_json::Value {
        let now = Self::timestamp(&Utc::now());
        let generation_id = uuid::Uuid::new_v4().to_string();
        let (level, status) = match &trace.error {
            Some(e) => ("ERROR", Some(e.clone())),
            None => ("DEFAULT", None),
        };

        json!({
            "batch": [
                {
                    "id": uuid::Uuid::new_v4().to_string(),
                    "type": "trace-create",
                    "timestamp": now,
                    "body": {
                        "id": trace.trace_id,
                        "name": "product_card",
                        "input": trace.user_input,
                        "output": trace.output,
                        "metadata": {"backend": trace.backend, "attempts": trace.attempts},
                    }
                },
                {
                    "id": uuid::Uuid::new_v4().to_string(),
                    "type": "generation-create",
                    "timestamp": now,
                    "body": {
                        "id": generation_id,
                        "traceId": trace.trace_id,
                        "name": "card_generation",
                        "model": trace.model,
                        "input": trace.prompt,
                        "output": trace.output,
                        "startTime": Self::timestamp(&trace.started_at),
                        "endTime": Self::timestamp(&trace.finished_at),
                        "usage": {
                            "input": trace.usage.input_tokens,
                            "output": trace.usage.output_tokens,
                            "total": trace.usage.total_tokens,
                            "unit": "TOKENS",
                        },
                        "level": level,
                        "statusMessage": status,
                    }
                }
            ]
        })
    }
}

#[async_trait]
impl CardTracer for LangfuseTracer {
    async fn record(&self, trace: &GenerationTrace) {
        let result = self
            .client
            .post(self.config.ingestion_url())
            .basic_auth(&self.config.public_key, Some(&self.config.secret_key))
            .json(&Self::batch(trace))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!("Langfuse trace {} sent", trace.trace_id);
            }
            Ok(resp) => {
                warn!(
                    "Langfuse rejected trace {}: HTTP {}",
                    trace.trace_id,
                    resp.status()
                );
            }
            Err(e) => warn!("Failed to send Langfuse trace {}: {}", trace.trace_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn trace(error: Option<&str>) -> GenerationTrace {
        let now = Utc::now();
        GenerationTrace {
            trace_id: "trace-1".into(),
            backend: "gigachat".into(),
            model: "GigaChat-Lite".into(),
            user_input: "колонка".into(),
            prompt: "prompt".into(),
            output: error.is_none().then(|| "CARD".to_string()),
            usage: UsageInfo {
                input_tokens: Some(10),
                output_tokens: Some(5),
                total_tokens: Some(15),
                cached_tokens: Some(0),
            },
            attempts: 1,
            error: error.map(str::to_string),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn batch_has_trace_and_generation() {
        let batch = LangfuseTracer::batch(&trace(None));
        let events = batch["batch"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "trace-create");
        assert_eq!(events[1]["type"], "generation-create");
        assert_eq!(events[1]["body"]["traceId"], "trace-1");
        assert_eq!(events[1]["body"]["usage"]["total"], 15);
        assert_eq!(events[1]["body"]["level"], "DEFAULT");
    }

    #[test]
    fn failed_trace_is_error_level() {
        let batch = LangfuseTracer::batch(&trace(Some("Request timeout")));
        assert_eq!(batch["batch"][1]["body"]["level"], "ERROR");
        assert!(batch["batch"][1]["body"]["output"].is_null());
    }

    #[tokio::test]
    async fn posts_to_ingestion_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/ingestion"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(207))
            .expect(1)
            .mount(&server)
            .await;

        let tracer =
            LangfuseTracer::new(LangfuseConfig::new("pk", "sk", server.uri())).unwrap();
        tracer.record(&trace(None)).await;
    }

    #[tokio::test]
    async fn server_errors_are_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tracer =
            LangfuseTracer::new(LangfuseConfig::new("pk", "sk", server.uri())).unwrap();
        tracer.record(&trace(None)).await;
        assert!(!NoopTracer.is_enabled());
    }
}
