//! Telegram Bot API client
//!
//! Only the handful of methods the bot uses: `getUpdates` (long polling),
//! `sendMessage` and `sendChatAction`. [`BotApi`] is the seam the handlers
//! talk to, so tests can swap the HTTP client for a recorder.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(String),
    /// The API answered `ok: false`
    #[error("Telegram API error ({code:?}): {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },
    #[error("Decode error: {0}")]
    Decode(String),
}

impl TelegramError {
    /// Telegram could not parse the HTML markup of a message
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Api { description, .. }
            if description.to_lowercase().contains("can't parse entities"))
    }
}

pub type TelegramResult<T> = Result<T, TelegramError>;

// ============================================================================
// Incoming types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

// ============================================================================
// Outgoing types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

impl ReplyKeyboardMarkup {
    /// Lay `labels` out in rows of `row_width`
    pub fn from_labels(labels: &[&str], row_width: usize) -> Self {
        let keyboard = labels
            .chunks(row_width.max(1))
            .map(|row| {
                row.iter()
                    .map(|l| KeyboardButton {
                        text: l.to_string(),
                    })
                    .collect()
            })
            .collect();
        Self {
            keyboard,
            resize_keyboard: true,
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.keyboard
            .iter()
            .flatten()
            .map(|b| b.text.as_str())
            .collect()
    }
}

/// Body of a `sendMessage` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyKeyboardMarkup>,
}

impl OutgoingMessage {
    pub fn plain(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
            reply_markup: None,
        }
    }

    pub fn html(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            ..Self::plain(chat_id, text)
        }
    }

    pub fn with_keyboard(mut self, markup: ReplyKeyboardMarkup) -> Self {
        self.reply_markup = Some(markup);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    Typing,
}

// ============================================================================
// Client
// ============================================================================

#[async_trait]
pub trait BotApi: Send + Sync {
    /// Long-poll for updates with `update_id >= offset`
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> TelegramResult<Vec<Update>>;

    async fn send_message(&self, message: &OutgoingMessage) -> TelegramResult<()>;

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> TelegramResult<()>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

/// Bot API over HTTPS
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> TelegramResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TelegramError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token,
            method
        )
    }

    async fn call<T, B>(&self, method: &str, body: &B) -> TelegramResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            // the URL carries the token, keep it out of error text
            .map_err(|e| TelegramError::Http(e.without_url().to_string()))?;

        let text = resp
            .text()
            .await
            .map_err(|e| TelegramError::Http(e.without_url().to_string()))?;
        let parsed: ApiResponse<T> =
            serde_json::from_str(&text).map_err(|e| TelegramError::Decode(e.to_string()))?;

        if !parsed.ok {
            return Err(TelegramError::Api {
                code: parsed.error_code,
                description: parsed.description.unwrap_or_default(),
            });
        }
        parsed
            .result
            .ok_or_else(|| TelegramError::Decode(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> TelegramResult<Vec<Update>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self.call("getUpdates", &body).await?;
        if !updates.is_empty() {
            debug!("Received {} updates", updates.len());
        }
        Ok(updates)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> TelegramResult<()> {
        let _: serde_json::Value = self.call("sendMessage", message).await?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> TelegramResult<()> {
        let body = serde_json::json!({"chat_id": chat_id, "action": action});
        let _: serde_json::Value = self.call("sendChatAction", &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn keyboard_rows() {
        let markup = ReplyKeyboardMarkup::from_labels(&["a", "b", "c"], 2);
        assert_eq!(markup.keyboard.len(), 2);
        assert_eq!(markup.labels(), vec!["a", "b", "c"]);
        let json = serde_json::to_value(&markup).unwrap();
        assert_eq!(json["keyboard"][1][0]["text"], "c");
        assert_eq!(json["resize_keyboard"], true);
    }

    #[test]
    fn outgoing_message_serialization() {
        let plain = serde_json::to_value(OutgoingMessage::plain(1, "hi")).unwrap();
        assert!(plain.get("parse_mode").is_none());
        let html = serde_json::to_value(OutgoingMessage::html(1, "<b>hi</b>")).unwrap();
        assert_eq!(html["parse_mode"], "HTML");
    }

    #[test]
    fn parse_error_detection() {
        let err = TelegramError::Api {
            code: Some(400),
            description: "Bad Request: can't parse entities: Unsupported start tag".into(),
        };
        assert!(err.is_parse_error());
        assert!(!TelegramError::Http("x".into()).is_parse_error());
    }

    #[tokio::test]
    async fn get_updates_decodes_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getUpdates"))
            .and(body_partial_json(json!({"offset": 5, "timeout": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 5,
                    "message": {"message_id": 1, "chat": {"id": 42, "type": "private"}, "text": "/start"}
                }]
            })))
            .mount(&server)
            .await;

        let client = TelegramClient::new("TOKEN").unwrap().with_base_url(server.uri());
        let updates = client.get_updates(5, 10).await.unwrap();
        assert_eq!(updates.len(), 1);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text.as_deref(), Some("/start"));
    }

    #[tokio::test]
    async fn api_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities"
            })))
            .mount(&server)
            .await;

        let client = TelegramClient::new("TOKEN").unwrap().with_base_url(server.uri());
        let err = client
            .send_message(&OutgoingMessage::html(1, "<b"))
            .await
            .unwrap_err();
        assert!(err.is_parse_error());
    }
}
