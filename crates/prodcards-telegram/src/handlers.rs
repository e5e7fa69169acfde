//! Bot handlers
//!
//! Maps each classified message to its reply. Handlers talk to Telegram only
//! through [`BotApi`], so the whole flow runs against a recorder in tests.

use crate::api::{BotApi, ChatAction, OutgoingMessage, ReplyKeyboardMarkup, TelegramResult, Update};
use crate::commands::{Button, Command, Intent, QuantityRequest, classify};
use crate::format::{self, BotInfo, MAX_MESSAGE_CHARS};
use async_trait::async_trait;
use prodcards_foundation::{
    CardGenerator, CardObserver, CardRequest, CardState, ListingMode, SearchEngine,
};
use prodcards_kernel::Record;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Suggestions shown when a search misses
pub const SUGGESTION_LIMIT: usize = 5;

/// Items listed by the list/category buttons
pub const BUTTON_LIST_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Items listed by `/list`
    pub max_products_display: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            max_products_display: 10,
            temperature: 0.2,
            top_p: 1.0,
        }
    }
}

/// Narrates retry backoff into the chat
struct ChatNarrator<'a> {
    api: &'a dyn BotApi,
    chat_id: i64,
}

#[async_trait]
impl<'a> CardObserver for ChatNarrator<'a> {
    async fn on_state(&self, state: &CardState) {
        if let CardState::Retrying {
            attempt,
            max_attempts,
            wait,
            ..
        } = state
        {
            let text = format::retry_text(attempt + 1, *max_attempts, wait.as_secs());
            if let Err(e) = self
                .api
                .send_message(&OutgoingMessage::plain(self.chat_id, text))
                .await
            {
                warn!("Failed to narrate retry to chat {}: {}", self.chat_id, e);
            }
        }
    }
}

pub struct BotHandlers {
    api: Arc<dyn BotApi>,
    engine: SearchEngine,
    generator: CardGenerator,
    settings: BotSettings,
}

impl BotHandlers {
    pub fn new(
        api: Arc<dyn BotApi>,
        engine: SearchEngine,
        generator: CardGenerator,
        settings: BotSettings,
    ) -> Self {
        Self {
            api,
            engine,
            generator,
            settings,
        }
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    fn main_keyboard() -> ReplyKeyboardMarkup {
        ReplyKeyboardMarkup::from_labels(
            &[
                Button::ProductList.label(),
                Button::Help.label(),
                Button::Headphones.label(),
                Button::Laptops.label(),
            ],
            2,
        )
    }

    fn continue_keyboard() -> ReplyKeyboardMarkup {
        let labels: Vec<&str> = Button::ALL.iter().map(|b| b.label()).collect();
        ReplyKeyboardMarkup::from_labels(&labels, 2)
    }

    fn names(&self, records: &[&Record]) -> Vec<String> {
        records.iter().map(|r| self.engine.name_of(r)).collect()
    }

    /// Send with HTML parse mode, resending as plain text if Telegram rejects the markup
    async fn send(&self, message: OutgoingMessage) -> TelegramResult<()> {
        match self.api.send_message(&message).await {
            Err(e) if e.is_parse_error() && message.parse_mode.is_some() => {
                warn!("HTML rejected for chat {}, resending as plain text", message.chat_id);
                let plain = OutgoingMessage {
                    parse_mode: None,
                    ..message
                };
                self.api.send_message(&plain).await
            }
            other => other,
        }
    }

    async fn send_html(&self, chat_id: i64, text: impl Into<String>) -> TelegramResult<()> {
        self.send(OutgoingMessage::html(chat_id, text)).await
    }

    /// Send `text` in 4096-character chunks
    pub async fn send_long_message(&self, chat_id: i64, text: &str) -> TelegramResult<()> {
        for part in format::split_message(text, MAX_MESSAGE_CHARS) {
            self.send_html(chat_id, part).await?;
        }
        Ok(())
    }

    /// Handle one update; updates without text are ignored
    pub async fn handle_update(&self, update: &Update) -> TelegramResult<()> {
        let Some(message) = &update.message else {
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        self.handle_text(message.chat.id, text).await
    }

    pub async fn handle_text(&self, chat_id: i64, text: &str) -> TelegramResult<()> {
        match classify(text) {
            Intent::Command(Command::Start) => self.cmd_start(chat_id).await,
            Intent::Command(Command::Help) | Intent::Button(Button::Help) => {
                self.cmd_help(chat_id).await
            }
            Intent::Command(Command::Info) => self.cmd_info(chat_id).await,
            Intent::Command(Command::List) => {
                self.show_random_products(chat_id, self.settings.max_products_display)
                    .await
            }
            Intent::Button(Button::ProductList) => {
                self.show_random_products(chat_id, BUTTON_LIST_LIMIT).await
            }
            Intent::Button(Button::CreateAnother) => {
                self.send_html(chat_id, format::CREATE_ANOTHER_TEXT).await
            }
            Intent::Button(Button::Headphones) => {
                self.show_category_products(chat_id, "наушники", "🎧 Наушники", BUTTON_LIST_LIMIT)
                    .await
            }
            Intent::Button(Button::Laptops) => {
                self.show_category_products(chat_id, "ноутбук", "💻 Ноутбуки", BUTTON_LIST_LIMIT)
                    .await
            }
            Intent::Quantity(QuantityRequest {
                quantity,
                category,
                title,
            }) => {
                self.show_category_products(chat_id, category, title, quantity)
                    .await
            }
            Intent::Search(query) if query.is_empty() => Ok(()),
            Intent::Search(query) => self.handle_search(chat_id, &query).await,
        }
    }

    pub async fn cmd_start(&self, chat_id: i64) -> TelegramResult<()> {
        self.send(
            OutgoingMessage::html(chat_id, format::welcome_text())
                .with_keyboard(Self::main_keyboard()),
        )
        .await
    }

    pub async fn cmd_help(&self, chat_id: i64) -> TelegramResult<()> {
        let text = format::help_text(
            self.generator.model(),
            self.engine.catalog().len(),
            self.generator.tracing_enabled(),
        );
        self.send_html(chat_id, text).await
    }

    pub async fn cmd_info(&self, chat_id: i64) -> TelegramResult<()> {
        let info = BotInfo {
            model: self.generator.model().to_string(),
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            tracing_enabled: self.generator.tracing_enabled(),
            products: self.engine.catalog().len(),
            columns: self.engine.catalog().column_count(),
        };
        self.send_html(chat_id, format::info_text(&info)).await
    }

    pub async fn show_random_products(&self, chat_id: i64, limit: usize) -> TelegramResult<()> {
        let sample = self.engine.sample(limit);
        if sample.is_empty() {
            return self
                .send_html(chat_id, format::not_found_text())
                .await;
        }
        let names = self.names(&sample);
        self.send_html(chat_id, format::random_list_text(&names))
            .await
    }

    pub async fn show_category_products(
        &self,
        chat_id: i64,
        category: &str,
        title: &str,
        limit: usize,
    ) -> TelegramResult<()> {
        let found = self.engine.find_many(category, limit, ListingMode::Random);
        if found.is_empty() {
            return self
                .send(OutgoingMessage::plain(chat_id, format::category_empty_text(title)))
                .await;
        }
        let names = self.names(&found);
        self.send_html(chat_id, format::category_list_text(title, &names))
            .await
    }

    async fn handle_search(&self, chat_id: i64, query: &str) -> TelegramResult<()> {
        if let Err(e) = self.api.send_chat_action(chat_id, ChatAction::Typing).await {
            warn!("Failed to send chat action: {}", e);
        }
        self.send(OutgoingMessage::plain(chat_id, format::SEARCHING_TEXT))
            .await?;

        let Some(record) = self.engine.find_one(query) else {
            info!("No product for '{}' (chat {})", query, chat_id);
            return self.handle_not_found(chat_id, query).await;
        };

        let name = self.engine.name_of(record);
        info!("Found '{}' for '{}' (chat {})", name, query, chat_id);
        self.send_html(chat_id, format::found_text(&name)).await?;
        self.generate_and_send_card(chat_id, query, record).await
    }

    async fn handle_not_found(&self, chat_id: i64, query: &str) -> TelegramResult<()> {
        let similar = self
            .engine
            .find_many(query, SUGGESTION_LIMIT, ListingMode::InOrder);
        let text = if similar.is_empty() {
            format::not_found_text()
        } else {
            format::suggestions_text(&self.names(&similar))
        };
        self.send_html(chat_id, text).await
    }

    async fn generate_and_send_card(
        &self,
        chat_id: i64,
        query: &str,
        record: &Record,
    ) -> TelegramResult<()> {
        let request = CardRequest::from_record(query, record);
        let narrator = ChatNarrator {
            api: self.api.as_ref(),
            chat_id,
        };

        match self.generator.generate_observed(&request, &narrator).await {
            Ok(card) => {
                let text = format::card_with_usage(&card.text, &card.usage);
                self.send_long_message(chat_id, &text).await?;
                self.send(
                    OutgoingMessage::html(chat_id, format::continue_text())
                        .with_keyboard(Self::continue_keyboard()),
                )
                .await
            }
            Err(e) => {
                error!("Card generation failed for chat {}: {}", chat_id, e);
                self.send(OutgoingMessage::plain(chat_id, format::FAILURE_TEXT))
                    .await
            }
        }
    }
}
