//! Long-polling loop

use crate::api::{BotApi, TelegramResult, Update};
use crate::handlers::BotHandlers;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Long-poll timeout passed to `getUpdates`
pub const POLL_TIMEOUT_SECS: u64 = 10;

/// Pause after a failed poll
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub struct BotRunner {
    api: Arc<dyn BotApi>,
    handlers: BotHandlers,
    offset: i64,
}

impl BotRunner {
    pub fn new(api: Arc<dyn BotApi>, handlers: BotHandlers) -> Self {
        Self {
            api,
            handlers,
            offset: 0,
        }
    }

    /// Next `update_id` to ask for
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Fetch one batch and handle it in order; returns the number of updates seen.
    pub async fn poll_once(&mut self) -> TelegramResult<usize> {
        let updates = self.api.get_updates(self.offset, POLL_TIMEOUT_SECS).await?;
        self.handle_batch(&updates).await;
        Ok(updates.len())
    }

    /// A failing handler is logged and its update is still acknowledged.
    async fn handle_batch(&mut self, updates: &[Update]) {
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            if let Err(e) = self.handlers.handle_update(update).await {
                error!("Failed to handle update {}: {}", update.update_id, e);
            }
        }
    }

    /// Poll until `shutdown` resolves.
    ///
    /// Shutdown interrupts a pending poll or error backoff, but a fetched
    /// batch is always handled to the end.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        info!(
            "Bot started, catalog holds {} products",
            self.handlers.engine().catalog().len()
        );
        tokio::pin!(shutdown);

        loop {
            let fetched = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = self.api.get_updates(self.offset, POLL_TIMEOUT_SECS) => result,
            };

            match fetched {
                Ok(updates) => self.handle_batch(&updates).await,
                Err(e) => {
                    warn!("Polling failed: {}, retrying in {:?}", e, ERROR_BACKOFF);
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        info!("Shutdown requested, stopping bot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Chat, ChatAction, Message, OutgoingMessage, TelegramError};
    use crate::handlers::BotSettings;
    use async_trait::async_trait;
    use prodcards_foundation::{CardGenerator, PromptTemplate, SearchEngine};
    use prodcards_kernel::Catalog;
    use prodcards_kernel::llm::{
        CompletionBackend, CompletionPayload, CompletionRequest, LLMResult,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedApi {
        batches: Mutex<VecDeque<TelegramResult<Vec<Update>>>>,
        offsets: Mutex<Vec<i64>>,
        sent: Mutex<Vec<OutgoingMessage>>,
    }

    #[async_trait]
    impl BotApi for ScriptedApi {
        async fn get_updates(&self, offset: i64, _timeout: u64) -> TelegramResult<Vec<Update>> {
            self.offsets.lock().unwrap().push(offset);
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => batch,
                None => {
                    // idle long poll
                    tokio::time::sleep(Duration::from_secs(POLL_TIMEOUT_SECS)).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn send_message(&self, message: &OutgoingMessage) -> TelegramResult<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn send_chat_action(&self, _chat_id: i64, _action: ChatAction) -> TelegramResult<()> {
            Ok(())
        }
    }

    /// Time one card takes to generate
    const GENERATION: Duration = Duration::from_secs(3);

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, _request: CompletionRequest) -> LLMResult<CompletionPayload> {
            tokio::time::sleep(GENERATION).await;
            Ok(CompletionPayload::from_text("CARD TEXT"))
        }
    }

    fn update(id: i64, text: &str) -> Update {
        Update {
            update_id: id,
            message: Some(Message {
                message_id: id,
                chat: Chat { id: 1 },
                from: None,
                text: Some(text.to_string()),
            }),
        }
    }

    fn runner(api: Arc<ScriptedApi>) -> BotRunner {
        let catalog =
            Catalog::from_string_rows(vec!["name"], vec![vec!["Sony Speaker"]]).unwrap();
        let generator = CardGenerator::new(
            Arc::new(EchoBackend),
            PromptTemplate::new("{user_input} {product_data}").unwrap(),
        );
        let handlers = BotHandlers::new(
            api.clone(),
            SearchEngine::new(Arc::new(catalog)),
            generator,
            BotSettings::default(),
        );
        BotRunner::new(api, handlers)
    }

    #[tokio::test(start_paused = true)]
    async fn offset_advances_past_handled_updates() {
        let api = Arc::new(ScriptedApi::default());
        api.batches
            .lock()
            .unwrap()
            .push_back(Ok(vec![update(3, "/start"), update(4, "/help")]));
        let mut runner = runner(api.clone());

        assert_eq!(runner.poll_once().await.unwrap(), 2);
        assert_eq!(runner.offset(), 5);
        assert_eq!(api.sent.lock().unwrap().len(), 2);

        assert_eq!(runner.poll_once().await.unwrap(), 0);
        assert_eq!(api.offsets.lock().unwrap().as_slice(), &[0, 5]);
    }

    #[tokio::test]
    async fn poll_errors_are_returned() {
        let api = Arc::new(ScriptedApi::default());
        api.batches
            .lock()
            .unwrap()
            .push_back(Err(TelegramError::Http("connection refused".into())));
        let mut runner = runner(api);
        assert!(runner.poll_once().await.is_err());
        assert_eq!(runner.offset(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let api = Arc::new(ScriptedApi::default());
        let runner = runner(api);
        tokio::time::timeout(
            Duration::from_secs(1),
            runner.run(tokio::time::sleep(Duration::from_millis(10))),
        )
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_error_backoff() {
        let api = Arc::new(ScriptedApi::default());
        api.batches
            .lock()
            .unwrap()
            .push_back(Err(TelegramError::Http("connection refused".into())));
        let runner = runner(api.clone());

        let started = tokio::time::Instant::now();
        runner
            .run(tokio::time::sleep(Duration::from_secs(1)))
            .await;
        assert!(started.elapsed() < ERROR_BACKOFF);
        assert_eq!(api.offsets.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetched_batch_is_answered_before_stopping() {
        let api = Arc::new(ScriptedApi::default());
        api.batches
            .lock()
            .unwrap()
            .push_back(Ok(vec![update(7, "Sony Speaker")]));
        let runner = runner(api.clone());

        // Shutdown fires while the card is still being generated
        let started = tokio::time::Instant::now();
        runner
            .run(tokio::time::sleep(Duration::from_secs(1)))
            .await;
        assert!(started.elapsed() >= GENERATION);

        let sent = api.sent.lock().unwrap();
        assert!(sent.iter().any(|m| m.text.contains("CARD TEXT")));
        assert_eq!(api.offsets.lock().unwrap().as_slice(), &[0]);
    }
}
