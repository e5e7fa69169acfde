//! `prodcards bot` command - run the Telegram bot

use crate::commands::{build_generator, report_invalid};
use crate::error::CliError;
use colored::Colorize;
use prodcards_foundation::{AppConfig, CatalogLoader, FrontEnd, SearchEngine};
use prodcards_telegram::{BotApi, BotHandlers, BotRunner, BotSettings, TelegramClient};
use std::sync::Arc;
use tracing::{info, warn};

/// Execute the `prodcards bot` command
pub async fn run(config: &AppConfig, force_download: bool) -> Result<(), CliError> {
    let problems = config.validate(FrontEnd::Telegram);
    if !problems.is_empty() {
        return Err(report_invalid(&problems));
    }

    info!("Starting product cards bot");
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let mut loader = CatalogLoader::new()?;
    if let Some(delimiter) = config.delimiter() {
        loader = loader.with_delimiter(delimiter);
    }
    let catalog = loader
        .ensure_local(&config.data_dir, &config.catalog_url, force_download)
        .await?;
    let engine = SearchEngine::new(Arc::new(catalog));
    info!("Name column: '{}'", engine.name_column().name);

    let generator = build_generator(config)?;

    let token = config.telegram_bot_token.clone().unwrap_or_default();
    let api: Arc<dyn BotApi> = Arc::new(TelegramClient::new(token)?);
    let settings = BotSettings {
        max_products_display: config.max_products_display,
        temperature: config.gigachat_temperature,
        top_p: config.gigachat_top_p,
    };
    let handlers = BotHandlers::new(api.clone(), engine, generator, settings);

    println!("{} Bot is running. Press Ctrl+C to stop.", "✓".green());
    BotRunner::new(api, handlers)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Bot stopped");
    Ok(())
}
