use prodcards_foundation::{AppConfigError, PromptError};
use prodcards_kernel::CatalogError;
use prodcards_kernel::llm::LLMError;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] AppConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("LLM backend error: {0}")]
    Backend(#[from] LLMError),

    #[error("Telegram error: {0}")]
    Telegram(#[from] prodcards_telegram::TelegramError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dialoguer error: {0}")]
    DialoguerError(#[from] dialoguer::Error),

    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    #[error("{0}")]
    Other(String),
}
