//! Product cards foundation
//!
//! The catalog search + card generation pipeline:
//!
//! ```text
//! raw input -> loader -> Catalog -> schema (once) -> search (per query)
//!           -> Record -> card generator -> card text + usage
//! ```

pub mod card;
pub mod config;
pub mod gigachat;
pub mod loader;
pub mod observability;
pub mod prompt;
pub mod schema;
pub mod search;
pub mod synonyms;

pub use card::{
    CardError, CardGenerator, CardObserver, CardRequest, CardResponse, CardSettings, CardState,
    NoopObserver, RetryPolicy,
};
pub use config::{AppConfig, AppConfigError, FrontEnd};
pub use gigachat::{GigaChatConfig, GigaChatProvider};
pub use loader::{CatalogLoader, CatalogSource};
pub use observability::{CardTracer, GenerationTrace, LangfuseConfig, LangfuseTracer, NoopTracer};
pub use prompt::{PromptError, PromptResult, PromptTemplate};
pub use schema::{NameColumn, ResolutionRule, resolve_name_column};
pub use search::{HARD_LIMIT, ListingMode, RANDOM_WINDOW, SearchEngine, find_many, find_one};
