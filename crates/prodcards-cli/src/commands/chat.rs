//! `prodcards chat` command - console dialogue over the catalog

use crate::cli::SourceArg;
use crate::commands::{build_generator, report_invalid};
use crate::error::CliError;
use async_trait::async_trait;
use colored::Colorize;
use dialoguer::Input;
use once_cell::sync::Lazy;
use prodcards_foundation::{
    AppConfig, CardGenerator, CardObserver, CardRequest, CardResponse, CardState, CatalogLoader,
    CatalogSource, FrontEnd, SearchEngine,
};
use prodcards_kernel::Catalog;
use prodcards_kernel::llm::UsageInfo;
use regex::Regex;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Lines that end the dialogue (compared trimmed, lowercased)
pub const EXIT_TOKENS: &[&str] = &["exit", "выход", "quit", "q"];

/// Any of these anywhere in a line makes it a listing request
pub const LISTING_WORDS: &[&str] = &["список", "покажи", "дай", "выведи", "первые", "все"];

pub const DEFAULT_LISTING: usize = 5;
pub const MAX_LISTING: usize = 20;

/// Rows shown after loading
const PREVIEW_ROWS: usize = 5;

/// What one console line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleIntent {
    Exit,
    Empty,
    /// First `n` products in catalog order
    Listing(usize),
    Query(String),
}

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+").expect("number pattern is valid"));

/// First run of digits, saturating on overflow
fn first_number(line: &str) -> Option<usize> {
    NUMBER
        .find(line)
        .map(|m| m.as_str().parse().unwrap_or(usize::MAX))
}

pub fn parse_line(line: &str) -> ConsoleIntent {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleIntent::Empty;
    }
    let lowered = trimmed.to_lowercase();
    if EXIT_TOKENS.contains(&lowered.as_str()) {
        return ConsoleIntent::Exit;
    }
    if LISTING_WORDS.iter().any(|w| lowered.contains(w)) {
        let count = first_number(trimmed).unwrap_or(DEFAULT_LISTING);
        return ConsoleIntent::Listing(count.min(MAX_LISTING));
    }
    ConsoleIntent::Query(trimmed.to_string())
}

/// Prints retry backoff to the console
struct ConsoleNarrator;

#[async_trait]
impl CardObserver for ConsoleNarrator {
    async fn on_state(&self, state: &CardState) {
        if let CardState::Retrying {
            attempt,
            max_attempts,
            wait,
            reason,
        } = state
        {
            println!(
                "{} Attempt {}/{} failed ({}). Retrying in {} s...",
                "⚠️".yellow(),
                attempt,
                max_attempts,
                reason,
                wait.as_secs()
            );
        }
    }
}

fn ask_source() -> Result<SourceArg, CliError> {
    println!("Выберите способ загрузки каталога товаров:");
    println!("1. Загрузить локальный файл (products.csv в папке data)");
    println!("2. Скачать с Яндекс.Диска по ссылке");
    let choice: String = Input::new()
        .with_prompt("Введите 1 или 2")
        .interact_text()?;
    match choice.trim() {
        "1" => Ok(SourceArg::Local),
        "2" => Ok(SourceArg::Yadisk),
        other => Err(CliError::InvalidChoice(other.to_string())),
    }
}

fn resolve_source(
    config: &AppConfig,
    source: SourceArg,
    catalog: Option<PathBuf>,
) -> Result<CatalogSource, CliError> {
    let local = catalog.unwrap_or_else(|| config.catalog_path());
    match source {
        SourceArg::Local => {
            if !local.exists() {
                return Err(CliError::Other(format!(
                    "Catalog file {} not found. Put products.csv into {}",
                    local.display(),
                    config.data_dir.display()
                )));
            }
            Ok(CatalogSource::Local(local))
        }
        SourceArg::Yadisk => {
            if let Some(parent) = local.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Ok(CatalogSource::YandexDisk {
                public_url: config.catalog_url.clone(),
                dest: local,
            })
        }
    }
}

fn print_preview(catalog: &Catalog, engine: &SearchEngine) {
    println!();
    println!("{}", "First products in the catalog:".bold());
    for (i, record) in catalog.head(PREVIEW_ROWS).iter().enumerate() {
        let cells: Vec<String> = record.fields().map(|(_, v)| v.to_string()).collect();
        println!("  {}. {}", i + 1, cells.join(" | "));
    }

    println!();
    println!("{}", "=== Columns ===".bold());
    println!("  {}", catalog.column_names().join(", "));

    let name_column = engine.name_column();
    println!();
    println!(
        "Name column: {} ({:?})",
        name_column.name.cyan(),
        name_column.rule
    );
    for record in engine.head(PREVIEW_ROWS) {
        println!("  {}", engine.name_of(record));
    }
}

fn print_listing(engine: &SearchEngine, count: usize) {
    println!();
    println!("📋 Showing the first {} products:", count);
    for (i, record) in engine.head(count).iter().enumerate() {
        println!("{}. {}", i + 1, engine.name_of(record));
    }
    println!();
    println!(
        "To generate a card, type a product name or a keyword (for example 'ноутбук', 'наушники')"
    );
}

fn print_card(user_input: &str, card: &CardResponse, debug_tokens: bool) {
    println!();
    println!("{}", "• Input:".bold());
    println!("{}", user_input);
    println!();
    println!("{}", "• Assistant:".bold());
    println!("{}", card.text);

    let usage = &card.usage;
    println!();
    println!("{}", "• Token usage:".bold());
    if usage.is_unavailable() {
        println!("  N/A");
    } else {
        println!(
            "  input: {}  output: {}  total: {}",
            UsageInfo::display(usage.input_tokens),
            UsageInfo::display(usage.output_tokens),
            UsageInfo::display(usage.total_tokens)
        );
        if let Some(cached) = usage.cached_tokens.filter(|c| *c > 0) {
            println!("  cached: {}", cached);
        }
    }

    if debug_tokens {
        println!();
        println!("{}", "• Raw payload:".dimmed());
        match serde_json::to_string_pretty(&card.payload) {
            Ok(raw) => println!("{}", raw.dimmed()),
            Err(e) => println!("  (payload not serializable: {})", e),
        }
    }
}

async fn answer(
    engine: &SearchEngine,
    generator: &CardGenerator,
    query: &str,
    debug_tokens: bool,
) {
    let Some(record) = engine.find_one(query) else {
        println!("Assistant: product not found in the catalog. Try another query.");
        return;
    };
    println!("{} {}", "✓ Found:".green(), engine.name_of(record));

    let request = CardRequest::from_record(query, record);
    match generator.generate_observed(&request, &ConsoleNarrator).await {
        Ok(card) => print_card(query, &card, debug_tokens),
        Err(e) => println!("{} Could not generate the card: {}", "✗".red(), e),
    }
}

async fn dialogue(
    engine: &SearchEngine,
    generator: &CardGenerator,
    debug_tokens: bool,
) -> Result<(), CliError> {
    println!();
    println!("{}", "=== Catalog assistant ===".bold());
    println!("(type 'exit' or 'выход' to quit)");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut empty_streak = 0;

    loop {
        print!("User: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_line(&line) {
            ConsoleIntent::Exit => break,
            ConsoleIntent::Empty => {
                empty_streak += 1;
                if empty_streak >= 2 {
                    break;
                }
                continue;
            }
            ConsoleIntent::Listing(count) => print_listing(engine, count),
            ConsoleIntent::Query(query) => answer(engine, generator, &query, debug_tokens).await,
        }
        empty_streak = 0;
    }

    println!();
    println!("👋 Bye!");
    Ok(())
}

/// Execute the `prodcards chat` command
pub async fn run(
    config: &AppConfig,
    source: Option<SourceArg>,
    catalog: Option<PathBuf>,
) -> Result<(), CliError> {
    let problems = config.validate(FrontEnd::Console);
    if !problems.is_empty() {
        return Err(report_invalid(&problems));
    }

    let source = match source {
        Some(s) => s,
        None => ask_source()?,
    };
    let source = resolve_source(config, source, catalog)?;

    let mut loader = CatalogLoader::new()?;
    if let Some(delimiter) = config.delimiter() {
        loader = loader.with_delimiter(delimiter);
    }
    let catalog = loader.load(&source).await?;
    let engine = SearchEngine::new(Arc::new(catalog));
    print_preview(engine.catalog(), &engine);

    let generator = build_generator(config)?;
    dialogue(&engine, &generator, config.debug_tokens).await
}
