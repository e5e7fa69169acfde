//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Product cards - LLM marketing cards for a product catalog
#[derive(Parser)]
#[command(name = "prodcards")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true, env = "PRODCARDS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Interactive console dialogue over the catalog
    Chat {
        /// Where to load the catalog from; asked interactively when omitted
        #[arg(short, long)]
        source: Option<SourceArg>,

        /// Local catalog file (defaults to DATA_DIR/products.csv)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Run the Telegram bot
    Bot {
        /// Download the catalog even if a local copy exists
        #[arg(long)]
        force_download: bool,
    },

    /// Show the effective configuration
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    /// Local CSV file
    Local,
    /// Public Yandex Disk link
    Yadisk,
}
