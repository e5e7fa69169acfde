//! Product cards CLI - console dialogue and Telegram bot

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use prodcards_foundation::{AppConfig, AppConfigError};

fn main() -> anyhow::Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(AppConfigError::Invalid(problems)) => {
            commands::report_invalid(&problems);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let log_file = matches!(cli.command, Commands::Bot { .. }).then(|| config.log_file.as_path());
    logging::init(cli.verbose, log_file)?;

    let rt = tokio::runtime::Runtime::new()?;
    if let Err(e) = rt.block_on(run_command(cli, &config)) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(cli: Cli, config: &AppConfig) -> Result<(), error::CliError> {
    match cli.command {
        Commands::Chat { source, catalog } => commands::chat::run(config, source, catalog).await,
        Commands::Bot { force_download } => commands::bot::run(config, force_download).await,
        Commands::Info => {
            commands::info::run(config);
            Ok(())
        }
    }
}
