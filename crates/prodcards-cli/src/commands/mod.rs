//! Command implementations

pub mod bot;
pub mod chat;
pub mod info;

use crate::error::CliError;
use colored::Colorize;
use prodcards_foundation::{
    AppConfig, CardGenerator, CardTracer, GigaChatConfig, GigaChatProvider, LangfuseTracer,
    NoopTracer, PromptTemplate,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Print every validation problem and fail
pub fn report_invalid(problems: &[String]) -> CliError {
    eprintln!("{}", "Configuration is incomplete:".red().bold());
    for problem in problems {
        eprintln!("  {} {}", "✗".red(), problem);
    }
    eprintln!();
    eprintln!("Set the missing values in .env or the environment and try again.");
    CliError::Other(format!("{} configuration problem(s)", problems.len()))
}

fn tracer(config: &AppConfig) -> Arc<dyn CardTracer> {
    let Some(langfuse) = config.langfuse() else {
        info!("Langfuse tracing disabled");
        return Arc::new(NoopTracer);
    };
    match LangfuseTracer::new(langfuse) {
        Ok(tracer) => {
            info!("Langfuse tracing enabled ({})", config.langfuse_host);
            Arc::new(tracer)
        }
        Err(e) => {
            warn!("Langfuse tracing disabled: {}", e);
            Arc::new(NoopTracer)
        }
    }
}

/// Template, GigaChat backend and tracer wired into a generator
pub fn build_generator(config: &AppConfig) -> Result<CardGenerator, CliError> {
    let template = PromptTemplate::from_file(config.template_path())?;
    let backend = GigaChatProvider::new(GigaChatConfig::from_app_config(config))?;
    info!("GigaChat model: {}", config.gigachat_model);

    Ok(CardGenerator::new(Arc::new(backend), template)
        .with_settings(config.card_settings())
        .with_tracer(tracer(config)))
}
