//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--verbose`.
//! The bot also mirrors every line into its log file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber; `log_file` adds a plain-text file sink
pub fn init(verbose: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    // a second init (tests) is not an error
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt::layer())
        .with(file_layer)
        .try_init();
    Ok(())
}
