//! `prodcards info` command implementation

use colored::Colorize;
use prodcards_foundation::{AppConfig, FrontEnd};

/// Execute the `prodcards info` command
pub fn run(config: &AppConfig) {
    println!();
    println!("  🛍️  Product cards");
    println!();
    println!("  Version: {}", env!("CARGO_PKG_VERSION").yellow());
    println!();

    println!("  {}", "Configuration".bold());
    for (key, value) in config.summary() {
        println!("    {:<22} {}", key, value.cyan());
    }
    println!();

    println!("  {}", "Readiness".bold());
    for (label, front_end) in [("chat", FrontEnd::Console), ("bot", FrontEnd::Telegram)] {
        let problems = config.validate(front_end);
        if problems.is_empty() {
            println!("    {:<6} {}", label, "ready".green());
        } else {
            println!("    {:<6} {}", label, problems.join("; ").red());
        }
    }
    println!();
}
