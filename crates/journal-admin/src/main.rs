//! `journal-admin`: index lifecycle and search commands for journal entries.

mod commands;
mod config;

use clap::Parser;

use crate::config::AdminConfig;

fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "helios_journal_search={0},journal_admin={0}",
            level
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AdminConfig::parse();

    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let output = commands::run(&config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
