//! Skyhive CLI Binary
//!
//! Command-line interface for the Bluesky crawl pipeline.

use anyhow::Context;
use clap::Parser;
use skyhive::logging::init_logging;
use skyhive::tooling::cli::{load_config, Cli, CliContext};
use std::process;

async fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = load_config(&cli.workspace, cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_logging(Some(&cli.logging_config(&config.logging)))
        .context("Failed to initialize logging")?;

    let context = CliContext::with_config(cli.workspace.clone(), config)
        .context("Error initializing workspace")?;
    let output = context.execute(&cli.command).await?;
    Ok(output)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
