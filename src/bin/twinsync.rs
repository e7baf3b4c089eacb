//! twinsync CLI Binary
//!
//! Command-line interface for the twinsync synchronization engine.

use anyhow::Context;
use clap::Parser;
use std::process;
use tracing::{error, info};
use twinsync::cli::{Cli, RunContext};
use twinsync::config::TwinsyncConfig;
use twinsync::logging::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = TwinsyncConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let logging_config = build_logging_config(&cli, &config.logging);
    init_logging(Some(&logging_config)).context("initializing logging")?;
    info!("twinsync starting");

    let context = RunContext::new(config);
    let output = context.execute(&cli.command).await?;
    info!("Command completed successfully");
    println!("{}", output);
    Ok(())
}

/// Build logging configuration from CLI args over the loaded config.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli, loaded: &LoggingConfig) -> LoggingConfig {
    let mut config = loaded.clone();
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.format = format;
    }
    if let Some(output) = cli.log_output {
        config.output = output;
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }
    config
}
