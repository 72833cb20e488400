mod cli;
mod commands;
mod config;

use crate::{
    cli::{Args, Commands, LogFormat},
    commands::CommandExecutor,
};
use anyhow::Result;
use clap::Parser;
use std::process;
use tracing::{debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {:#}", e);
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet, args.log_format);

    let config = config::load(args.config.as_deref())?;
    debug!(?config, "Configuration loaded");
    let executor = CommandExecutor::new(config);

    match args.command {
        Commands::Replay {
            scraper,
            file,
            channel,
            url,
            render,
        } => {
            executor
                .replay(&scraper, &file, &channel, url.as_deref(), render)
                .await?;
        }
        Commands::Connect {
            url,
            scraper,
            chatroom_id,
        } => {
            executor
                .connect(&url, scraper.as_deref(), chatroom_id.as_deref())
                .await?;
        }
        Commands::Scrapers => executor.list_scrapers(),
    }

    Ok(())
}

/// Logs go to stderr; stdout carries the wire JSON.
fn init_logging(verbose: bool, quiet: bool, format: LogFormat) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("unichat=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("unichat=info"))
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => subscriber
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(verbose)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
