mod cli;
mod commands;
mod config;
mod error;

use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    commands::CommandExecutor,
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("ytscribe={level},ytscribe_extractor={level}"))
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;

    // Command-line flags override file settings.
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(language) = args.language {
        config.language = language;
    }
    if let Some(delay) = args.delay {
        config.base_delay_secs = delay;
    }
    if args.insecure {
        config.insecure = true;
    }
    if args.api_key.is_some() {
        config.api_key = args.api_key;
    }

    let executor = CommandExecutor::new(config)?;

    match args.command {
        Commands::Extract {
            url,
            retry,
            json,
            save_config,
        } => {
            executor
                .extract(&url, retry, json, save_config.as_deref())
                .await?;
        }
        Commands::Languages { url } => {
            executor.languages(&url).await?;
        }
        Commands::Discover {
            channel,
            strategy,
            max_videos,
            max_playlists,
            save,
        } => {
            let limits = ytscribe_extractor::DiscoveryLimits {
                max_videos,
                max_playlists,
            };
            executor
                .discover(&channel, strategy.into(), limits, save.as_deref())
                .await?;
        }
        Commands::Batch { config_file, retry } => {
            executor.batch(&config_file, retry).await?;
        }
        Commands::Configs => {
            executor.list_configs()?;
        }
    }

    Ok(())
}
