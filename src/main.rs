//! classweave - class unit transformation pipeline
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use classweave::cli::{Cli, Commands};
use classweave::config::ConfigManager;
use classweave::error::WeaveResult;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> WeaveResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("classweave=warn"),
        1 => EnvFilter::new("classweave=info"),
        _ => EnvFilter::new("classweave=debug"),
    };

    // A broken config is reported by the command that needs it
    let json = cli.log_json
        || config_manager
            .load()
            .await
            .is_ok_and(|config| config.general.log_format == "json");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    // Dispatch to command
    match cli.command {
        Commands::Transform(args) => {
            classweave::cli::commands::transform(args, config_manager).await
        }
        Commands::Inspect(args) => classweave::cli::commands::inspect(args).await,
        Commands::Config(args) => {
            classweave::cli::commands::config(args, &config_manager).await
        }
        Commands::Cache(args) => {
            let config = config_manager.load().await?;
            classweave::cli::commands::cache(args, &config).await
        }
    }
}
