// ABOUTME: Entry point for the deckhand CLI application.
// ABOUTME: Parses arguments, sets up tracing and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{AppContext, load_config};
use deckhand::config;
use deckhand::error::Result;
use deckhand::output::Output;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --verbose selects debug for deckhand.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("deckhand=debug,info")
        } else {
            EnvFilter::new("deckhand=info,warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output_mode());
    let error_output = Output::new(cli.output_mode());

    if let Err(e) = run(cli, output).await {
        error_output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { target, force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, target.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Deploy {
            target,
            preview,
            follow,
        } => {
            let ctx = AppContext::new(load_config(config_path)?)?;
            commands::deploy(ctx, target, preview, follow, output).await
        }
        Commands::Run { force } => {
            let ctx = AppContext::new(load_config(config_path)?)?;
            commands::run(ctx, force, output).await
        }
        Commands::Status { target } => commands::status(load_config(config_path)?, target, output),
        Commands::Logs { build, follow } => {
            commands::logs(load_config(config_path)?, build, follow, output).await
        }
        Commands::Cancel { build } => commands::cancel(load_config(config_path)?, build, output),
        Commands::Teardown {
            target,
            preview,
            all_previews: _,
        } => {
            let ctx = AppContext::new(load_config(config_path)?)?;
            commands::teardown(ctx, target, preview, output).await
        }
        Commands::Ssl { target, action } => {
            let ctx = AppContext::new(load_config(config_path)?)?;
            commands::ssl(ctx, target, action, output).await
        }
    }
}
