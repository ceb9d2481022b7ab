// ABOUTME: Entry point for the rollout CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::RunRequest;
use rollout::config::{self, Config};
use rollout::error::Result;
use rollout::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, mode).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let output = Output::new(mode);

    match cli.command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Templates => {
            let config = load_config(cli.config.as_deref())?;
            commands::templates(&config.registry()?, &output)
        }
        Commands::Run {
            app,
            release,
            template,
            environment,
            auto_approve,
            no_rollback,
            fail,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let request = RunRequest {
                application: app,
                version: release,
                template,
                environment,
                auto_approve,
                no_rollback,
                fail: fail.into_iter().map(Into::into).collect(),
            };
            commands::run(config, request, output).await
        }
    }
}

/// Load an explicit config file, or discover one in the working directory.
fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover_or_default(&env::current_dir()?),
    }
}
