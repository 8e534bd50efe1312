//! imgopt CLI - build-time batch image optimizer.
//!
//! Resizes and re-encodes image trees for a static site, mirroring them under
//! an output root and keeping a game-keyed `metadata.json` sidecar.
//!
//! # Usage
//!
//! ```bash
//! # Run the configured batches (screenshots, bento, thumbnails by default)
//! imgopt run
//!
//! # Run one batch and rebuild everything
//! imgopt run --batch bento --no-skip-existing
//!
//! # Optimize an ad-hoc folder
//! imgopt optimize ./images/raw --output public/img/ --width 800 --format avif
//!
//! # View configuration
//! imgopt config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// imgopt - batch image optimizer with game-keyed metadata sidecars.
#[derive(Parser, Debug)]
#[command(name = "imgopt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "IMGOPT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the configured batches in order
    Run(cli::run::RunArgs),

    /// Optimize the given directories as a single ad-hoc batch
    Optimize(cli::optimize::OptimizeArgs),

    /// Print the home page loader data as JSON
    Page(cli::page::PageArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => return Err(e),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `imgopt config path`."
            );
            imgopt_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("imgopt v{}", imgopt_core::VERSION);

    let show_progress = !cli.json_logs && config.logging.format != "json";
    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config, show_progress).await,
        Commands::Optimize(args) => cli::optimize::execute(args, config, show_progress).await,
        Commands::Page(args) => cli::page::execute(args),
        Commands::Config(args) => cli::config::execute(args, cli.config.as_deref()),
    }
}
