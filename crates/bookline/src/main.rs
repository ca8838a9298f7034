// SPDX-FileCopyrightText: 2026 Bookline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bookline - appointment-notification scheduling and deduplication service.
//!
//! This is the binary entry point for the Bookline notifier.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod check;
mod serve;

/// Bookline - appointment-notification scheduling and deduplication service.
#[derive(Parser, Debug)]
#[command(name = "bookline", version, about, long_about = None)]
struct Cli {
    /// Extra TOML config file layered over the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the notification pipeline.
    Serve,
    /// Load and validate configuration, then exit.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match bookline_config::load_and_validate_with(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            bookline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config, cli.config).await {
                eprintln!("bookline serve failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Check) => check::run_check(&config),
        None => {
            println!("bookline: use --help for available commands");
        }
    }
}
