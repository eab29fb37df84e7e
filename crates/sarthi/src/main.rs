// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sarthi - a tiered LLM query router for student chat.
//!
//! This is the binary entry point. Every subcommand loads and validates the
//! configuration first; invalid configuration is rendered as miette
//! diagnostics and exits with status 1.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod ask;
mod providers;
mod stack;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sarthi_config::SarthiConfig;

/// Sarthi - a tiered LLM query router for student chat.
#[derive(Parser, Debug)]
#[command(name = "sarthi", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Route one message through the provider chain and print the response.
    Ask(ask::AskArgs),
    /// List the provider chain with live quota status.
    Providers {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Manage Sarthi configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Load and validate the configuration.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            sarthi_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Config {
            action: ConfigCommands::Check,
        } => {
            let tiers: std::collections::BTreeSet<u8> =
                config.providers.iter().map(|p| p.tier).collect();
            println!(
                "sarthi: config OK ({} providers across {} tiers)",
                config.providers.len(),
                tiers.len()
            );
            Ok(())
        }
        Commands::Ask(args) => {
            init_tracing(&config.agent.log_level);
            ask::run_ask(&config, args).await
        }
        Commands::Providers { json } => {
            init_tracing(&config.agent.log_level);
            providers::run_providers(&config, json).await
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<&std::path::Path>,
) -> Result<SarthiConfig, Vec<sarthi_config::ConfigError>> {
    match path {
        Some(path) => sarthi_config::load_and_validate_path(path),
        None => sarthi_config::load_and_validate(),
    }
}

/// Initialize tracing-subscriber with an env filter.
///
/// `RUST_LOG` wins when set; otherwise Sarthi crates log at `log_level` and
/// everything else at `warn`. Logs go to stderr so stdout stays parseable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sarthi={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
