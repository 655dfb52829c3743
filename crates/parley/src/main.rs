// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - a synchronous chat endpoint over a durable job queue.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod knowledge;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parley_config::ParleyConfig;

/// Parley - a synchronous chat endpoint over a durable job queue.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and the worker pool.
    Serve,
    /// Validate configuration and test the provider connection.
    Check,
    /// Manage retrieval snippets.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeCommands,
    },
}

#[derive(Subcommand, Debug)]
enum KnowledgeCommands {
    /// Store a snippet for prompt context retrieval.
    Add {
        /// Snippet text.
        text: String,
        /// Optional JSON metadata stored with the snippet.
        #[arg(long)]
        metadata: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> ParleyConfig {
    let loaded = match path {
        Some(path) => parley_config::load_and_validate_path(path),
        None => parley_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            parley_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Check) => check::run_check(&config).await,
        Some(Commands::Knowledge {
            action: KnowledgeCommands::Add { text, metadata },
        }) => knowledge::run_add(&config, &text, metadata.as_deref()).await,
        None => {
            println!("parley: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
