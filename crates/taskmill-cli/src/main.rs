/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Taskmill CLI - Command-line interface for the taskmill batch scheduler.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// Taskmill - A periodic-batch task scheduler
#[derive(Parser)]
#[command(name = "taskmill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (can also be set via DATABASE_URL environment variable)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scheduler tick: generate, dispatch, execute
    Run {
        /// Batches to dispatch this tick (defaults to the host CPU count)
        #[arg(long)]
        task_num: Option<usize>,
    },
    /// Create or migrate the scheduler tables
    Init,
    /// Bootstrap an empty batch store with the first generation pass
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let database_url = cli.database_url.context(
        "Database URL is required. Set --database-url or DATABASE_URL environment variable",
    )?;

    match cli.command {
        Commands::Run { task_num } => commands::run::run(&database_url, task_num).await?,
        Commands::Init => commands::init::run(&database_url).await?,
        Commands::Seed => commands::seed::run(&database_url).await?,
    }

    Ok(())
}
