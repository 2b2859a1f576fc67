// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lumen - a persistent local image generation queue.
//!
//! This is the binary entry point. `lumen serve` runs the queue worker;
//! the other subcommands inspect and edit the queue database directly.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod history;
mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lumen_core::{HistoryFilter, JobStatus, LumenError};

use crate::commands::{AddArgs, ItemCommand};

/// Lumen - a persistent local image generation queue.
#[derive(Parser, Debug)]
#[command(name = "lumen", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the lookup hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the queue worker until SIGINT/SIGTERM.
    Serve,
    /// Enqueue a generation job and print its id.
    Add {
        /// Text prompt.
        prompt: String,
        /// Model identifier passed to the backend.
        #[arg(long)]
        model: String,
        /// Output image path (defaults to `<id>.png` in the output directory).
        #[arg(long, short)]
        output: Option<String>,
        /// Negative prompt.
        #[arg(long)]
        negative: Option<String>,
        #[arg(long, default_value_t = 512)]
        width: u32,
        #[arg(long, default_value_t = 512)]
        height: u32,
        #[arg(long, default_value_t = 20)]
        steps: u32,
        #[arg(long, default_value_t = 7.0)]
        cfg_scale: f64,
        /// Fixed seed. Omit for a random one.
        #[arg(long, allow_negative_numbers = true)]
        seed: Option<i64>,
        /// Theme tag for history filtering.
        #[arg(long)]
        theme: Option<String>,
        /// Template tag for history filtering.
        #[arg(long)]
        template: Option<String>,
        /// Template value as `key=value`. Repeatable.
        #[arg(long = "value", value_name = "KEY=VALUE")]
        values: Vec<String>,
        /// Also produce a transparent-background copy.
        #[arg(long)]
        remove_background: bool,
        /// Print the queued item as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List queue items, oldest first.
    List {
        /// Only items with this status (pending, generating, complete, failed).
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long)]
        json: bool,
    },
    /// Show queue counts and the job currently generating.
    Status {
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Remove a pending item before it starts.
    Cancel { id: String },
    /// Requeue a failed item.
    Retry { id: String },
    /// Delete a finished item from the queue. History is kept.
    Remove { id: String },
    /// Show completed generations, newest first.
    History {
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        template: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long)]
        offset: Option<u32>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => lumen_config::load_and_validate_path(path),
        None => lumen_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            lumen_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.app.log_level);

    let Some(command) = cli.command else {
        println!("lumen: use --help for available commands");
        return ExitCode::SUCCESS;
    };

    match dispatch(&config, command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run one subcommand. `Ok(false)` means an item command did not apply.
async fn dispatch(
    config: &lumen_config::LumenConfig,
    command: Commands,
) -> Result<bool, LumenError> {
    match command {
        Commands::Serve => serve::run_serve(config.clone()).await?,
        Commands::Add {
            prompt,
            model,
            output,
            negative,
            width,
            height,
            steps,
            cfg_scale,
            seed,
            theme,
            template,
            values,
            remove_background,
            json,
        } => {
            let args = AddArgs {
                prompt,
                model,
                output,
                negative_prompt: negative,
                width,
                height,
                steps,
                cfg_scale,
                seed,
                theme,
                template,
                values,
                remove_background,
            };
            commands::run_add(config, args, json).await?;
        }
        Commands::List { status, json } => commands::run_list(config, status, json).await?,
        Commands::Status { json, plain } => status::run_status(config, json, plain).await?,
        Commands::Cancel { id } => {
            return commands::run_item_command(config, ItemCommand::Cancel, &id).await;
        }
        Commands::Retry { id } => {
            return commands::run_item_command(config, ItemCommand::Retry, &id).await;
        }
        Commands::Remove { id } => {
            return commands::run_item_command(config, ItemCommand::Remove, &id).await;
        }
        Commands::History {
            theme,
            template,
            limit,
            offset,
            json,
        } => {
            let filter = HistoryFilter {
                theme_id: theme,
                template_id: template,
                limit: Some(limit),
                offset,
            };
            history::run_history(config, filter, json).await?;
        }
    }
    Ok(true)
}

/// Initializes the tracing subscriber. Logs go to stderr so `--json` output stays clean.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lumen={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
