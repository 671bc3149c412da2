//! SortIQ CLI - turn messy task lists into prioritized SMART tasks.
//!
//! Every command restores the saved session first, so an expired access
//! token is renewed transparently before the command runs.

mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sortiq_core::config::{Config, StorageBackend};

#[derive(Parser, Debug)]
#[command(name = "sortiq", version, about = "Turn messy task lists into SMART tasks")]
struct Cli {
    /// API base URL (overrides config and SORTIQ_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Keep the session in memory only; nothing is written to disk
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Sign in with the token from an email verification link
    Verify { token: String },
    /// Manage saved tasks
    #[command(subcommand)]
    Tasks(TasksCommand),
    /// Restructure tasks into SMART tasks
    Transform {
        /// One task per argument
        #[arg(required = true)]
        tasks: Vec<String>,
        /// Save the results to your task list
        #[arg(long)]
        save: bool,
        /// Email the results to yourself
        #[arg(long)]
        email: bool,
    },
    /// Store your AI provider API key on your profile
    ApiKey { key: String },
}

#[derive(Subcommand, Debug)]
enum TasksCommand {
    /// List saved tasks
    List,
    /// Save a task
    Save {
        original: String,
        smart: String,
        #[arg(long, default_value = "Medium")]
        priority: String,
    },
    /// Delete a saved task
    Delete { id: i64 },
    /// Change a task's status (e.g. active, completed)
    Status { id: i64, status: String },
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and additionally to a daily file when a log directory
/// is configured. The returned guard must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sortiq.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if cli.ephemeral {
        config.storage = StorageBackend::Memory;
    }

    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(api = %config.api_base_url, storage = %config.storage, "SortIQ starting");

    let result = commands::run(cli.command, &mut config).await;
    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}
