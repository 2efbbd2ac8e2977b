//! skaff CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments / unknown task
//! - 3: Aborted by the operator
//! - 4: Action failure escalated by abort_on_fail

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod discovery;

use commands::{Cli, Commands};

pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const UNKNOWN_TASK: u8 = 2;
    pub const ABORTED: u8 = 3;
    pub const ACTION_FAILURE: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "skaff=debug" } else { "skaff=info" };
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(
            EnvFilter::from_default_env()
                .add_directive(default_level.parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // logging already initialized, continue
    }

    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::List(args) => commands::list::execute(args).await,
        Commands::Run(args) => commands::run::execute(args, quiet).await,
        Commands::Render(args) => commands::render::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// Categorize error to determine exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    let message = e.to_string();
    if message.starts_with("Task not found") {
        ExitCodes::UNKNOWN_TASK
    } else if message.starts_with("Aborted") {
        ExitCodes::ABORTED
    } else if message.contains("action") || message.contains("Command") {
        ExitCodes::ACTION_FAILURE
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
