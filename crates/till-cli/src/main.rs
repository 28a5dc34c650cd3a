//! Till CLI - a command-line register
//!
//! Orders are submitted live when the order-sync endpoint answers and saved
//! on this device when it does not; `till sync` or the interactive register
//! replays them once the network is back.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::ledger::run_ledger;
use crate::commands::queue::run_queue;
use crate::commands::register::run_register;
use crate::commands::submit::run_submit;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "till=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let endpoint = cli.endpoint.as_deref();

    match cli.command {
        Commands::Submit {
            items,
            by,
            id,
            json,
        } => {
            run_submit(
                &items,
                by.as_deref(),
                id.as_deref(),
                json,
                endpoint,
                &db_path,
            )
            .await?;
        }
        Commands::Queue { json } => run_queue(json, &db_path).await?,
        Commands::Sync => run_sync(endpoint, &db_path).await?,
        Commands::Ledger { limit, json } => run_ledger(limit, json, &db_path).await?,
        Commands::Register { offline } => run_register(offline, endpoint, &db_path).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
