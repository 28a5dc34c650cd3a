use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "till")]
#[command(about = "Take orders at the register, online or not")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Order-sync endpoint (overrides TILL_ORDER_ENDPOINT)
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit an order; it is buffered locally if the endpoint is unreachable
    #[command(alias = "order")]
    Submit {
        /// Line items as name[:quantity[:price]], e.g. "Burger:2:8.50"
        items: Vec<String>,
        /// Operator taking the order
        #[arg(long, value_name = "NAME")]
        by: Option<String>,
        /// Use this order id instead of generating one
        #[arg(long, value_name = "ID")]
        id: Option<String>,
        /// Output the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show orders waiting in the offline queue
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay the offline queue into the ledger now
    Sync,
    /// List known orders, newest first
    Ledger {
        /// Number of orders to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive register session with connectivity control
    #[command(alias = "shell")]
    Register {
        /// Start in offline mode
        #[arg(long)]
        offline: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
