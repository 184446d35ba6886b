//! Parsec CLI - identity search and email validation from the terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{account, export, import, insert, logs, price, search, signal, validate};

/// Parsec - metered identity search and email validation
#[derive(Parser)]
#[command(name = "psc", version, about, long_about = None)]
struct Cli {
    /// Bearer token of the account to act as
    #[arg(long, global = true, env = "PARSEC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision and inspect accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Search identities with a criteria string (given.surname.zip)
    Search {
        /// Criteria string, e.g. "John,Johnny.Doe.30305"
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search identities from an upstream signal (JSON)
    Signal {
        /// Path to signal JSON (reads stdin when omitted)
        file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate one or more email addresses
    Validate {
        /// Addresses to validate
        #[arg(required = true)]
        emails: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the price of an email validation and the account balance
    Price {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Insert identity records from JSON
    Insert {
        /// Path to JSON (reads stdin when omitted)
        file: Option<PathBuf>,
        /// Skip records whose name and zip already exist
        #[arg(long)]
        skip_if_exists: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import identity records from CSV
    Import {
        /// Path to CSV file
        file: PathBuf,
        /// Skip records whose name and zip already exist
        #[arg(long)]
        skip_if_exists: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register, inspect and send result exports
    Export {
        #[command(subcommand)]
        command: export::ExportCommands,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let token = cli.token;
    match cli.command {
        Commands::Account { command } => account::run(command, token),
        Commands::Search { query, json } => search::run(token, &query, json),
        Commands::Signal { file, json } => signal::run(token, file, json),
        Commands::Validate { emails, json } => validate::run(token, emails, json),
        Commands::Price { json } => price::run(token, json),
        Commands::Insert { file, skip_if_exists, json } => {
            insert::run(token, file, skip_if_exists, json)
        }
        Commands::Import { file, skip_if_exists, json } => {
            import::run(token, &file, skip_if_exists, json)
        }
        Commands::Export { command } => export::run(command, token),
        Commands::Logs { command } => logs::run(command),
    }
}
