//! TicketForge CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Implement a ticket inside a checked-out repository
//! - `branch`  — Print the branch name a ticket would get
//! - `config`  — Show the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ticketforge",
    about = "TicketForge — turn a ticket into file edits",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Implement a ticket in a working directory
    Run {
        /// File holding the ticket text (reads stdin when omitted or "-")
        ticket: Option<PathBuf>,

        /// Root of the checked-out repository
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Precomputed repository listing (generated when omitted)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Print the result as JSON instead of Markdown
        #[arg(long)]
        json: bool,
    },

    /// Print the branch name derived from a ticket, without calling the model
    Branch {
        /// File holding the ticket text (reads stdin when omitted or "-")
        ticket: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the result
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            ticket,
            workspace,
            context,
            json,
        } => {
            commands::run::run(commands::run::RunArgs {
                ticket,
                workspace,
                context,
                json,
            })
            .await?
        }
        Commands::Branch { ticket } => commands::branch::run(ticket).await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
    }

    Ok(())
}
