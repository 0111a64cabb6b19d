//! CLI module — command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod config;
pub mod sessions;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "parlance")]
#[command(version)]
#[command(about = "Inspect and maintain parlance conversation sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Show or validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List the slash commands available in a conversation
    Hooks,
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List stored sessions, most recently active first
    List,
    /// Show one session's history
    Show {
        /// Session id or name
        session: String,
        /// Show only the last N messages
        #[arg(long)]
        last: Option<usize>,
    },
    /// Delete a stored session
    Delete {
        /// Session id or name
        session: String,
    },
    /// Export a session's history as JSON
    Export {
        /// Session id or name
        session: String,
        /// Output file
        #[arg(long, short)]
        output: std::path::PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file
    Check,
    /// Print the effective configuration (file, env overrides, defaults)
    Show,
}

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    // Load config early so we can respect the logging settings; fall back to
    // defaults if the config file is missing or unreadable.
    let logging_cfg = parlance::config::Config::load()
        .map(|c| c.logging)
        .unwrap_or_default();
    parlance::utils::logging::init_logging(&logging_cfg)?;

    let cli = Cli::parse();

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            println!("parlance {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Sessions { action }) => {
            sessions::cmd_sessions(action).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(action).await?;
        }
        Some(Commands::Hooks) => {
            sessions::cmd_hooks().await?;
        }
    }

    Ok(())
}
