//! flowgen - synthetic transaction flow generator for a payment gateway sandbox
//!
//! Drives authorize / capture / cancel / refund / top-up sequences across many
//! merchant configurations for regression testing of the gateway. Point it at
//! a test environment only: every flow creates real sandbox transactions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use txn_flowgen::cli::commands;
use txn_flowgen::config::Config;

/// Synthetic payment transaction flow generator
#[derive(Parser)]
#[command(name = "flowgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "flowgen.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every configured flow against the gateway
    Run {
        /// Keep running passes until stopped
        #[arg(long)]
        repeat: bool,
    },

    /// Show the planned flow pool and merchant cooldowns
    Plan,

    /// Show current configuration (gateway URL masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("txn_flowgen=info".parse()?))
        .with_target(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Run { repeat } => commands::run(&config, repeat).await,
        Commands::Plan => commands::plan(&config),
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
