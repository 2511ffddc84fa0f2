//! Policy Assistant CLI
//!
//! Indexes company policy documents per tenant and answers questions
//! grounded in them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ChatCommand, IndexCommand, ReconcileCommand, StatsCommand};
use policy_core::{config::AppConfig, logging, AppError};
use std::path::PathBuf;
use std::process::ExitCode;

/// Policy Assistant - multi-tenant retrieval-augmented HR policy chat
#[derive(Parser, Debug)]
#[command(name = "policy")]
#[command(about = "Multi-tenant retrieval-augmented HR policy assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "POLICY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding per-tenant vector indexes
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Document database connection string (sqlite://<dir>)
    #[arg(long, global = true)]
    db_uri: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index a document or a directory of documents for a tenant
    Index(IndexCommand),

    /// Ask a question against a tenant's policies
    Chat(ChatCommand),

    /// Show a tenant's index statistics
    Stats(StatsCommand),

    /// Repair a tenant's stores after an interrupted indexing run
    Reconcile(ReconcileCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    // A local .env may carry the provider credential
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<AppError>() {
            Some(AppError::Config(message)) => {
                eprintln!("Configuration error: {}", message);
                ExitCode::from(2)
            }
            _ => {
                eprintln!("internal error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load base configuration from environment and config file
    let config = AppConfig::load(cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.index_dir,
        cli.db_uri,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.validate()?;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Policy Assistant CLI starting");
    tracing::debug!("Index dir: {:?}", config.index_dir);
    tracing::debug!("Database: {:?}", config.database_path());
    tracing::debug!("Generation model: {}", config.models.generation);

    let command_name = match &cli.command {
        Commands::Index(_) => "index",
        Commands::Chat(_) => "chat",
        Commands::Stats(_) => "stats",
        Commands::Reconcile(_) => "reconcile",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config),
        Commands::Reconcile(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    Ok(result?)
}
