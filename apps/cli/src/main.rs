//! # cellar
//!
//! Command-line front end for the Cellar POS store.
//!
//! ## Module Organization
//! ```text
//! cellar/
//! ├── main.rs         ◄─── You are here (parse, log, open store, print)
//! ├── config.rs       ◄─── Database path resolution
//! ├── commands.rs     ◄─── Subcommands and dispatch
//! └── error.rs        ◄─── CLI error type and exit codes
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize Logging (stderr, RUST_LOG or info,cellar*=debug)         │
//! │  2. Parse arguments                                                     │
//! │  3. Resolve database path: --db → CELLAR_DB_PATH → data dir             │
//! │  4. Open store (migrations + default settings)                          │
//! │  5. Run the command, print JSON to stdout                               │
//! │     On failure print the error as JSON to stderr, exit 1 or 2           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;
mod config;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cellar_db::{Database, DbConfig};
use commands::Command;
use config::AppConfig;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "cellar")]
#[command(about = "Cellar POS: inventory ledger and sales for a single store")]
#[command(version)]
#[command(after_help = "Environment:\n  CELLAR_DB_PATH   Database file\n  RUST_LOG         Log filter")]
struct Cli {
    /// Database file (overrides CELLAR_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => report(CliError::from(err)),
        },
        Err(err) => report(err),
    }
}

async fn run(cli: Cli) -> Result<serde_json::Value, CliError> {
    let config = AppConfig::resolve(cli.db)?;
    config.ensure_dirs()?;
    info!(path = %config.database_path.display(), "Opening store");

    let db = Database::new(
        DbConfig::new(&config.database_path).backup_dir(&config.backup_dir),
    )
    .await?;

    let result = commands::execute(&db, &config, cli.command).await;
    db.close().await;
    result
}

fn report(err: CliError) -> ExitCode {
    match serde_json::to_string_pretty(&err) {
        Ok(text) => eprintln!("{text}"),
        Err(_) => eprintln!("{err}"),
    }
    ExitCode::from(err.exit_status())
}

/// Initializes the tracing subscriber on stderr, so stdout stays JSON.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages everywhere
/// - `RUST_LOG=cellar_db=trace` - Trace the store only
/// - Default: `info,cellar=debug,cellar_db=debug,cellar_core=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,cellar=debug,cellar_db=debug,cellar_core=debug,sqlx=warn")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
