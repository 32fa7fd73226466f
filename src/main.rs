//! # Chat Vault CLI (`chatvault`)
//!
//! The `chatvault` binary drives the service: database initialization, the
//! HTTP server, the legacy id migration, and a stats overview.
//!
//! ## Usage
//!
//! ```bash
//! chatvault --config ./config/chatvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chatvault init` | Create the SQLite database and run schema migrations |
//! | `chatvault serve` | Start the HTTP server |
//! | `chatvault migrate-uuids` | Convert legacy integer primary keys to UUIDs |
//! | `chatvault stats` | Show row counts and embedding coverage |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chat_vault::{config, db, migrate, server, stats};

/// Chat Vault — a chat and document backend with vector-embedding semantic
/// search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/chatvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "chatvault",
    about = "Chat Vault — a chat and document backend with vector-embedding semantic search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/chatvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (users,
    /// chats, messages, documents). Idempotent — running it multiple times
    /// is safe.
    Init,

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// CRUD, upload, and search endpoints.
    Serve,

    /// Convert legacy integer primary keys to UUIDs.
    ///
    /// Databases created before the UUID switch used autoincrement integer
    /// ids. This rebuilds every table with UUID text keys and remaps all
    /// foreign keys in one transaction. No-op if ids are already UUIDs.
    MigrateUuids,

    /// Show row counts, embedding coverage, and database size.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", config.db.path.display());
        }
        Commands::Serve => {
            server::run_server(&config).await?;
        }
        Commands::MigrateUuids => {
            let pool = db::connect(&config).await?;
            let converted = migrate::convert_integer_ids(&pool).await?;
            pool.close().await;
            if converted {
                println!("Converted integer ids to UUIDs.");
            } else {
                println!("Ids are already UUIDs; nothing to do.");
            }
        }
        Commands::Stats => {
            stats::run_stats(&config).await?;
        }
    }

    Ok(())
}
