mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schemashift_config::{ConfigLoader, DatabaseConfig, LogConfig};
use schemashift_db::{Migrator, SqliteSchemaStore, builtin};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemashift", version, about = "Apply and roll back schema migrations")]
struct Cli {
    /// Path to config file (YAML or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database to migrate (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending migrations
    Migrate,
    /// Roll back the most recently applied migration
    Rollback,
    /// Show applied and pending migrations
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let source =
        ConfigLoader::locate(cli.config.as_deref()).context("failed to locate configuration")?;
    let mut config =
        ConfigLoader::load_from(source.as_deref()).context("failed to load configuration")?;
    if let Some(database) = cli.database {
        config.database.path = database;
    }
    init_tracing(&config.log);
    match &source {
        Some(path) => info!("loaded config from {}", path.display()),
        None => debug!("no config file found, using defaults"),
    }
    debug!(
        "history table {} in {}",
        config.database.history_table,
        config.database.path.display()
    );

    let registry = builtin::registry().context("invalid built-in migrations")?;

    match cli.command {
        Command::Migrate => {
            let store = open_store(&config.database)?;
            let report = Migrator::new(&store, &registry)
                .migrate()
                .context("migrate failed")?;
            println!("{}", commands::render_migrate(&report));
        }
        Command::Rollback => {
            let store = open_store(&config.database)?;
            let undone = Migrator::new(&store, &registry)
                .rollback()
                .context("rollback failed")?;
            println!("{}", commands::render_rollback(undone.as_ref()));
        }
        Command::Status { json } => {
            let store = SqliteSchemaStore::open_read_only(
                &config.database.path,
                &config.database.history_table,
            )
            .with_context(|| {
                format!(
                    "failed to open database {}",
                    config.database.path.display()
                )
            })?;
            let report = Migrator::new(&store, &registry)
                .status()
                .context("failed to read migration status")?;
            if json {
                println!("{}", commands::render_status_json(&report)?);
            } else {
                print!("{}", commands::render_status(&report));
            }
        }
    }

    Ok(())
}

fn open_store(config: &DatabaseConfig) -> Result<SqliteSchemaStore> {
    SqliteSchemaStore::from_config(config)
        .with_context(|| format!("failed to open database {}", config.path.display()))
}
