use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use schemashift_common::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_TABLE: &str = "migration_history";
pub const DEFAULT_DATABASE_FILE: &str = "schemashift.db";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file the migrations run against.
    pub path: PathBuf,
    /// Name of the ledger table recording applied migrations.
    pub history_table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_FILE),
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `info` or `schemashift_db=debug`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Check values that serde cannot express.
    ///
    /// The history table name is interpolated into SQL, so it must be a plain
    /// identifier.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(Error::Config("database.path cannot be empty".into()));
        }
        if !is_valid_identifier(&self.database.history_table) {
            return Err(Error::Config(format!(
                "database.history_table is not a valid identifier: {:?}",
                self.database.history_table
            )));
        }
        Ok(())
    }
}

/// Whether `name` can be used unquoted as a SQL table name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}
