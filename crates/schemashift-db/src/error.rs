use schemashift_common::Error;
use thiserror::Error;

pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

/// Failures of a migrate or rollback run.
///
/// Every variant that follows a schema change carries the version involved.
/// `HistoryInsert` and `HistoryDelete` mean the schema and the ledger now
/// disagree; nothing is retried or undone automatically.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("failed to create migration history table: {0}")]
    Setup(#[source] Error),

    #[error("failed to read migration history: {0}")]
    HistoryLookup(#[source] Error),

    #[error("migration {version} applied but could not be recorded: {cause}")]
    HistoryInsert {
        version: String,
        #[source]
        cause: Error,
    },

    #[error("migration {version} rolled back but its history record could not be deleted: {cause}")]
    HistoryDelete {
        version: String,
        #[source]
        cause: Error,
    },

    #[error("migration {version} failed: {cause}")]
    MigrationFailed {
        version: String,
        #[source]
        cause: Error,
    },

    #[error("rollback of migration {version} failed: {cause}")]
    RollbackFailed {
        version: String,
        #[source]
        cause: Error,
    },

    #[error("migration version {version} not found in registry")]
    UnknownVersion { version: String },

    #[error("duplicate migration version {version} in registry")]
    DuplicateVersion { version: String },
}

impl MigrationError {
    /// The migration version this failure is about, if any.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::HistoryInsert { version, .. }
            | Self::HistoryDelete { version, .. }
            | Self::MigrationFailed { version, .. }
            | Self::RollbackFailed { version, .. }
            | Self::UnknownVersion { version }
            | Self::DuplicateVersion { version } => Some(version),
            Self::Setup(_) | Self::HistoryLookup(_) => None,
        }
    }
}
