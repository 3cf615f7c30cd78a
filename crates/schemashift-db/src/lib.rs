pub mod builtin;
pub mod error;
pub mod migrations;
pub mod runner;
pub mod sqlite_store;
pub mod store;

pub use error::{MigrationError, MigrationResult};
pub use migrations::{Migration, MigrationRegistry};
pub use runner::{MigrateReport, MigrationState, MigrationStatus, Migrator, RolledBack, StatusReport};
pub use sqlite_store::SqliteSchemaStore;
pub use store::{HistoryRecord, SchemaStore};
