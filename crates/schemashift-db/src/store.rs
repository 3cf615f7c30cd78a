use chrono::{DateTime, Utc};
use schemashift_common::Result;
use serde::{Deserialize, Serialize};

/// One row of the migration history ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Store-assigned, increasing in application order.
    pub id: i64,
    pub version: String,
    /// Description of the migration at the time it was applied.
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

/// Persistence the migration runner reads and writes through.
///
/// Migrations run their own schema changes against the store they are
/// handed, so implementors expose whatever DDL surface their migrations
/// need on top of these ledger operations.
pub trait SchemaStore {
    /// Create the ledger table if it does not exist yet.
    fn ensure_history_table(&self) -> Result<()>;

    /// Ledger row for `version`, or `None` when it has not been applied.
    fn find_history(&self, version: &str) -> Result<Option<HistoryRecord>>;

    /// The most recently applied row, by insertion order.
    fn latest_history(&self) -> Result<Option<HistoryRecord>>;

    /// Append a row. The store assigns `id` and `applied_at`.
    fn insert_history(&self, version: &str, description: &str) -> Result<()>;

    fn delete_history(&self, id: i64) -> Result<()>;

    /// All ledger rows in insertion order.
    fn list_history(&self) -> Result<Vec<HistoryRecord>>;
}
