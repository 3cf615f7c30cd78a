use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use schemashift_common::{Error, Result};
use schemashift_config::DatabaseConfig;
use schemashift_config::model::is_valid_identifier;
use tracing::{debug, info};

use crate::migrations::Migration;
use crate::store::{HistoryRecord, SchemaStore};

/// SQLite-backed schema store. Migrations run DDL through
/// [`SqliteSchemaStore::execute_batch`] and the ledger lives in
/// `history_table`.
pub struct SqliteSchemaStore {
    conn: Mutex<Connection>,
    history_table: String,
}

impl SqliteSchemaStore {
    pub fn open(db_path: &Path, history_table: &str) -> Result<Self> {
        info!("opening schema store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Self::with_connection(conn, history_table)
    }

    /// Open an existing database without creating it or changing its
    /// journal mode. Writes through this store fail.
    pub fn open_read_only(db_path: &Path, history_table: &str) -> Result<Self> {
        info!("opening schema store at {} (read-only)", db_path.display());
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        Self::with_connection(conn, history_table)
    }

    pub fn in_memory(history_table: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Self::with_connection(conn, history_table)
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::open(&config.path, &config.history_table)
    }

    fn with_connection(conn: Connection, history_table: &str) -> Result<Self> {
        if !is_valid_identifier(history_table) {
            return Err(Error::Config(format!(
                "invalid history table name: {history_table:?}"
            )));
        }
        Ok(Self {
            conn: Mutex::new(conn),
            history_table: history_table.to_string(),
        })
    }

    pub fn history_table(&self) -> &str {
        &self.history_table
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("schema store lock poisoned".into()))
    }

    /// Run one or more `;`-separated SQL statements.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(sql)
            .map_err(|e| Error::Database(format!("failed to execute schema change: {e}")))
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let conn = self.connection()?;
        table_exists(&conn, name)
    }

    fn select_history(&self) -> String {
        format!(
            "SELECT id, version, description, applied_at FROM {}",
            self.history_table
        )
    }
}

impl SchemaStore for SqliteSchemaStore {
    fn ensure_history_table(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                version TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
            table = self.history_table
        ))
        .map_err(|e| Error::Database(format!("failed to create history table: {e}")))?;

        debug!("history table {} ready", self.history_table);
        Ok(())
    }

    fn find_history(&self, version: &str) -> Result<Option<HistoryRecord>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("{} WHERE version = ?1", self.select_history()),
            params![version],
            history_from_row,
        )
        .optional()
        .map_err(|e| Error::Database(format!("failed to look up migration {version}: {e}")))
    }

    fn latest_history(&self) -> Result<Option<HistoryRecord>> {
        let conn = self.connection()?;
        if !table_exists(&conn, &self.history_table)? {
            return Ok(None);
        }
        conn.query_row(
            &format!("{} ORDER BY id DESC LIMIT 1", self.select_history()),
            [],
            history_from_row,
        )
        .optional()
        .map_err(|e| Error::Database(format!("failed to get last migration: {e}")))
    }

    fn insert_history(&self, version: &str, description: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (version, description) VALUES (?1, ?2)",
                self.history_table
            ),
            params![version, description],
        )
        .map_err(|e| Error::Database(format!("failed to record migration {version}: {e}")))?;
        Ok(())
    }

    fn delete_history(&self, id: i64) -> Result<()> {
        let conn = self.connection()?;
        let deleted = conn
            .execute(
                &format!("DELETE FROM {} WHERE id = ?1", self.history_table),
                params![id],
            )
            .map_err(|e| Error::Database(format!("failed to delete migration record: {e}")))?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("migration record {id}")));
        }
        Ok(())
    }

    fn list_history(&self) -> Result<Vec<HistoryRecord>> {
        let conn = self.connection()?;
        if !table_exists(&conn, &self.history_table)? {
            return Ok(Vec::new());
        }
        let mut stmt = conn
            .prepare(&format!("{} ORDER BY id ASC", self.select_history()))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], history_from_row)
            .map_err(|e| Error::Database(format!("failed to query migration history: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read migration history row: {e}")))
    }
}

impl Migration<SqliteSchemaStore> {
    /// A migration whose forward and reverse actions are SQL batches.
    pub fn sql(
        version: impl Into<String>,
        description: impl Into<String>,
        up_sql: &'static str,
        down_sql: &'static str,
    ) -> Self {
        Migration::new(
            version,
            description,
            move |store: &SqliteSchemaStore| store.execute_batch(up_sql),
            move |store: &SqliteSchemaStore| store.execute_batch(down_sql),
        )
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
        params![name],
        |row| row.get(0),
    )
    .map_err(|e| Error::Database(format!("failed to check table {name}: {e}")))
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    Ok(HistoryRecord {
        id: row.get(0)?,
        version: row.get(1)?,
        description: row.get(2)?,
        applied_at: parse_datetime(row.get::<_, String>(3)?),
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteSchemaStore {
        let store = SqliteSchemaStore::in_memory("migration_history").unwrap();
        store.ensure_history_table().unwrap();
        store
    }

    #[test]
    fn ensure_history_table_is_idempotent() {
        let store = SqliteSchemaStore::in_memory("migration_history").unwrap();
        assert!(!store.table_exists("migration_history").unwrap());

        store.ensure_history_table().unwrap();
        store.insert_history("001", "first").unwrap();
        store.ensure_history_table().unwrap();

        assert!(store.table_exists("migration_history").unwrap());
        assert_eq!(store.list_history().unwrap().len(), 1);
    }

    #[test]
    fn insert_and_find_round_trip() {
        let store = store();
        store.insert_history("001", "Create users table").unwrap();

        let record = store.find_history("001").unwrap().unwrap();
        assert_eq!(record.version, "001");
        assert_eq!(record.description, "Create users table");
        assert!(record.id > 0);
        assert!(record.applied_at > DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn find_missing_version_returns_none() {
        let store = store();
        assert!(store.find_history("999").unwrap().is_none());
    }

    #[test]
    fn version_is_unique() {
        let store = store();
        store.insert_history("001", "first").unwrap();
        let err = store.insert_history("001", "again").unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn latest_follows_insertion_order() {
        let store = store();
        store.insert_history("002", "b").unwrap();
        store.insert_history("001", "a").unwrap();

        let latest = store.latest_history().unwrap().unwrap();
        assert_eq!(latest.version, "001");
    }

    #[test]
    fn latest_without_history_table_is_none() {
        let store = SqliteSchemaStore::in_memory("migration_history").unwrap();
        assert!(store.latest_history().unwrap().is_none());
        assert!(store.list_history().unwrap().is_empty());
    }

    #[test]
    fn delete_removes_row() {
        let store = store();
        store.insert_history("001", "a").unwrap();
        let record = store.find_history("001").unwrap().unwrap();

        store.delete_history(record.id).unwrap();
        assert!(store.find_history("001").unwrap().is_none());
        assert!(matches!(
            store.delete_history(record.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let store = store();
        store.insert_history("001", "a").unwrap();
        store.insert_history("002", "b").unwrap();
        let second = store.latest_history().unwrap().unwrap();
        store.delete_history(second.id).unwrap();

        store.insert_history("003", "c").unwrap();
        let third = store.latest_history().unwrap().unwrap();
        assert!(third.id > second.id);
    }

    #[test]
    fn custom_history_table_name() {
        let store = SqliteSchemaStore::in_memory("schema_ledger").unwrap();
        store.ensure_history_table().unwrap();
        store.insert_history("001", "a").unwrap();
        assert_eq!(store.history_table(), "schema_ledger");
        assert!(store.table_exists("schema_ledger").unwrap());
        assert!(!store.table_exists("migration_history").unwrap());
    }

    #[test]
    fn rejects_invalid_history_table_name() {
        assert!(matches!(
            SqliteSchemaStore::in_memory("ledger; DROP TABLE users"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn sql_migration_runs_batches() {
        let store = store();
        let migration = Migration::sql(
            "001",
            "widgets",
            "CREATE TABLE widgets (id INTEGER PRIMARY KEY);",
            "DROP TABLE widgets;",
        );

        migration.up(&store).unwrap();
        assert!(store.table_exists("widgets").unwrap());
        migration.down(&store).unwrap();
        assert!(!store.table_exists("widgets").unwrap());
    }

    #[test]
    fn opens_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        {
            let store = SqliteSchemaStore::open(&path, "migration_history").unwrap();
            store.ensure_history_table().unwrap();
            store.insert_history("001", "a").unwrap();
        }

        let config = DatabaseConfig {
            path: path.clone(),
            history_table: "migration_history".into(),
        };
        let store = SqliteSchemaStore::from_config(&config).unwrap();
        assert_eq!(store.list_history().unwrap().len(), 1);
    }

    #[test]
    fn read_only_open_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");

        assert!(matches!(
            SqliteSchemaStore::open_read_only(&path, "migration_history"),
            Err(Error::Database(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn read_only_open_reads_history_but_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        {
            let store = SqliteSchemaStore::open(&path, "migration_history").unwrap();
            store.ensure_history_table().unwrap();
            store.insert_history("001", "a").unwrap();
        }

        let store = SqliteSchemaStore::open_read_only(&path, "migration_history").unwrap();
        assert_eq!(store.list_history().unwrap().len(), 1);
        assert!(store.insert_history("002", "b").is_err());
    }

    #[test]
    fn parses_sqlite_datetime() {
        let dt = parse_datetime("2024-03-01 12:30:45".to_string());
        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:30:45+00:00");
    }
}
