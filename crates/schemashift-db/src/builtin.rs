//! Migrations shipped with the `schemashift` binary.

use crate::error::MigrationResult;
use crate::migrations::{Migration, MigrationRegistry};
use crate::sqlite_store::SqliteSchemaStore;

pub const USERS_V1_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT,
    username VARCHAR(50) NOT NULL UNIQUE,
    email VARCHAR(100) NOT NULL UNIQUE,
    password TEXT NOT NULL,
    role VARCHAR(20) NOT NULL DEFAULT 'user',
    is_active BOOLEAN NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_users_deleted_at
    ON users(deleted_at);
";

pub const USERS_V1_DOWN_SQL: &str = "
DROP INDEX IF EXISTS idx_users_deleted_at;
DROP TABLE IF EXISTS users;
";

pub fn registry() -> MigrationResult<MigrationRegistry<SqliteSchemaStore>> {
    MigrationRegistry::new(vec![Migration::sql(
        "001",
        "Create users table",
        USERS_V1_SQL,
        USERS_V1_DOWN_SQL,
    )])
}
