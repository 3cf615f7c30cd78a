//! Applies registry migrations against a schema store and walks them back.
//!
//! The runner assumes it is the only one touching the ledger: both `migrate`
//! and `rollback` read the ledger and then write it without holding a lock.
//! Running two runners against one store at once has to be prevented by
//! whatever deploys them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{MigrationError, MigrationResult};
use crate::migrations::MigrationRegistry;
use crate::store::{HistoryRecord, SchemaStore};

/// Outcome of a successful `migrate` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrateReport {
    /// Versions applied during this run, in order.
    pub applied: Vec<String>,
    /// Migrations that were already recorded in the ledger.
    pub skipped: usize,
}

/// The migration undone by a `rollback` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolledBack {
    pub version: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    Applied { applied_at: DateTime<Utc> },
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: String,
    pub description: String,
    #[serde(flatten)]
    pub state: MigrationState,
}

/// Registry entries joined with the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// One entry per registry migration, in registry order.
    pub migrations: Vec<MigrationStatus>,
    /// Ledger rows with no matching registry entry.
    pub orphaned: Vec<HistoryRecord>,
}

impl StatusReport {
    pub fn pending(&self) -> impl Iterator<Item = &MigrationStatus> {
        self.migrations
            .iter()
            .filter(|m| m.state == MigrationState::Pending)
    }
}

/// Drives a [`MigrationRegistry`] against a [`SchemaStore`].
pub struct Migrator<'a, S> {
    store: &'a S,
    registry: &'a MigrationRegistry<S>,
}

impl<'a, S: SchemaStore> Migrator<'a, S> {
    pub fn new(store: &'a S, registry: &'a MigrationRegistry<S>) -> Self {
        Self { store, registry }
    }

    /// Apply every migration not yet recorded in the ledger, in registry order.
    ///
    /// Stops at the first failure. Migrations applied before it stay applied
    /// and recorded; nothing after it runs.
    pub fn migrate(&self) -> MigrationResult<MigrateReport> {
        self.store
            .ensure_history_table()
            .map_err(MigrationError::Setup)?;

        let mut report = MigrateReport::default();

        for migration in self.registry.iter() {
            let version = migration.version();
            let existing = self
                .store
                .find_history(version)
                .map_err(MigrationError::HistoryLookup)?;

            if existing.is_some() {
                info!("migration {version} already applied, skipping");
                report.skipped += 1;
                continue;
            }

            info!("running migration {version}: {}", migration.description());
            migration
                .up(self.store)
                .map_err(|cause| MigrationError::MigrationFailed {
                    version: version.to_string(),
                    cause,
                })?;

            if let Err(cause) = self
                .store
                .insert_history(version, migration.description())
            {
                warn!("migration {version} applied to the schema but not recorded in history");
                return Err(MigrationError::HistoryInsert {
                    version: version.to_string(),
                    cause,
                });
            }

            info!("migration {version} completed");
            report.applied.push(version.to_string());
        }

        info!(
            applied = report.applied.len(),
            skipped = report.skipped,
            "all migrations completed"
        );
        Ok(report)
    }

    /// Undo the most recently applied migration.
    ///
    /// Returns `Ok(None)` when the ledger is empty. The ledger row is only
    /// deleted after the reverse action succeeds.
    pub fn rollback(&self) -> MigrationResult<Option<RolledBack>> {
        let Some(last) = self
            .store
            .latest_history()
            .map_err(MigrationError::HistoryLookup)?
        else {
            info!("no migrations to roll back");
            return Ok(None);
        };

        let migration =
            self.registry
                .find(&last.version)
                .ok_or_else(|| MigrationError::UnknownVersion {
                    version: last.version.clone(),
                })?;

        info!(
            "rolling back migration {}: {}",
            last.version,
            migration.description()
        );
        migration
            .down(self.store)
            .map_err(|cause| MigrationError::RollbackFailed {
                version: last.version.clone(),
                cause,
            })?;

        if let Err(cause) = self.store.delete_history(last.id) {
            warn!(
                "migration {} reverted in the schema but still recorded in history",
                last.version
            );
            return Err(MigrationError::HistoryDelete {
                version: last.version,
                cause,
            });
        }

        info!("migration {} rolled back", last.version);
        Ok(Some(RolledBack {
            version: last.version,
            description: migration.description().to_string(),
        }))
    }

    /// Compare the registry with the ledger without changing either.
    pub fn status(&self) -> MigrationResult<StatusReport> {
        let history = self
            .store
            .list_history()
            .map_err(MigrationError::HistoryLookup)?;

        let migrations = self
            .registry
            .iter()
            .map(|migration| {
                let state = history
                    .iter()
                    .find(|record| record.version == migration.version())
                    .map_or(MigrationState::Pending, |record| MigrationState::Applied {
                        applied_at: record.applied_at,
                    });
                MigrationStatus {
                    version: migration.version().to_string(),
                    description: migration.description().to_string(),
                    state,
                }
            })
            .collect();

        let known: HashSet<&str> = self.registry.iter().map(|m| m.version()).collect();
        let orphaned = history
            .into_iter()
            .filter(|record| !known.contains(record.version.as_str()))
            .collect();

        Ok(StatusReport {
            migrations,
            orphaned,
        })
    }
}
