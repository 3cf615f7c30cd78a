use std::collections::HashSet;
use std::fmt;

use schemashift_common::Result;

use crate::error::{MigrationError, MigrationResult};

/// A schema change applied to, or reverted from, a store of type `S`.
pub type MigrationAction<S> = Box<dyn Fn(&S) -> Result<()> + Send + Sync>;

/// A single versioned, reversible schema change.
///
/// `version` is the only key linking a migration to its ledger row, so it
/// must never change once shipped. `down` must undo exactly what `up` did.
pub struct Migration<S> {
    version: String,
    description: String,
    up: MigrationAction<S>,
    down: MigrationAction<S>,
}

impl<S> Migration<S> {
    pub fn new<U, D>(
        version: impl Into<String>,
        description: impl Into<String>,
        up: U,
        down: D,
    ) -> Self
    where
        U: Fn(&S) -> Result<()> + Send + Sync + 'static,
        D: Fn(&S) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            version: version.into(),
            description: description.into(),
            up: Box::new(up),
            down: Box::new(down),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the forward action.
    pub fn up(&self, store: &S) -> Result<()> {
        (self.up)(store)
    }

    /// Run the reverse action.
    pub fn down(&self, store: &S) -> Result<()> {
        (self.down)(store)
    }
}

impl<S> fmt::Debug for Migration<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Ordered, immutable list of migrations.
///
/// Declaration order is the order `migrate` applies them in. Versions are
/// unique; there is no way to add or remove entries after construction.
pub struct MigrationRegistry<S> {
    migrations: Vec<Migration<S>>,
}

impl<S> MigrationRegistry<S> {
    pub fn new(migrations: Vec<Migration<S>>) -> MigrationResult<Self> {
        let mut seen = HashSet::with_capacity(migrations.len());
        for migration in &migrations {
            if !seen.insert(migration.version()) {
                return Err(MigrationError::DuplicateVersion {
                    version: migration.version().to_string(),
                });
            }
        }
        Ok(Self { migrations })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Migration<S>> {
        self.migrations.iter()
    }

    pub fn find(&self, version: &str) -> Option<&Migration<S>> {
        self.migrations.iter().find(|m| m.version() == version)
    }

    pub fn versions(&self) -> Vec<&str> {
        self.migrations.iter().map(Migration::version).collect()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl<S> fmt::Debug for MigrationRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.migrations).finish()
    }
}
