//! Native (Rust) migrations.
//!
//! A native migration is a type implementing [`NativeMigration`], linked into
//! the binary and registered under the file name of its source, e.g.
//! `00002_backfill_slugs.rs`. The version is taken from that file name exactly
//! as for SQL sources.
//!
//! ```rust,no_run
//! use uno_rs_core::UnoResult;
//! use uno_rs_db_backends::Transaction;
//! use uno_rs_db_migrations::{MigrationRegistry, NativeMigration};
//!
//! struct BackfillSlugs;
//!
//! #[async_trait::async_trait]
//! impl NativeMigration for BackfillSlugs {
//!     async fn up(&self, tx: &Transaction<'_>) -> UnoResult<()> {
//!         tx.execute("UPDATE posts SET slug = lower(title)", &[]).await?;
//!         Ok(())
//!     }
//!
//!     async fn down(&self, tx: &Transaction<'_>) -> UnoResult<()> {
//!         tx.execute("UPDATE posts SET slug = NULL", &[]).await?;
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = MigrationRegistry::new();
//! registry.register("00002_backfill_slugs.rs", BackfillSlugs).unwrap();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use uno_rs_core::{UnoError, UnoResult};
use uno_rs_db_backends::Transaction;

use crate::source::numeric_component;

/// Apply and revert callbacks for one native migration.
///
/// Both run inside a transaction opened by the runner; returning an error
/// rolls it back.
#[async_trait::async_trait]
pub trait NativeMigration: Send + Sync {
    /// Applies the migration.
    async fn up(&self, tx: &Transaction<'_>) -> UnoResult<()>;

    /// Reverts the migration.
    async fn down(&self, tx: &Transaction<'_>) -> UnoResult<()>;
}

/// A native migration together with the source it was registered under.
#[derive(Clone)]
pub struct RegisteredMigration {
    /// Version parsed from the source name.
    pub version: i64,
    /// Source file name, e.g. `00002_backfill_slugs.rs`.
    pub source: String,
    /// The callbacks.
    pub migration: Arc<dyn NativeMigration>,
}

impl fmt::Debug for RegisteredMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredMigration")
            .field("version", &self.version)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// The native migrations linked into a binary, keyed by version.
///
/// Built by the host application and handed to the executor.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    entries: BTreeMap<i64, RegisteredMigration>,
}

impl MigrationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a migration under its source file name.
    ///
    /// Only the file name is used, so `file!()` may be passed directly.
    ///
    /// # Errors
    ///
    /// Returns [`UnoError::ParseError`] if the name carries no valid version,
    /// or [`UnoError::RegistrationError`] if the version is already taken.
    pub fn register(
        &mut self,
        source: impl AsRef<str>,
        migration: impl NativeMigration + 'static,
    ) -> UnoResult<()> {
        self.register_arc(source, Arc::new(migration))
    }

    /// Registers a shared migration under its source file name.
    pub fn register_arc(
        &mut self,
        source: impl AsRef<str>,
        migration: Arc<dyn NativeMigration>,
    ) -> UnoResult<()> {
        let source = Path::new(source.as_ref())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(source.as_ref())
            .to_string();
        let version = numeric_component(&source)?;

        if let Some(existing) = self.entries.get(&version) {
            return Err(UnoError::RegistrationError(format!(
                "version {version} registered twice: {} and {source}",
                existing.source
            )));
        }

        tracing::debug!(version, %source, "registered native migration");
        self.entries.insert(
            version,
            RegisteredMigration {
                version,
                source,
                migration,
            },
        );
        Ok(())
    }

    /// Looks up a migration by version.
    pub fn get(&self, version: i64) -> Option<&RegisteredMigration> {
        self.entries.get(&version)
    }

    /// Iterates registrations in ascending version order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredMigration> {
        self.entries.values()
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
