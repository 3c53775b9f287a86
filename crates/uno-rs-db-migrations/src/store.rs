//! The version table.
//!
//! [`VersionStore`] reads and writes the table that records applied versions.
//! Rows are inserted on apply and deleted on revert, never updated. The table
//! is created on first use.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDateTime;
use uno_rs_core::{UnoError, UnoResult};
use uno_rs_db_backends::{DatabaseBackend, Value};

use crate::dialect::Dialect;
use crate::parser::Direction;

/// One row of the version table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    /// The migration version.
    pub version_id: i64,
    /// When the row was written, if the database reported it.
    pub applied_at: Option<NaiveDateTime>,
    /// Whether the row marks the version as applied.
    pub is_applied: bool,
}

/// Reads and writes the version table for one dialect.
#[derive(Debug, Clone)]
pub struct VersionStore {
    dialect: Dialect,
    table: String,
}

impl VersionStore {
    /// Creates a store for `table` using `dialect`'s SQL.
    pub fn new(dialect: Dialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
        }
    }

    /// The dialect in use.
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The version table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the version table if it does not exist yet.
    ///
    /// Existence is probed by selecting from the table, which works the same
    /// on every dialect.
    pub async fn ensure_table(&self, backend: &dyn DatabaseBackend) -> UnoResult<()> {
        let probe = self.dialect.select_versions_sql(&self.table);
        let Err(probe_err) = backend.query(&probe, &[]).await else {
            return Ok(());
        };
        tracing::debug!(table = %self.table, error = %probe_err, "version table probe failed");

        tracing::info!(table = %self.table, dialect = %self.dialect, "creating version table");
        backend
            .execute(&self.dialect.create_version_table_sql(&self.table), &[])
            .await
            .map_err(|e| {
                UnoError::DatabaseError(format!(
                    "failed to create version table {}: {e} (probe failed with: {probe_err})",
                    self.table
                ))
            })?;
        Ok(())
    }

    /// All rows, most recent first.
    pub async fn records(&self, backend: &dyn DatabaseBackend) -> UnoResult<Vec<VersionRecord>> {
        let rows = backend
            .query(&self.dialect.select_versions_sql(&self.table), &[])
            .await?;

        rows.iter()
            .map(|row| {
                Ok(VersionRecord {
                    version_id: row.get("version_id")?,
                    is_applied: row.get("is_applied")?,
                    applied_at: row.get::<Option<NaiveDateTime>>("tstamp")?,
                })
            })
            .collect()
    }

    /// The latest record for each version, keyed by version.
    ///
    /// Only the most recent row of a version counts, so a version whose latest
    /// row has `is_applied = false` is not applied.
    pub async fn latest_records(
        &self,
        backend: &dyn DatabaseBackend,
    ) -> UnoResult<Vec<VersionRecord>> {
        let mut seen = HashSet::new();
        let mut latest: Vec<VersionRecord> = self
            .records(backend)
            .await?
            .into_iter()
            .filter(|r| seen.insert(r.version_id))
            .collect();
        latest.sort_by_key(|r| r.version_id);
        Ok(latest)
    }

    /// The set of applied versions.
    pub async fn applied_versions(&self, backend: &dyn DatabaseBackend) -> UnoResult<BTreeSet<i64>> {
        Ok(self
            .latest_records(backend)
            .await?
            .into_iter()
            .filter(|r| r.is_applied)
            .map(|r| r.version_id)
            .collect())
    }

    /// The highest applied version, or 0 when nothing is applied.
    pub async fn current_version(&self, backend: &dyn DatabaseBackend) -> UnoResult<i64> {
        Ok(self
            .applied_versions(backend)
            .await?
            .last()
            .copied()
            .unwrap_or(0))
    }

    /// The statement recording `version` after running it in `direction`.
    ///
    /// Apply inserts an applied row; revert deletes the version's rows.
    pub fn mutation(&self, direction: Direction, version: i64) -> (String, Vec<Value>) {
        match direction {
            Direction::Up => (
                self.dialect.insert_version_sql(&self.table),
                vec![Value::Int(version), Value::Bool(true)],
            ),
            Direction::Down => (
                self.dialect.delete_version_sql(&self.table),
                vec![Value::Int(version)],
            ),
        }
    }
}
