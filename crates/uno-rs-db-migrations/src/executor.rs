//! The migration orchestrator.
//!
//! [`MigrationExecutor`] implements the verbs (`up`, `up_by_one`, `up_to`,
//! `down`, `down_to`, `version`, `status`) on top of the collector, the
//! version store, and the runner. Migrations run strictly one at a time in
//! version order, and the first failure stops the run.
//!
//! ## Missing versions
//!
//! A source whose version is below the current version but which was never
//! applied is *missing*. By default any missing version makes `up` fail with
//! [`UnoError::VersionConflict`] before anything runs. With
//! [`RunOptions::allow_missing`](crate::config::RunOptions::allow_missing)
//! the missing sources are applied in ascending order along with the other
//! pending ones. Rows for already-applied versions are never touched.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use uno_rs_core::{UnoError, UnoResult};
use uno_rs_db_backends::DatabaseBackend;

use crate::config::MigrationConfig;
use crate::fs::MigrationFs;
use crate::parser::{Direction, ScriptParser};
use crate::pool::BufferPool;
use crate::registry::MigrationRegistry;
use crate::runner::{MigrationRunner, ProgressCallback};
use crate::source::{MigrationCollector, MigrationSource, Migrations, SourceKind};
use crate::store::{VersionRecord, VersionStore};

/// The applied state of one source, as reported by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// The source version.
    pub version: i64,
    /// Base name of the source.
    pub source: String,
    /// SQL or native.
    pub kind: SourceKind,
    /// Whether the version table marks the version as applied.
    pub applied: bool,
    /// When it was applied, if known.
    pub applied_at: Option<NaiveDateTime>,
}

/// Applies and reverts migrations from one directory against a backend.
pub struct MigrationExecutor {
    config: MigrationConfig,
    fs: Arc<dyn MigrationFs>,
    registry: Arc<MigrationRegistry>,
    runner: MigrationRunner,
    store: VersionStore,
}

impl MigrationExecutor {
    /// Creates an executor.
    ///
    /// `registry` holds the native migrations linked into the binary; pass an
    /// empty one when only SQL sources are used.
    pub fn new(
        config: MigrationConfig,
        fs: Arc<dyn MigrationFs>,
        registry: Arc<MigrationRegistry>,
    ) -> Self {
        let store = VersionStore::new(config.dialect, config.table.clone());
        let parser = ScriptParser::new(
            config.annotation_prefixes.clone(),
            Arc::new(BufferPool::default()),
        );
        let runner = MigrationRunner::new(
            parser,
            Arc::clone(&fs),
            store.clone(),
            config.options.no_versioning,
        )
        .with_progress(config.progress_interval, None);

        Self {
            config,
            fs,
            registry,
            runner,
            store,
        }
    }

    /// Routes progress reports for long statements to `callback` instead of the log.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.runner = self
            .runner
            .with_progress(self.config.progress_interval, Some(callback));
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The version store in use.
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Collects the sources in the configured directory.
    pub fn collect(&self) -> UnoResult<Migrations> {
        MigrationCollector::new(self.fs.as_ref(), &self.registry).collect(&self.config.dir)
    }

    /// Applies every pending migration.
    pub async fn up(&self, backend: &dyn DatabaseBackend) -> UnoResult<()> {
        self.up_to(backend, i64::MAX).await
    }

    /// Applies only the next pending migration.
    ///
    /// # Errors
    ///
    /// Returns [`UnoError::NoNextVersion`] when nothing is pending.
    pub async fn up_by_one(&self, backend: &dyn DatabaseBackend) -> UnoResult<()> {
        let migrations = self.collect()?;
        let pending = self.plan_up(backend, &migrations, i64::MAX).await?;
        let Some(next) = pending.first() else {
            return Err(UnoError::NoNextVersion);
        };
        self.runner.run(backend, next, Direction::Up).await
    }

    /// Applies pending migrations with a version up to and including `version`.
    ///
    /// Succeeds without doing anything when nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns [`UnoError::VersionConflict`] if missing versions exist and
    /// `allow_missing` is off, or the first migration failure.
    pub async fn up_to(&self, backend: &dyn DatabaseBackend, version: i64) -> UnoResult<()> {
        let migrations = self.collect()?;
        let pending = self.plan_up(backend, &migrations, version).await?;

        if pending.is_empty() {
            let current = self.version(backend).await?;
            tracing::info!("no migrations to run. current version: {current}");
            return Ok(());
        }

        for source in pending {
            self.runner.run(backend, source, Direction::Up).await?;
        }
        Ok(())
    }

    /// Reverts the most recently applied migration.
    ///
    /// With `no_versioning` the last source by file order is reverted.
    ///
    /// # Errors
    ///
    /// Returns [`UnoError::NotFound`] at version 0 or when the current
    /// version has no source.
    pub async fn down(&self, backend: &dyn DatabaseBackend) -> UnoResult<()> {
        let migrations = self.collect()?;

        if self.config.options.no_versioning {
            let last = migrations
                .last()
                .ok_or_else(|| UnoError::NotFound("no migrations to revert".into()))?;
            return self.runner.run(backend, last, Direction::Down).await;
        }

        self.store.ensure_table(backend).await?;
        let current = self.store.current_version(backend).await?;
        if current == 0 {
            return Err(UnoError::NotFound(
                "no migrations to revert: current version is 0".into(),
            ));
        }
        let source = find_source(&migrations, current)?;
        self.runner.run(backend, source, Direction::Down).await
    }

    /// Reverts applied migrations newer than `version`, newest first.
    pub async fn down_to(&self, backend: &dyn DatabaseBackend, version: i64) -> UnoResult<()> {
        let migrations = self.collect()?;

        if self.config.options.no_versioning {
            for source in migrations.between_reversed(version, i64::MAX) {
                self.runner.run(backend, source, Direction::Down).await?;
            }
            return Ok(());
        }

        self.store.ensure_table(backend).await?;
        loop {
            let current = self.store.current_version(backend).await?;
            if current <= version {
                tracing::info!("no migrations to run. current version: {current}");
                return Ok(());
            }
            let source = find_source(&migrations, current)?;
            self.runner.run(backend, source, Direction::Down).await?;
        }
    }

    /// The current version: the highest applied version, or 0.
    ///
    /// With `no_versioning` this is the highest source version instead.
    pub async fn version(&self, backend: &dyn DatabaseBackend) -> UnoResult<i64> {
        if self.config.options.no_versioning {
            return Ok(self.collect()?.last().map_or(0, |s| s.version));
        }
        self.store.ensure_table(backend).await?;
        self.store.current_version(backend).await
    }

    /// Every collected source with its applied state.
    ///
    /// With `no_versioning` every source is reported as not applied.
    pub async fn status(&self, backend: &dyn DatabaseBackend) -> UnoResult<Vec<MigrationStatus>> {
        let migrations = self.collect()?;

        let records: BTreeMap<i64, VersionRecord> = if self.config.options.no_versioning {
            BTreeMap::new()
        } else {
            self.store.ensure_table(backend).await?;
            self.store
                .latest_records(backend)
                .await?
                .into_iter()
                .map(|r| (r.version_id, r))
                .collect()
        };

        Ok(migrations
            .iter()
            .map(|source| {
                let applied = records.get(&source.version).filter(|r| r.is_applied);
                MigrationStatus {
                    version: source.version,
                    source: source.file_name(),
                    kind: source.kind,
                    applied: applied.is_some(),
                    applied_at: applied.and_then(|r| r.applied_at),
                }
            })
            .collect())
    }

    /// The sources `up_to(target)` would apply, in order.
    async fn plan_up<'m>(
        &self,
        backend: &dyn DatabaseBackend,
        migrations: &'m Migrations,
        target: i64,
    ) -> UnoResult<Vec<&'m MigrationSource>> {
        if self.config.options.no_versioning {
            return Ok(migrations.iter().filter(|s| s.version <= target).collect());
        }

        self.store.ensure_table(backend).await?;
        let applied = self.store.applied_versions(backend).await?;
        let current = applied.last().copied().unwrap_or(0);

        let missing: Vec<i64> = migrations
            .iter()
            .map(|s| s.version)
            .filter(|v| *v < current && !applied.contains(v))
            .collect();

        if !missing.is_empty() && !self.config.options.allow_missing {
            return Err(UnoError::VersionConflict { missing });
        }

        let pending: Vec<&MigrationSource> = migrations
            .iter()
            .filter(|s| s.version <= target && !applied.contains(&s.version))
            .collect();

        for source in pending.iter().filter(|s| s.version < current) {
            tracing::warn!(
                version = source.version,
                current,
                "applying missing migration {source} out of order"
            );
        }
        Ok(pending)
    }
}

impl std::fmt::Debug for MigrationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationExecutor")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn find_source(migrations: &Migrations, version: i64) -> UnoResult<&MigrationSource> {
    migrations
        .find(version)
        .ok_or_else(|| UnoError::NotFound(format!("no migration source for version {version}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use crate::dialect::Dialect;
    use crate::fs::MemoryFs;
    use uno_rs_db_backends::SqliteBackend;

    fn script(table: &str) -> String {
        format!(
            "-- +migration Up\nCREATE TABLE {table} (id INTEGER);\n\n-- +migration Down\nDROP TABLE {table};\n"
        )
    }

    fn fs(versions: &[i64]) -> MemoryFs {
        let mut fs = MemoryFs::new();
        for v in versions {
            fs.insert(format!("db/{v:05}_t{v}.sql"), script(&format!("t{v}")));
        }
        fs
    }

    fn executor(fs: MemoryFs, options: RunOptions) -> MigrationExecutor {
        let config = MigrationConfig::new(Dialect::Sqlite3)
            .with_dir("db")
            .with_options(options)
            .with_progress_interval(None);
        MigrationExecutor::new(config, Arc::new(fs), Arc::new(MigrationRegistry::new()))
    }

    // ── Apply ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_up_applies_everything() {
        let exec = executor(fs(&[1, 2, 3]), RunOptions::default());
        let backend = SqliteBackend::memory().unwrap();

        exec.up(&backend).await.unwrap();
        assert_eq!(exec.version(&backend).await.unwrap(), 3);

        // A second run is a no-op.
        exec.up(&backend).await.unwrap();
        assert_eq!(exec.store().records(&backend).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_up_by_one_and_no_next_version() {
        let exec = executor(fs(&[1, 2]), RunOptions::default());
        let backend = SqliteBackend::memory().unwrap();

        exec.up_by_one(&backend).await.unwrap();
        assert_eq!(exec.version(&backend).await.unwrap(), 1);
        exec.up_by_one(&backend).await.unwrap();
        assert_eq!(exec.version(&backend).await.unwrap(), 2);
        assert!(matches!(
            exec.up_by_one(&backend).await,
            Err(UnoError::NoNextVersion)
        ));
    }

    #[tokio::test]
    async fn test_up_to_stops_at_target() {
        let exec = executor(fs(&[1, 2, 3]), RunOptions::default());
        let backend = SqliteBackend::memory().unwrap();

        exec.up_to(&backend, 2).await.unwrap();
        assert_eq!(exec.version(&backend).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_up_missing_version_conflict() {
        let backend = SqliteBackend::memory().unwrap();
        executor(fs(&[1, 3]), RunOptions::default())
            .up(&backend)
            .await
            .unwrap();

        let exec = executor(fs(&[1, 2, 3]), RunOptions::default());
        let err = exec.up_to(&backend, 5).await.unwrap_err();
        assert!(matches!(&err, UnoError::VersionConflict { missing } if missing == &vec![2]));
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_up_allow_missing_applies_gap() {
        let backend = SqliteBackend::memory().unwrap();
        executor(fs(&[1, 3]), RunOptions::default())
            .up(&backend)
            .await
            .unwrap();

        let exec = executor(
            fs(&[1, 2, 3]),
            RunOptions {
                allow_missing: true,
                no_versioning: false,
            },
        );
        exec.up_to(&backend, 5).await.unwrap();

        let applied = exec.store().applied_versions(&backend).await.unwrap();
        assert_eq!(applied.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(exec.version(&backend).await.unwrap(), 3);
    }

    // ── Revert ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_down_and_down_to() {
        let exec = executor(fs(&[1, 2, 3]), RunOptions::default());
        let backend = SqliteBackend::memory().unwrap();
        exec.up(&backend).await.unwrap();

        exec.down(&backend).await.unwrap();
        assert_eq!(exec.version(&backend).await.unwrap(), 2);

        exec.down_to(&backend, 0).await.unwrap();
        assert_eq!(exec.version(&backend).await.unwrap(), 0);
        assert!(exec.store().records(&backend).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_down_at_zero_is_not_found() {
        let exec = executor(fs(&[1]), RunOptions::default());
        let backend = SqliteBackend::memory().unwrap();
        assert!(matches!(exec.down(&backend).await, Err(UnoError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_down_without_source_is_not_found() {
        let backend = SqliteBackend::memory().unwrap();
        executor(fs(&[1, 2]), RunOptions::default())
            .up(&backend)
            .await
            .unwrap();

        let exec = executor(fs(&[1]), RunOptions::default());
        assert!(matches!(exec.down(&backend).await, Err(UnoError::NotFound(_))));
    }

    // ── No versioning ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_no_versioning_uses_file_order() {
        let options = RunOptions {
            allow_missing: false,
            no_versioning: true,
        };
        let exec = executor(fs(&[1, 2]), options);
        let backend = SqliteBackend::memory().unwrap();

        exec.up(&backend).await.unwrap();
        assert_eq!(exec.version(&backend).await.unwrap(), 2);
        let status = exec.status(&backend).await.unwrap();
        assert!(status.iter().all(|s| !s.applied));

        exec.down_to(&backend, 0).await.unwrap();
        let tables = backend
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'migrations'",
                &[],
            )
            .await
            .unwrap();
        assert!(tables.is_empty());
    }

    // ── Status ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_status_reports_applied_state() {
        let exec = executor(fs(&[1, 2]), RunOptions::default());
        let backend = SqliteBackend::memory().unwrap();
        exec.up_to(&backend, 1).await.unwrap();

        let status = exec.status(&backend).await.unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].source, "00001_t1.sql");
        assert!(status[0].applied);
        assert!(status[0].applied_at.is_some());
        assert!(!status[1].applied);
        assert_eq!(status[1].applied_at, None);
        assert_eq!(status[1].kind, SourceKind::Sql);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let exec = executor(MemoryFs::new(), RunOptions::default());
        let backend = SqliteBackend::memory().unwrap();
        let err = exec.up(&backend).await.unwrap_err();
        assert!(err.to_string().contains("directory does not exist"));
    }
}
