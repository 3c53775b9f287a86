//! Running a single migration.
//!
//! The [`MigrationRunner`] executes one [`MigrationSource`] in one direction
//! and records the outcome in the version table. A transactional migration
//! runs its statements and the version-row write in one transaction, so
//! either all of them land or none do. A `NO TRANSACTION` script runs each
//! statement on its own; when one fails, earlier statements stay committed
//! and later ones never run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uno_rs_core::logging::migration_span;
use uno_rs_core::{UnoError, UnoResult};
use uno_rs_db_backends::{DatabaseBackend, Transaction};

use crate::fs::MigrationFs;
use crate::parser::{clear_statement, Direction, ParsedScript, ScriptParser};
use crate::source::{MigrationSource, SourceKind};
use crate::store::VersionStore;

/// A progress report for a statement that is still running.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    /// Base name of the migration.
    pub file: &'a str,
    /// The cleaned statement text.
    pub statement: &'a str,
    /// Time since the statement started.
    pub elapsed: Duration,
}

/// Callback invoked on each progress tick.
///
/// Progress reporting only observes: nothing cancels or times out the
/// statement.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent<'_>) + Send + Sync>;

/// Executes migrations against a backend.
pub struct MigrationRunner {
    parser: ScriptParser,
    fs: Arc<dyn MigrationFs>,
    store: VersionStore,
    no_versioning: bool,
    progress_interval: Option<Duration>,
    on_progress: Option<ProgressCallback>,
}

impl MigrationRunner {
    /// Creates a runner. With `no_versioning` the version table is never written.
    pub fn new(
        parser: ScriptParser,
        fs: Arc<dyn MigrationFs>,
        store: VersionStore,
        no_versioning: bool,
    ) -> Self {
        Self {
            parser,
            fs,
            store,
            no_versioning,
            progress_interval: None,
            on_progress: None,
        }
    }

    /// Reports long-running statements every `interval`.
    ///
    /// Without a callback, reports go to the log.
    #[must_use]
    pub fn with_progress(
        mut self,
        interval: Option<Duration>,
        callback: Option<ProgressCallback>,
    ) -> Self {
        self.progress_interval = interval;
        self.on_progress = callback;
        self
    }

    /// Runs `source` in `direction`.
    ///
    /// # Errors
    ///
    /// - [`UnoError::ParseError`] if a SQL script is malformed (nothing is executed).
    /// - [`UnoError::RegistrationError`] for a native source without callbacks.
    /// - [`UnoError::Execution`] wrapping the driver error when a statement,
    ///   callback, version-row write, or transaction control statement fails.
    pub async fn run(
        &self,
        backend: &dyn DatabaseBackend,
        source: &MigrationSource,
        direction: Direction,
    ) -> UnoResult<()> {
        let file = source.file_name();
        let span = migration_span(&file, &direction.to_string());
        async {
            match source.kind {
                SourceKind::Sql => self.run_sql(backend, source, &file, direction).await,
                SourceKind::Native => self.run_native(backend, source, &file, direction).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_sql(
        &self,
        backend: &dyn DatabaseBackend,
        source: &MigrationSource,
        file: &str,
        direction: Direction,
    ) -> UnoResult<()> {
        let script = self.fs.read_to_string(&source.source).map_err(|e| {
            UnoError::execution(file, "failed to open SQL migration file", None, e)
        })?;

        let parsed = self.parser.parse(&script, direction).map_err(|e| match e {
            UnoError::ParseError(msg) => UnoError::ParseError(format!("{file}: {msg}")),
            other => other,
        })?;

        if parsed.use_transaction {
            self.execute_in_transaction(backend, &parsed, source.version, file)
                .await?;
        } else {
            self.execute_directly(backend, &parsed, source.version, file)
                .await?;
        }

        if parsed.is_empty() {
            tracing::info!("EMPTY {file}");
        } else {
            tracing::info!("OK    {file}");
        }
        Ok(())
    }

    async fn execute_in_transaction(
        &self,
        backend: &dyn DatabaseBackend,
        parsed: &ParsedScript,
        version: i64,
        file: &str,
    ) -> UnoResult<()> {
        tracing::debug!("begin transaction");
        let tx = Transaction::begin(backend)
            .await
            .map_err(|e| UnoError::execution(file, "failed to begin transaction", None, e))?;

        for statement in &parsed.statements {
            let cleaned = clear_statement(statement);
            tracing::debug!(statement = %cleaned, "executing statement");
            let result = self
                .watch(file, &cleaned, tx.execute(statement, &[]))
                .await;
            if let Err(e) = result {
                rollback(tx).await;
                return Err(UnoError::execution(
                    file,
                    format!("failed to execute SQL query {cleaned:?}"),
                    Some(cleaned),
                    e,
                ));
            }
        }

        if !self.no_versioning {
            let (sql, params) = self.store.mutation(parsed.direction, version);
            let result = tx.execute(&sql, &params).await;
            if let Err(e) = result {
                rollback(tx).await;
                return Err(UnoError::execution(
                    file,
                    version_context(parsed.direction),
                    None,
                    e,
                ));
            }
        }

        tracing::debug!("commit transaction");
        tx.commit()
            .await
            .map_err(|e| UnoError::execution(file, "failed to commit transaction", None, e))
    }

    async fn execute_directly(
        &self,
        backend: &dyn DatabaseBackend,
        parsed: &ParsedScript,
        version: i64,
        file: &str,
    ) -> UnoResult<()> {
        for statement in &parsed.statements {
            let cleaned = clear_statement(statement);
            tracing::debug!(statement = %cleaned, "executing statement");
            if let Err(e) = self
                .watch(file, &cleaned, backend.execute(statement, &[]))
                .await
            {
                return Err(UnoError::execution(
                    file,
                    format!("failed to execute SQL query {cleaned:?}"),
                    Some(cleaned),
                    e,
                ));
            }
        }

        if !self.no_versioning {
            let (sql, params) = self.store.mutation(parsed.direction, version);
            backend.execute(&sql, &params).await.map_err(|e| {
                UnoError::execution(file, version_context(parsed.direction), None, e)
            })?;
        }
        Ok(())
    }

    async fn run_native(
        &self,
        backend: &dyn DatabaseBackend,
        source: &MigrationSource,
        file: &str,
        direction: Direction,
    ) -> UnoResult<()> {
        let Some(native) = source.native.as_ref().filter(|_| source.registered) else {
            return Err(UnoError::RegistrationError(format!(
                "{file}: native migrations must be registered and built into the binary"
            )));
        };

        tracing::debug!("begin transaction");
        let tx = Transaction::begin(backend)
            .await
            .map_err(|e| UnoError::execution(file, "failed to begin transaction", None, e))?;

        let result = match direction {
            Direction::Up => native.up(&tx).await,
            Direction::Down => native.down(&tx).await,
        };
        if let Err(e) = result {
            rollback(tx).await;
            return Err(UnoError::execution(
                file,
                format!("failed to run native migration ({direction})"),
                None,
                e,
            ));
        }

        if !self.no_versioning {
            let (sql, params) = self.store.mutation(direction, source.version);
            let result = tx.execute(&sql, &params).await;
            if let Err(e) = result {
                rollback(tx).await;
                return Err(UnoError::execution(file, version_context(direction), None, e));
            }
        }

        tracing::debug!("commit transaction");
        tx.commit()
            .await
            .map_err(|e| UnoError::execution(file, "failed to commit transaction", None, e))?;

        tracing::info!("OK    {file}");
        Ok(())
    }

    /// Awaits `fut`, reporting progress on every tick of the progress interval.
    async fn watch<F, T>(&self, file: &str, statement: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let Some(period) = self.progress_interval else {
            return fut.await;
        };

        tokio::pin!(fut);
        let started = tokio::time::Instant::now();
        let mut ticker = tokio::time::interval_at(started + period, period);

        loop {
            tokio::select! {
                out = &mut fut => return out,
                _ = ticker.tick() => {
                    let event = ProgressEvent {
                        file,
                        statement,
                        elapsed: started.elapsed(),
                    };
                    match &self.on_progress {
                        Some(callback) => callback(&event),
                        None => tracing::info!(
                            elapsed_secs = event.elapsed.as_secs(),
                            "executing statement still in progress"
                        ),
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("store", &self.store)
            .field("no_versioning", &self.no_versioning)
            .field("progress_interval", &self.progress_interval)
            .finish_non_exhaustive()
    }
}

const fn version_context(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "failed to insert new migration version",
        Direction::Down => "failed to delete migration version",
    }
}

async fn rollback(tx: Transaction<'_>) {
    tracing::debug!("rollback transaction");
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed");
    }
}
