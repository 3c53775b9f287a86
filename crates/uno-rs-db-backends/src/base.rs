//! Base database backend trait and common types.
//!
//! This module defines the [`DatabaseBackend`] trait that all backend
//! implementations must satisfy, along with the [`Transaction`] handle that
//! brackets statements on a backend's session.

use std::fmt;

use uno_rs_core::UnoError;

use crate::value::{Row, Value};

/// The database engines this crate can open a session against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    /// PostgreSQL (also serves Redshift).
    PostgreSQL,
    /// MySQL (also serves TiDB).
    MySQL,
    /// SQLite.
    SQLite,
}

impl DatabaseBackendType {
    /// The cargo feature that compiles this backend in.
    pub const fn feature(self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }
}

impl fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PostgreSQL => "postgresql",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        };
        f.write_str(name)
    }
}

/// The core trait for database backends.
///
/// Each backend holds exactly one session, so a `BEGIN` issued through
/// [`begin`](DatabaseBackend::begin) governs every following call until
/// [`commit`](DatabaseBackend::commit) or [`rollback`](DatabaseBackend::rollback).
///
/// All methods are async because database operations are inherently I/O-bound.
/// Backends that use synchronous drivers (like `rusqlite`) wrap operations in
/// `spawn_blocking` to maintain the async interface.
#[async_trait::async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Returns the vendor name (e.g., "postgresql", "sqlite", "mysql").
    fn vendor(&self) -> &str;

    /// Returns the backend type.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Executes SQL that does not return rows.
    ///
    /// With no parameters the text is sent through the driver's batch path, so
    /// a single call may carry several statements (a `StatementBegin` block,
    /// for instance). Returns the number of rows affected where the driver
    /// reports it.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, UnoError>;

    /// Executes a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, UnoError>;

    /// Begins a transaction on the session.
    async fn begin(&self) -> Result<(), UnoError> {
        self.execute("BEGIN", &[]).await.map(|_| ())
    }

    /// Commits the current transaction.
    async fn commit(&self) -> Result<(), UnoError> {
        self.execute("COMMIT", &[]).await.map(|_| ())
    }

    /// Rolls back the current transaction.
    async fn rollback(&self) -> Result<(), UnoError> {
        self.execute("ROLLBACK", &[]).await.map(|_| ())
    }
}

/// An open transaction on a backend session.
///
/// Obtained from [`Transaction::begin`] and consumed by
/// [`commit`](Transaction::commit) or [`rollback`](Transaction::rollback).
/// Dropping an unfinished transaction leaves the session mid-transaction; a
/// warning is logged in that case.
pub struct Transaction<'a> {
    backend: &'a dyn DatabaseBackend,
    finished: bool,
}

impl<'a> Transaction<'a> {
    /// Issues `BEGIN` on the backend and returns the open transaction.
    pub async fn begin(backend: &'a dyn DatabaseBackend) -> Result<Self, UnoError> {
        backend.begin().await?;
        tracing::trace!(vendor = backend.vendor(), "transaction started");
        Ok(Self {
            backend,
            finished: false,
        })
    }

    /// Executes a statement inside the transaction.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, UnoError> {
        self.backend.execute(sql, params).await
    }

    /// Runs a query inside the transaction.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, UnoError> {
        self.backend.query(sql, params).await
    }

    /// The backend the transaction runs on.
    pub fn backend(&self) -> &'a dyn DatabaseBackend {
        self.backend
    }

    /// Commits the transaction.
    pub async fn commit(mut self) -> Result<(), UnoError> {
        self.finished = true;
        self.backend.commit().await
    }

    /// Rolls the transaction back.
    pub async fn rollback(mut self) -> Result<(), UnoError> {
        self.finished = true;
        self.backend.rollback().await
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                vendor = self.backend.vendor(),
                "transaction dropped without commit or rollback"
            );
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("vendor", &self.backend.vendor())
            .field("finished", &self.finished)
            .finish()
    }
}

/// Opens a session for the given backend type.
///
/// The connection string is passed to the driver unchanged: a file path (or
/// `:memory:`) for SQLite, a libpq-style string or URL for PostgreSQL, and a
/// `mysql://` URL for MySQL.
///
/// # Errors
///
/// Returns [`UnoError::OperationalError`] if the connection fails or if the
/// backend was not compiled into this build.
pub async fn connect(
    backend: DatabaseBackendType,
    dbstring: &str,
) -> Result<Box<dyn DatabaseBackend>, UnoError> {
    tracing::debug!(%backend, "opening database session");
    match backend {
        #[cfg(feature = "sqlite")]
        DatabaseBackendType::SQLite => Ok(Box::new(crate::sqlite::SqliteBackend::open(dbstring)?)),
        #[cfg(feature = "postgres")]
        DatabaseBackendType::PostgreSQL => Ok(Box::new(
            crate::postgresql::PostgresBackend::connect(dbstring).await?,
        )),
        #[cfg(feature = "mysql")]
        DatabaseBackendType::MySQL => Ok(Box::new(
            crate::mysql::MySqlBackend::connect(dbstring).await?,
        )),
        #[allow(unreachable_patterns)]
        other => {
            let _ = dbstring;
            Err(UnoError::OperationalError(format!(
                "the {other} backend is not compiled in; rebuild with the '{}' feature",
                other.feature()
            )))
        }
    }
}
