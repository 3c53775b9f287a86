//! # uno-rs-db-backends
//!
//! Database sessions for the uno-rs migration engine. Each backend owns a
//! single connection so that transaction control statements and the statements
//! they bracket always run on the same session.
//!
//! Supported backends (each behind a cargo feature of the same name):
//! - `SQLite` (`sqlite`, enabled by default)
//! - `PostgreSQL` (`postgres`)
//! - `MySQL` (`mysql`)

// Clippy overrides appropriate for a driver-glue crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]

pub mod base;
pub mod value;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgresql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use base::{connect, DatabaseBackend, DatabaseBackendType, Transaction};
pub use value::{FromValue, Row, Value};

#[cfg(feature = "mysql")]
pub use mysql::MySqlBackend;
#[cfg(feature = "postgres")]
pub use postgresql::PostgresBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
