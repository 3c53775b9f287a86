//! # uno-rs-db-migrations
//!
//! Versioned schema migrations for the uno-rs toolkit. Migrations are SQL
//! scripts annotated with `-- +migration` directives, or Rust types
//! implementing [`NativeMigration`] that are linked into the binary. Applied
//! versions are tracked in a version table.
//!
//! ## Architecture
//!
//! - [`ScriptParser`] splits a script into the statements of one direction.
//! - [`MigrationCollector`] discovers sources through a [`MigrationFs`].
//! - [`VersionStore`] reads and writes the version table using a [`Dialect`].
//! - [`MigrationRunner`] executes one source, transactionally unless the
//!   script opts out.
//! - [`MigrationExecutor`] implements the verbs (`up`, `down`, `status`, ...).
//!
//! ## Module Overview
//!
//! - [`config`] - `MigrationConfig`, `RunOptions`, `Numbering`
//! - [`create`] - `create_migration`, `init_dir`
//! - [`dialect`] - `Dialect`, `connect`
//! - [`executor`] - `MigrationExecutor`, `MigrationStatus`
//! - [`fs`] - `MigrationFs`, `OsFs`, `MemoryFs`
//! - [`parser`] - `ScriptParser`, `ParsedScript`, `Direction`
//! - [`pool`] - `BufferPool`
//! - [`registry`] - `NativeMigration`, `MigrationRegistry`
//! - [`runner`] - `MigrationRunner`, `ProgressEvent`
//! - [`source`] - `MigrationSource`, `Migrations`, `MigrationCollector`
//! - [`store`] - `VersionStore`, `VersionRecord`
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use uno_rs_db_migrations::{
//!     connect, Dialect, MigrationConfig, MigrationExecutor, MigrationRegistry, OsFs,
//! };
//!
//! # async fn run() -> uno_rs_core::UnoResult<()> {
//! let backend = connect("sqlite3", "app.db").await?;
//! let config = MigrationConfig::new(Dialect::Sqlite3).with_dir("migrations");
//! let executor = MigrationExecutor::new(config, Arc::new(OsFs), Arc::new(MigrationRegistry::new()));
//! executor.up(backend.as_ref()).await?;
//! # Ok(())
//! # }
//! ```

// Clippy overrides appropriate for a migration engine crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::future_not_send)]
#![allow(clippy::cast_possible_wrap)]

pub mod config;
pub mod create;
pub mod dialect;
pub mod executor;
pub mod fs;
pub mod parser;
pub mod pool;
pub mod registry;
pub mod runner;
pub mod source;
pub mod store;

// Re-export key types at the crate root.
pub use config::{MigrationConfig, Numbering, RunOptions};
pub use create::{create_migration, init_dir, TemplateKind};
pub use dialect::{connect, Dialect};
pub use executor::{MigrationExecutor, MigrationStatus};
pub use fs::{MemoryFs, MigrationFs, OsFs};
pub use parser::{Direction, ParsedScript, ScriptParser};
pub use pool::BufferPool;
pub use registry::{MigrationRegistry, NativeMigration};
pub use runner::{MigrationRunner, ProgressCallback, ProgressEvent};
pub use source::{MigrationCollector, MigrationSource, Migrations, SourceKind};
pub use store::{VersionRecord, VersionStore};
