//! `uno-migrate`: apply, revert, inspect, and create schema migrations.
//!
//! ```bash
//! uno-migrate --driver sqlite3 --dbstring ./app.db status
//! MIGRATION_DRIVER=postgres MIGRATION_DBSTRING="host=localhost user=postgres" uno-migrate up
//! uno-migrate -s create add_users_table sql
//! ```
//!
//! This binary carries no native migrations. Applications with native
//! migrations build their own binary around [`uno_rs_cli::run`].

use std::process::ExitCode;
use std::sync::Arc;

use uno_rs_db_migrations::MigrationRegistry;

#[tokio::main]
async fn main() -> ExitCode {
    uno_rs_cli::run(Arc::new(MigrationRegistry::new())).await
}
