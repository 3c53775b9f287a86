//! Built-in commands.
//!
//! Each command implements the [`ManagementCommand`](crate::command::ManagementCommand)
//! trait. Commands that touch the database share [`open`], which builds the
//! executor from settings and opens the connection.

pub mod create;
pub mod down;
pub mod init;
pub mod status;
pub mod up;
pub mod version;

pub use create::CreateCommand;
pub use down::{DownCommand, DownToCommand};
pub use init::InitCommand;
pub use status::StatusCommand;
pub use up::{UpByOneCommand, UpCommand, UpToCommand};
pub use version::VersionCommand;

use std::sync::Arc;

use uno_rs_core::{Settings, UnoError};
use uno_rs_db_backends::DatabaseBackend;
use uno_rs_db_migrations::{connect, MigrationConfig, MigrationExecutor, MigrationRegistry, OsFs};

use crate::command::CommandRegistry;

/// Registers all built-in commands into the given registry.
///
/// `natives` holds the native migrations linked into the running binary.
pub fn register_builtin_commands(registry: &mut CommandRegistry, natives: &Arc<MigrationRegistry>) {
    registry.register(Box::new(UpCommand::new(Arc::clone(natives))));
    registry.register(Box::new(UpByOneCommand::new(Arc::clone(natives))));
    registry.register(Box::new(UpToCommand::new(Arc::clone(natives))));
    registry.register(Box::new(DownCommand::new(Arc::clone(natives))));
    registry.register(Box::new(DownToCommand::new(Arc::clone(natives))));
    registry.register(Box::new(StatusCommand::new(Arc::clone(natives))));
    registry.register(Box::new(VersionCommand::new(Arc::clone(natives))));
    registry.register(Box::new(CreateCommand::new(Arc::clone(natives))));
    registry.register(Box::new(InitCommand));
}

/// Builds an executor for `settings` and opens its database session.
pub(crate) async fn open(
    settings: &Settings,
    natives: &Arc<MigrationRegistry>,
) -> Result<(MigrationExecutor, Box<dyn DatabaseBackend>), UnoError> {
    if settings.driver.trim().is_empty() {
        return Err(UnoError::ConfigurationError(
            "no database driver: pass --driver or set MIGRATION_DRIVER".to_string(),
        ));
    }
    let config = MigrationConfig::from_settings(settings)?;
    let backend = connect(&settings.driver, &settings.dbstring).await?;
    tracing::debug!(driver = %config.dialect, dir = %config.dir.display(), "connected");

    let executor = MigrationExecutor::new(config, Arc::new(OsFs), Arc::clone(natives));
    Ok((executor, backend))
}

/// Reads a required `VERSION` argument.
pub(crate) fn version_arg(matches: &clap::ArgMatches) -> Result<i64, UnoError> {
    matches
        .get_one::<i64>("version")
        .copied()
        .ok_or_else(|| UnoError::ConfigurationError("missing VERSION argument".to_string()))
}

/// The `VERSION` positional argument shared by `up-to` and `down-to`.
pub(crate) fn version_positional() -> clap::Arg {
    clap::Arg::new("version")
        .value_name("VERSION")
        .help("Target version")
        .required(true)
        .value_parser(clap::value_parser!(i64))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use super::*;

    /// Builds the full CLI and resolves settings for `args`, ignoring the environment.
    pub fn parse(
        registry: &CommandRegistry,
        args: &[&str],
    ) -> (clap::ArgMatches, Settings) {
        let matches = registry
            .build_cli()
            .try_get_matches_from(std::iter::once("uno-migrate").chain(args.iter().copied()))
            .unwrap();
        let settings = crate::command::settings_from_matches_with(&matches, |_| None).unwrap();
        (matches, settings)
    }

    pub fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry, &Arc::new(MigrationRegistry::new()));
        registry
    }

    /// Common flags pointing at a SQLite file and a migrations directory.
    pub fn db_args(root: &Path) -> Vec<String> {
        vec![
            "--driver".to_string(),
            "sqlite3".to_string(),
            "--dbstring".to_string(),
            root.join("app.db").display().to_string(),
            "--dir".to_string(),
            root.join("migrations").display().to_string(),
        ]
    }

    pub fn write_migration(root: &Path, name: &str, table: &str) {
        let dir = root.join("migrations");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(name),
            format!(
                "-- +migration Up\nCREATE TABLE {table} (id INTEGER);\n\n-- +migration Down\nDROP TABLE {table};\n"
            ),
        )
        .unwrap();
    }

    /// Runs `args` through the registry.
    pub async fn run(registry: &CommandRegistry, root: &Path, args: &[&str]) -> Result<(), UnoError> {
        let mut all: Vec<String> = db_args(root);
        all.extend(args.iter().map(ToString::to_string));
        let refs: Vec<&str> = all.iter().map(String::as_str).collect();
        let (matches, settings) = parse(registry, &refs);
        registry.execute(&matches, &settings).await
    }

    /// Opens the test database and reads the current version.
    pub async fn current_version(root: &Path) -> i64 {
        let settings = Settings {
            driver: "sqlite3".to_string(),
            dbstring: root.join("app.db").display().to_string(),
            dir: root.join("migrations"),
            ..Settings::default()
        };
        let (executor, backend) = open(&settings, &Arc::new(MigrationRegistry::new()))
            .await
            .unwrap();
        executor.version(backend.as_ref()).await.unwrap()
    }
}
