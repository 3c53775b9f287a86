//! Command framework for `uno-migrate`.
//!
//! This module provides the [`ManagementCommand`] trait for defining CLI
//! commands and [`CommandRegistry`] for registering and dispatching them. The
//! registry also owns the global options shared by every command and turns
//! them into [`Settings`].
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use uno_rs_cli::command::ManagementCommand;
//! use uno_rs_core::{Settings, UnoError};
//!
//! struct DriverCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for DriverCommand {
//!     fn name(&self) -> &str { "driver" }
//!     fn help(&self) -> &str { "Print the configured driver" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         settings: &Settings,
//!     ) -> Result<(), UnoError> {
//!         println!("{}", settings.driver);
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use clap::{Arg, ArgAction, ArgMatches};
use uno_rs_core::settings_loader;
use uno_rs_core::{Settings, UnoError};

/// A command that can be registered and invoked through the CLI.
///
/// Implementations define a name, help text, optional arguments, and an
/// async handler. All commands must be `Send + Sync`.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &str;

    /// Returns a short help description for this command.
    fn help(&self) -> &str;

    /// Adds custom arguments to the clap command.
    ///
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command with the given argument matches and settings.
    async fn handle(&self, matches: &ArgMatches, settings: &Settings) -> Result<(), UnoError>;
}

/// A registry of commands.
///
/// Commands are registered by name and can be looked up, listed, or executed.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a command.
    ///
    /// If a command with the same name already exists, it is replaced.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns a reference to the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level clap `Command` with the global options and every
    /// registered subcommand.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = global_arguments(
            clap::Command::new("uno-migrate")
                .about("Versioned schema migrations")
                .version(env!("CARGO_PKG_VERSION"))
                .subcommand_required(true)
                .arg_required_else_help(true),
        );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| (*name).clone());

        for (name, cmd) in entries {
            // clap needs 'static names; commands are registered once at startup.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }

        app
    }

    /// Executes the command identified by the given argument matches.
    pub async fn execute(&self, matches: &ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            UnoError::ConfigurationError("No subcommand specified".to_string())
        })?;

        let cmd = self.get(name).ok_or_else(|| {
            UnoError::ConfigurationError(format!("Unknown command: {name}"))
        })?;

        tracing::debug!(command = name, "dispatching command");
        cmd.handle(sub_matches, settings).await
    }
}

fn global_arguments(app: clap::Command) -> clap::Command {
    let flag = |id: &'static str, help: &'static str| {
        Arg::new(id)
            .long(id)
            .action(ArgAction::SetTrue)
            .global(true)
            .help(help)
    };
    let option = |id: &'static str, value_name: &'static str, help: &'static str| {
        Arg::new(id)
            .long(id)
            .value_name(value_name)
            .global(true)
            .help(help)
    };

    app.arg(
        option("config", "FILE", "TOML settings file")
            .value_parser(clap::value_parser!(PathBuf)),
    )
    .arg(option("driver", "DRIVER", "Database driver [env: MIGRATION_DRIVER]"))
    .arg(option("dbstring", "DBSTRING", "Connection string [env: MIGRATION_DBSTRING]"))
    .arg(
        option("dir", "DIR", "Directory with migration files [env: MIGRATION_DIR]")
            .value_parser(clap::value_parser!(PathBuf)),
    )
    .arg(option("table", "TABLE", "Version table name [env: MIGRATION_TABLE]"))
    .arg(flag("verbose", "Enable verbose logging").short('v'))
    .arg(flag("sequential", "Use sequential numbering for new migrations").short('s'))
    .arg(flag("allow-missing", "Apply missing (out-of-order) migrations"))
    .arg(flag(
        "no-versioning",
        "Apply migrations in file order without touching the version table",
    ))
}

/// Resolves settings from the global options and the process environment.
///
/// Precedence, lowest first: defaults, the `--config` file, `MIGRATION_*`
/// variables, command-line options.
pub fn settings_from_matches(matches: &ArgMatches) -> Result<Settings, UnoError> {
    settings_from_matches_with(matches, |key| std::env::var(key).ok())
}

/// Like [`settings_from_matches`], reading variables through `lookup`.
pub fn settings_from_matches_with<F>(matches: &ArgMatches, lookup: F) -> Result<Settings, UnoError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match matches.get_one::<PathBuf>("config") {
        Some(path) => settings_loader::from_toml_file(path)?,
        None => Settings::default(),
    };
    settings_loader::apply_overrides_from(&mut settings, lookup);

    if let Some(driver) = matches.get_one::<String>("driver") {
        settings.driver.clone_from(driver);
    }
    if let Some(dbstring) = matches.get_one::<String>("dbstring") {
        settings.dbstring.clone_from(dbstring);
    }
    if let Some(dir) = matches.get_one::<PathBuf>("dir") {
        settings.dir.clone_from(dir);
    }
    if let Some(table) = matches.get_one::<String>("table") {
        settings.table.clone_from(table);
    }
    settings.verbose |= matches.get_flag("verbose");
    settings.sequential |= matches.get_flag("sequential");
    settings.allow_missing |= matches.get_flag("allow-missing");
    settings.no_versioning |= matches.get_flag("no-versioning");

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCommand {
        cmd_name: String,
    }

    impl TestCommand {
        fn new(name: &str) -> Self {
            Self {
                cmd_name: name.to_string(),
            }
        }
    }

    #[async_trait]
    impl ManagementCommand for TestCommand {
        fn name(&self) -> &str {
            &self.cmd_name
        }

        fn help(&self) -> &'static str {
            "A test command"
        }

        fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue),
            )
        }

        async fn handle(&self, _matches: &ArgMatches, _settings: &Settings) -> Result<(), UnoError> {
            Ok(())
        }
    }

    struct FailingCommand;

    #[async_trait]
    impl ManagementCommand for FailingCommand {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn help(&self) -> &'static str {
            "A command that always fails"
        }

        async fn handle(&self, _matches: &ArgMatches, _settings: &Settings) -> Result<(), UnoError> {
            Err(UnoError::ConfigurationError("deliberate failure".to_string()))
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── Registry ────────────────────────────────────────────────────

    #[test]
    fn test_registry_new_is_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("up")));
        assert_eq!(registry.len(), 1);

        let cmd = registry.get("up").unwrap();
        assert_eq!(cmd.name(), "up");
        assert_eq!(cmd.help(), "A test command");
        assert!(registry.get("sideways").is_none());
    }

    #[test]
    fn test_list_commands_sorted() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("version")));
        registry.register(Box::new(TestCommand::new("down")));
        registry.register(Box::new(TestCommand::new("status")));

        assert_eq!(registry.list_commands(), vec!["down", "status", "version"]);
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("up")));
        registry.register(Box::new(TestCommand::new("up")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_build_cli_with_arguments() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("up")));

        let matches = registry
            .build_cli()
            .try_get_matches_from(["uno-migrate", "up", "--json", "-v"])
            .unwrap();
        let (name, sub_matches) = matches.subcommand().unwrap();
        assert_eq!(name, "up");
        assert!(sub_matches.get_flag("json"));
        assert!(matches.get_flag("verbose"));
    }

    #[tokio::test]
    async fn test_execute_success_and_failure() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("up")));
        registry.register(Box::new(FailingCommand));
        let settings = Settings::default();

        let matches = registry
            .build_cli()
            .try_get_matches_from(["uno-migrate", "up"])
            .unwrap();
        assert!(registry.execute(&matches, &settings).await.is_ok());

        let matches = registry
            .build_cli()
            .try_get_matches_from(["uno-migrate", "fail"])
            .unwrap();
        assert!(registry.execute(&matches, &settings).await.is_err());
    }

    // ── Settings ────────────────────────────────────────────────────

    #[test]
    fn test_settings_from_flags() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("up")));
        let matches = registry
            .build_cli()
            .try_get_matches_from([
                "uno-migrate",
                "--driver",
                "postgres",
                "--dbstring",
                "host=localhost",
                "up",
                "--dir",
                "db/migrations",
                "--table",
                "schema_versions",
                "-s",
                "--allow-missing",
            ])
            .unwrap();

        let settings = settings_from_matches_with(&matches, no_env).unwrap();
        assert_eq!(settings.driver, "postgres");
        assert_eq!(settings.dbstring, "host=localhost");
        assert_eq!(settings.dir, PathBuf::from("db/migrations"));
        assert_eq!(settings.table, "schema_versions");
        assert!(settings.sequential);
        assert!(settings.allow_missing);
        assert!(!settings.no_versioning);
    }

    #[test]
    fn test_flags_override_environment() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("up")));
        let matches = registry
            .build_cli()
            .try_get_matches_from(["uno-migrate", "--driver", "mysql", "up"])
            .unwrap();

        let env = |key: &str| match key {
            "MIGRATION_DRIVER" => Some("sqlite3".to_string()),
            "MIGRATION_DBSTRING" => Some("app.db".to_string()),
            _ => None,
        };
        let settings = settings_from_matches_with(&matches, env).unwrap();
        assert_eq!(settings.driver, "mysql");
        assert_eq!(settings.dbstring, "app.db");
    }

    #[test]
    fn test_settings_from_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("uno.toml");
        std::fs::write(&path, "driver = \"sqlite3\"\ntable = \"versions\"\n").unwrap();

        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("up")));
        let matches = registry
            .build_cli()
            .try_get_matches_from(["uno-migrate", "--config", path.to_str().unwrap(), "up"])
            .unwrap();

        let settings = settings_from_matches_with(&matches, no_env).unwrap();
        assert_eq!(settings.driver, "sqlite3");
        assert_eq!(settings.table, "versions");
    }

    #[test]
    fn test_invalid_table_rejected() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("up")));
        let matches = registry
            .build_cli()
            .try_get_matches_from(["uno-migrate", "--table", "bad table", "up"])
            .unwrap();

        let err = settings_from_matches_with(&matches, no_env).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
