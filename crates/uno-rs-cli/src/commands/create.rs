//! The `create` command.
//!
//! Writes a new migration file from a template. Sequential numbering reads
//! the existing sources to continue after the highest version; timestamp
//! numbering does not look at the directory at all.

use std::sync::Arc;

use async_trait::async_trait;
use uno_rs_core::{Settings, UnoError};
use uno_rs_db_migrations::{
    create_migration, MigrationCollector, MigrationRegistry, Migrations, Numbering, OsFs,
    TemplateKind,
};

use crate::command::ManagementCommand;

/// Creates a new migration file.
pub struct CreateCommand {
    natives: Arc<MigrationRegistry>,
}

impl CreateCommand {
    /// Creates the command with the native migrations linked into the binary.
    pub fn new(natives: Arc<MigrationRegistry>) -> Self {
        Self { natives }
    }
}

#[async_trait]
impl ManagementCommand for CreateCommand {
    fn name(&self) -> &'static str {
        "create"
    }

    fn help(&self) -> &'static str {
        "Create a new migration file (NAME [sql|rs])"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("name")
                .value_name("NAME")
                .help("Migration name, converted to snake_case")
                .required(true),
        )
        .arg(
            clap::Arg::new("type")
                .value_name("TYPE")
                .help("Template: sql or rs")
                .default_value("sql"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let name = matches
            .get_one::<String>("name")
            .ok_or_else(|| UnoError::ConfigurationError("missing NAME argument".to_string()))?;
        let kind: TemplateKind = matches
            .get_one::<String>("type")
            .map_or("sql", String::as_str)
            .parse()?;
        let numbering = if settings.sequential {
            Numbering::Sequential
        } else {
            Numbering::Timestamp
        };

        let existing = match numbering {
            Numbering::Sequential => {
                MigrationCollector::new(&OsFs, &self.natives).collect(&settings.dir)?
            }
            Numbering::Timestamp => Migrations::default(),
        };

        let path = create_migration(&settings.dir, name, kind, numbering, &existing)?;
        println!("Created new file: {}", path.display());
        Ok(())
    }
}
