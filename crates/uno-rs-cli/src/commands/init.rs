//! The `init` command.

use async_trait::async_trait;
use uno_rs_core::{Settings, UnoError};
use uno_rs_db_migrations::{init_dir, Numbering};

use crate::command::ManagementCommand;

/// Creates the migrations directory with an initial SQL migration.
pub struct InitCommand;

#[async_trait]
impl ManagementCommand for InitCommand {
    fn name(&self) -> &'static str {
        "init"
    }

    fn help(&self) -> &'static str {
        "Create the migrations directory with a sample migration"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let numbering = if settings.sequential {
            Numbering::Sequential
        } else {
            Numbering::Timestamp
        };
        let path = init_dir(&settings.dir, numbering)?;
        println!("Created new file: {}", path.display());
        Ok(())
    }
}
