//! The `version` command.

use std::sync::Arc;

use async_trait::async_trait;
use uno_rs_core::{Settings, UnoError};
use uno_rs_db_migrations::MigrationRegistry;

use super::open;
use crate::command::ManagementCommand;

/// Prints the current version of the database.
pub struct VersionCommand {
    natives: Arc<MigrationRegistry>,
}

impl VersionCommand {
    /// Creates the command with the native migrations linked into the binary.
    pub fn new(natives: Arc<MigrationRegistry>) -> Self {
        Self { natives }
    }
}

#[async_trait]
impl ManagementCommand for VersionCommand {
    fn name(&self) -> &'static str {
        "version"
    }

    fn help(&self) -> &'static str {
        "Print the current version of the database"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let (executor, backend) = open(settings, &self.natives).await?;
        let version = executor.version(backend.as_ref()).await?;
        println!("version {version}");
        Ok(())
    }
}
