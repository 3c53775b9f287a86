//! The `down` and `down-to` commands.

use std::sync::Arc;

use async_trait::async_trait;
use uno_rs_core::{Settings, UnoError};
use uno_rs_db_migrations::MigrationRegistry;

use super::{open, version_arg, version_positional};
use crate::command::ManagementCommand;

/// Rolls back the most recently applied migration.
pub struct DownCommand {
    natives: Arc<MigrationRegistry>,
}

impl DownCommand {
    /// Creates the command with the native migrations linked into the binary.
    pub fn new(natives: Arc<MigrationRegistry>) -> Self {
        Self { natives }
    }
}

#[async_trait]
impl ManagementCommand for DownCommand {
    fn name(&self) -> &'static str {
        "down"
    }

    fn help(&self) -> &'static str {
        "Roll back the version by 1"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let (executor, backend) = open(settings, &self.natives).await?;
        executor.down(backend.as_ref()).await
    }
}

/// Rolls back every migration newer than a version.
pub struct DownToCommand {
    natives: Arc<MigrationRegistry>,
}

impl DownToCommand {
    /// Creates the command with the native migrations linked into the binary.
    pub fn new(natives: Arc<MigrationRegistry>) -> Self {
        Self { natives }
    }
}

#[async_trait]
impl ManagementCommand for DownToCommand {
    fn name(&self) -> &'static str {
        "down-to"
    }

    fn help(&self) -> &'static str {
        "Roll back to a specific VERSION"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(version_positional())
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let version = version_arg(matches)?;
        let (executor, backend) = open(settings, &self.natives).await?;
        executor.down_to(backend.as_ref(), version).await
    }
}
