//! The `up`, `up-by-one`, and `up-to` commands.
//!
//! Each applies pending migrations in ascending version order and stops at the
//! first failure.

use std::sync::Arc;

use async_trait::async_trait;
use uno_rs_core::{Settings, UnoError};
use uno_rs_db_migrations::MigrationRegistry;

use super::{open, version_arg, version_positional};
use crate::command::ManagementCommand;

/// Migrates the database to the most recent version available.
pub struct UpCommand {
    natives: Arc<MigrationRegistry>,
}

impl UpCommand {
    /// Creates the command with the native migrations linked into the binary.
    pub fn new(natives: Arc<MigrationRegistry>) -> Self {
        Self { natives }
    }
}

#[async_trait]
impl ManagementCommand for UpCommand {
    fn name(&self) -> &'static str {
        "up"
    }

    fn help(&self) -> &'static str {
        "Migrate the DB to the most recent version available"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let (executor, backend) = open(settings, &self.natives).await?;
        executor.up(backend.as_ref()).await
    }
}

/// Migrates the database up by exactly one version.
pub struct UpByOneCommand {
    natives: Arc<MigrationRegistry>,
}

impl UpByOneCommand {
    /// Creates the command with the native migrations linked into the binary.
    pub fn new(natives: Arc<MigrationRegistry>) -> Self {
        Self { natives }
    }
}

#[async_trait]
impl ManagementCommand for UpByOneCommand {
    fn name(&self) -> &'static str {
        "up-by-one"
    }

    fn help(&self) -> &'static str {
        "Migrate the DB up by 1"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let (executor, backend) = open(settings, &self.natives).await?;
        executor.up_by_one(backend.as_ref()).await
    }
}

/// Migrates the database up to a specific version.
pub struct UpToCommand {
    natives: Arc<MigrationRegistry>,
}

impl UpToCommand {
    /// Creates the command with the native migrations linked into the binary.
    pub fn new(natives: Arc<MigrationRegistry>) -> Self {
        Self { natives }
    }
}

#[async_trait]
impl ManagementCommand for UpToCommand {
    fn name(&self) -> &'static str {
        "up-to"
    }

    fn help(&self) -> &'static str {
        "Migrate the DB to a specific VERSION"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(version_positional())
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let version = version_arg(matches)?;
        let (executor, backend) = open(settings, &self.natives).await?;
        executor.up_to(backend.as_ref(), version).await
    }
}
