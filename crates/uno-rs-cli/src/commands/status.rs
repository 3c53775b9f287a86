//! The `status` command.
//!
//! Prints every migration source with the time it was applied, or `Pending`.

use std::sync::Arc;

use async_trait::async_trait;
use uno_rs_core::{Settings, UnoError};
use uno_rs_db_migrations::{MigrationRegistry, MigrationStatus};

use super::open;
use crate::command::ManagementCommand;

/// Dumps the migration status for the current database.
pub struct StatusCommand {
    natives: Arc<MigrationRegistry>,
}

impl StatusCommand {
    /// Creates the command with the native migrations linked into the binary.
    pub fn new(natives: Arc<MigrationRegistry>) -> Self {
        Self { natives }
    }
}

#[async_trait]
impl ManagementCommand for StatusCommand {
    fn name(&self) -> &'static str {
        "status"
    }

    fn help(&self) -> &'static str {
        "Dump the migration status for the current DB"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("json")
                .long("json")
                .action(clap::ArgAction::SetTrue)
                .help("Print the status as JSON"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), UnoError> {
        let (executor, backend) = open(settings, &self.natives).await?;
        let statuses = executor.status(backend.as_ref()).await?;

        if matches.get_flag("json") {
            let json = serde_json::to_string_pretty(&statuses).map_err(|e| {
                UnoError::ConfigurationError(format!("Failed to serialize status: {e}"))
            })?;
            println!("{json}");
        } else {
            print!("{}", render_table(&statuses));
        }
        Ok(())
    }
}

/// Formats statuses as an aligned two-column table.
pub fn render_table(statuses: &[MigrationStatus]) -> String {
    let mut out = String::from("    Applied At                  Migration\n");
    out.push_str("    =======================================\n");
    for status in statuses {
        let applied = match (status.applied, status.applied_at) {
            (true, Some(at)) => at.format("%a %b %e %H:%M:%S %Y").to_string(),
            (true, None) => "Applied".to_string(),
            (false, _) => "Pending".to_string(),
        };
        out.push_str(&format!("    {applied:<24}    -- {}\n", status.source));
    }
    out
}
