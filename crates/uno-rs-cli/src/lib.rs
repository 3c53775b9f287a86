//! # uno-rs-cli
//!
//! The `uno-migrate` command-line tool.
//!
//! This crate provides:
//!
//! - **Command framework** - [`ManagementCommand`] and [`CommandRegistry`],
//!   including the global options shared by every command
//! - **Built-in commands** - `up`, `up-by-one`, `up-to`, `down`, `down-to`,
//!   `status`, `version`, `create`, `init`
//! - **[`run`]** - the whole program as a function, so an application can
//!   build its own binary with native migrations linked in
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use uno_rs_cli::command::CommandRegistry;
//! use uno_rs_cli::commands::register_builtin_commands;
//! use uno_rs_db_migrations::MigrationRegistry;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry, &Arc::new(MigrationRegistry::new()));
//!
//! let names = registry.list_commands();
//! assert!(names.contains(&"up"));
//! assert!(names.contains(&"status"));
//! ```

// These clippy lints are intentionally allowed:
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: some functions may gain runtime logic later
// - module_name_repetitions: re-exports make module-prefixed names redundant
// - unused_async: command handlers maintain consistent async signatures
// - format_push_string: status tables are built line by line
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]
#![allow(clippy::format_push_string)]

pub mod command;
pub mod commands;

use std::process::ExitCode;
use std::sync::Arc;

use uno_rs_core::logging::setup_logging;
use uno_rs_db_migrations::MigrationRegistry;

pub use command::{settings_from_matches, CommandRegistry, ManagementCommand};

/// Parses the process arguments, runs the chosen command, and maps the
/// outcome to an exit code.
///
/// `natives` holds the native migrations linked into the calling binary.
pub async fn run(natives: Arc<MigrationRegistry>) -> ExitCode {
    let mut registry = CommandRegistry::new();
    commands::register_builtin_commands(&mut registry, &natives);

    let matches = registry.build_cli().get_matches();
    let settings = match settings_from_matches(&matches) {
        Ok(settings) => settings,
        Err(e) => return fail(&e),
    };
    setup_logging(&settings);

    match registry.execute(&matches, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn fail(err: &uno_rs_core::UnoError) -> ExitCode {
    tracing::error!("migration run: {err}");
    eprintln!("uno-migrate: {err}");
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}
