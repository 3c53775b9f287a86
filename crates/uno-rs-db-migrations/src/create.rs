//! Generating new migration files.
//!
//! [`create_migration`] writes `<version>_<snake_name>.<ext>` from a built-in
//! template and [`init_dir`] bootstraps an empty migrations directory. New
//! files are written to the real filesystem, never through a
//! [`MigrationFs`](crate::fs::MigrationFs).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use uno_rs_core::utils::text::{snake_case, studly_case};
use uno_rs_core::{UnoError, UnoResult};

use crate::config::Numbering;
use crate::source::{Migrations, NATIVE_EXTENSION, SQL_EXTENSION};

/// `chrono` format of timestamp versions.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Which template a new migration is generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateKind {
    /// An annotated SQL script.
    #[default]
    Sql,
    /// A `NativeMigration` implementation.
    Native,
}

impl TemplateKind {
    /// File extension of the generated source.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Sql => SQL_EXTENSION,
            Self::Native => NATIVE_EXTENSION,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TemplateKind {
    type Err = UnoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sql" => Ok(Self::Sql),
            "rs" | "rust" | "native" => Ok(Self::Native),
            other => Err(UnoError::ConfigurationError(format!(
                "unknown migration type {other:?}: expected sql or rs"
            ))),
        }
    }
}

const SQL_TEMPLATE: &str = "\
-- +migration Up
-- +migration StatementBegin
SELECT 'up SQL query';
-- +migration StatementEnd

-- +migration Down
-- +migration StatementBegin
SELECT 'down SQL query';
-- +migration StatementEnd
";

const INIT_TEMPLATE: &str = "\
-- This file was created by `uno-migrate init`. Feel free to rename or remove
-- it once you have written your first real migration.
--
-- A migration .sql file holds both directions. Every file needs a
-- `-- +migration Up` directive; `-- +migration Down` is optional and must come
-- after it.
--
-- Add `-- +migration NO TRANSACTION` at the top of the file to run the
-- statements outside a transaction, in both directions.
--
-- Statements containing semicolons of their own (functions, triggers) must be
-- wrapped in `-- +migration StatementBegin` and `-- +migration StatementEnd`.

-- +migration Up
SELECT 'up SQL query';

-- +migration Down
SELECT 'down SQL query';
";

fn native_template(name: &str) -> String {
    format!(
        "\
use uno_rs_core::UnoResult;
use uno_rs_db_backends::Transaction;
use uno_rs_db_migrations::NativeMigration;

pub struct {name};

#[async_trait::async_trait]
impl NativeMigration for {name} {{
    async fn up(&self, tx: &Transaction<'_>) -> UnoResult<()> {{
        // Runs when the migration is applied.
        let _ = tx;
        Ok(())
    }}

    async fn down(&self, tx: &Transaction<'_>) -> UnoResult<()> {{
        // Runs when the migration is rolled back.
        let _ = tx;
        Ok(())
    }}
}}
"
    )
}

/// The version a new migration gets.
///
/// Sequential numbering continues after the highest existing version,
/// zero-padded to five digits. Timestamp numbering uses the current UTC time.
pub fn next_version(numbering: Numbering, existing: &Migrations) -> String {
    match numbering {
        Numbering::Sequential => {
            let next = existing.last().map_or(1, |s| s.version + 1);
            format!("{next:05}")
        }
        Numbering::Timestamp => chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string(),
    }
}

/// Writes a new migration named `name` into `dir` and returns its path.
///
/// # Errors
///
/// Returns [`UnoError::ConfigurationError`] if `name` is empty or the file
/// already exists, and [`UnoError::IoError`] if it cannot be written.
pub fn create_migration(
    dir: &Path,
    name: &str,
    kind: TemplateKind,
    numbering: Numbering,
    existing: &Migrations,
) -> UnoResult<PathBuf> {
    let snake = snake_case(name.trim());
    if snake.is_empty() {
        return Err(UnoError::ConfigurationError(
            "migration name must not be empty".into(),
        ));
    }

    let version = next_version(numbering, existing);
    let contents = match kind {
        TemplateKind::Sql => SQL_TEMPLATE.to_string(),
        TemplateKind::Native => native_template(&studly_case(&snake)),
    };
    write_new(dir, &format!("{version}_{snake}.{}", kind.extension()), &contents)
}

/// Creates `dir` with an initial SQL migration and returns the file's path.
///
/// # Errors
///
/// Returns [`UnoError::ConfigurationError`] if `dir` already exists.
pub fn init_dir(dir: &Path, numbering: Numbering) -> UnoResult<PathBuf> {
    if dir.exists() {
        return Err(UnoError::ConfigurationError(format!(
            "directory already exists: {}",
            dir.display()
        )));
    }
    fs::create_dir_all(dir)?;

    let version = next_version(numbering, &Migrations::default());
    write_new(dir, &format!("{version}_initial.{SQL_EXTENSION}"), INIT_TEMPLATE)
}

fn write_new(dir: &Path, file_name: &str, contents: &str) -> UnoResult<PathBuf> {
    let path = dir.join(file_name);
    if path.exists() {
        return Err(UnoError::ConfigurationError(format!(
            "failed to create migration file: {} already exists",
            path.display()
        )));
    }
    fs::write(&path, contents)?;
    tracing::info!("created new file: {}", path.display());
    Ok(path)
}
