//! Engine configuration.
//!
//! [`MigrationConfig`] is built once (usually from [`Settings`]) and handed to
//! the executor and the file generator. Nothing is read from process-wide
//! state after that.

use std::path::PathBuf;
use std::time::Duration;

use uno_rs_core::settings::{DEFAULT_MIGRATIONS_DIR, DEFAULT_TABLE_NAME};
use uno_rs_core::{Settings, UnoResult};

use crate::dialect::Dialect;

/// Policy flags for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Apply unapplied versions below the current version instead of failing.
    pub allow_missing: bool,
    /// Never read or write the version table.
    pub no_versioning: bool,
}

/// How new migration files are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Numbering {
    /// UTC `YYYYMMDDHHMMSS`.
    #[default]
    Timestamp,
    /// Five-digit zero-padded counter continuing after the highest version.
    Sequential,
}

/// Everything the engine needs besides a connection.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// SQL dialect of the version table.
    pub dialect: Dialect,
    /// Directory holding migration sources.
    pub dir: PathBuf,
    /// Version table name.
    pub table: String,
    /// Policy flags.
    pub options: RunOptions,
    /// Numbering for `create`.
    pub numbering: Numbering,
    /// Directive prefixes accepted by the script parser.
    pub annotation_prefixes: Vec<String>,
    /// Interval between progress reports for a long statement; `None` disables them.
    pub progress_interval: Option<Duration>,
}

impl MigrationConfig {
    /// Creates a configuration with defaults for everything but the dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            table: DEFAULT_TABLE_NAME.to_string(),
            options: RunOptions::default(),
            numbering: Numbering::default(),
            annotation_prefixes: vec!["+migration".to_string(), "+goose".to_string()],
            progress_interval: Some(Duration::from_secs(60)),
        }
    }

    /// Builds a configuration from validated settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the settings fail validation, or a
    /// dialect error if the driver is unknown.
    pub fn from_settings(settings: &Settings) -> UnoResult<Self> {
        settings.validate()?;
        Ok(Self {
            dialect: Dialect::from_driver(&settings.driver)?,
            dir: settings.dir.clone(),
            table: settings.table.clone(),
            options: RunOptions {
                allow_missing: settings.allow_missing,
                no_versioning: settings.no_versioning,
            },
            numbering: if settings.sequential {
                Numbering::Sequential
            } else {
                Numbering::Timestamp
            },
            annotation_prefixes: settings.annotation_prefixes.clone(),
            progress_interval: (settings.progress_interval_secs > 0)
                .then(|| Duration::from_secs(settings.progress_interval_secs)),
        })
    }

    /// Sets the migrations directory.
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Sets the version table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Sets the policy flags.
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the numbering used by `create`.
    #[must_use]
    pub fn with_numbering(mut self, numbering: Numbering) -> Self {
        self.numbering = numbering;
        self
    }

    /// Sets the progress interval.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Option<Duration>) -> Self {
        self.progress_interval = interval;
        self
    }
}
