//! Core error types for uno-rs.
//!
//! This module provides the [`UnoError`] enum, which covers every failure the
//! migration engine can report: malformed migration scripts, unknown drivers,
//! out-of-order versions, statement failures, and missing native registrations,
//! plus the ambient database, configuration, and I/O errors around them.

use thiserror::Error;

/// The primary error type for uno-rs.
///
/// The first group of variants is the engine's own taxonomy. Parse errors are
/// raised before any database interaction, so they never leave partial state.
/// Execution errors always wrap the underlying driver error as their source.
///
/// Each variant maps to a process exit code via [`UnoError::exit_code`].
#[derive(Error, Debug)]
pub enum UnoError {
    // ── Migration engine ─────────────────────────────────────────────

    /// A migration script or filename violates the annotation grammar or
    /// naming convention.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The requested database driver is not recognized.
    #[error("Dialect error: {0}")]
    DialectError(String),

    /// Migrations older than the current version exist but were never applied.
    #[error(
        "Version conflict: found {count} missing migration(s) before current version: {list}",
        count = .missing.len(),
        list = join_versions(.missing)
    )]
    VersionConflict {
        /// The unapplied versions below the current version, ascending.
        missing: Vec<i64>,
    },

    /// A statement or version-table mutation failed inside a migration.
    #[error("{file}: {context}: {cause}")]
    Execution {
        /// Base name of the migration source that failed.
        file: String,
        /// What the runner was doing when the failure happened.
        context: String,
        /// The cleaned statement text, when a script statement failed.
        statement: Option<String>,
        /// The underlying driver error.
        #[source]
        cause: Box<UnoError>,
    },

    /// A native migration was run without a linked callback.
    #[error("Registration error: {0}")]
    RegistrationError(String),

    /// No pending migration exists for a single-step apply.
    #[error("No next version found")]
    NoNextVersion,

    /// A referenced migration or version does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    // ── Database ─────────────────────────────────────────────────────

    /// A generic database error reported by a driver.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// An operational database error (connection failure, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl UnoError {
    /// Returns the process exit code associated with this error.
    ///
    /// - `ParseError`, `DialectError`, `ConfigurationError` -> 2
    /// - `VersionConflict` -> 3
    /// - Everything else -> 1
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ParseError(_) | Self::DialectError(_) | Self::ConfigurationError(_) => 2,
            Self::VersionConflict { .. } => 3,
            Self::Execution { .. }
            | Self::RegistrationError(_)
            | Self::NoNextVersion
            | Self::NotFound(_)
            | Self::DatabaseError(_)
            | Self::OperationalError(_)
            | Self::IoError(_) => 1,
        }
    }

    /// Wraps a driver error raised while running a migration.
    pub fn execution(
        file: impl Into<String>,
        context: impl Into<String>,
        statement: Option<String>,
        cause: Self,
    ) -> Self {
        Self::Execution {
            file: file.into(),
            context: context.into(),
            statement,
            cause: Box::new(cause),
        }
    }
}

fn join_versions(versions: &[i64]) -> String {
    versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A convenience type alias for `Result<T, UnoError>`.
pub type UnoResult<T> = Result<T, UnoError>;
