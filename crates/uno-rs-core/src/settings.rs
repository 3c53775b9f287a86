//! Settings for the uno-rs migration tool.
//!
//! This module provides the [`Settings`] struct, which holds every knob the
//! migration engine and its CLI read: the driver and connection string, the
//! migrations directory, the version table name, numbering and policy flags,
//! and logging preferences. Settings are plain values passed explicitly to the
//! engine at construction; nothing here is stored process-wide.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::UnoError;

/// Default directory scanned for migration sources.
pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

/// Default name of the version table.
pub const DEFAULT_TABLE_NAME: &str = "migrations";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// The complete set of migration tool settings.
///
/// # Examples
///
/// ```
/// use uno_rs_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.table, "migrations");
/// assert!(!settings.allow_missing);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Connection ───────────────────────────────────────────────────

    /// The database driver identifier (e.g. `postgres`, `sqlite3`, `mysql`).
    pub driver: String,
    /// The driver-specific connection string.
    pub dbstring: String,

    // ── Sources ──────────────────────────────────────────────────────

    /// Directory containing migration sources.
    pub dir: PathBuf,
    /// Name of the version table.
    pub table: String,
    /// Use sequential (`00001`) instead of timestamp numbering for new files.
    pub sequential: bool,
    /// Comment directive prefixes recognized in SQL scripts, e.g. `+migration`
    /// for `-- +migration Up`.
    pub annotation_prefixes: Vec<String>,

    // ── Policy ───────────────────────────────────────────────────────

    /// Apply migrations older than the current version that were never applied.
    pub allow_missing: bool,
    /// Never read or write the version table; order by files alone.
    pub no_versioning: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// Force debug-level logging.
    pub verbose: bool,
    /// The log filter directive (e.g. `info`, `debug`, `uno_rs_db_migrations=trace`).
    pub log_level: String,
    /// The log output format.
    pub log_format: LogFormat,
    /// Seconds between "still running" lines for long statements. Zero disables them.
    pub progress_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            driver: String::new(),
            dbstring: String::new(),
            dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            table: DEFAULT_TABLE_NAME.to_string(),
            sequential: false,
            annotation_prefixes: vec!["+migration".to_string(), "+goose".to_string()],
            allow_missing: false,
            no_versioning: false,
            verbose: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            progress_interval_secs: 60,
        }
    }
}

impl Settings {
    /// Returns the effective log filter, taking `verbose` into account.
    pub fn effective_log_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Checks values that would otherwise surface as confusing SQL errors.
    ///
    /// The table name is interpolated into SQL, so it must be a plain
    /// identifier, optionally qualified by a single schema name.
    pub fn validate(&self) -> Result<(), UnoError> {
        if !is_valid_table_name(&self.table) {
            return Err(UnoError::ConfigurationError(format!(
                "invalid version table name '{}': expected [schema.]identifier",
                self.table
            )));
        }
        if self.annotation_prefixes.is_empty() {
            return Err(UnoError::ConfigurationError(
                "at least one annotation prefix is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert_eq!(s.dir, PathBuf::from("./migrations"));
        assert_eq!(s.table, "migrations");
        assert!(!s.sequential);
        assert!(!s.no_versioning);
        assert_eq!(s.log_level, "info");
        assert_eq!(s.log_format, LogFormat::Text);
        assert_eq!(s.progress_interval_secs, 60);
        assert_eq!(s.annotation_prefixes, vec!["+migration", "+goose"]);
    }

    #[test]
    fn test_effective_log_level() {
        let mut s = Settings::default();
        assert_eq!(s.effective_log_level(), "info");
        s.verbose = true;
        assert_eq!(s.effective_log_level(), "debug");
    }

    #[test]
    fn test_validate_table_names() {
        let mut s = Settings::default();
        assert!(s.validate().is_ok());

        s.table = "public.schema_versions".into();
        assert!(s.validate().is_ok());

        for bad in ["", "1abc", "a.b.c", "versions; DROP TABLE x", "a-b", "."] {
            s.table = bad.into();
            assert!(
                matches!(s.validate(), Err(UnoError::ConfigurationError(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_requires_prefix() {
        let s = Settings {
            annotation_prefixes: Vec::new(),
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_log_format_serde() {
        let json = serde_json::to_string(&LogFormat::Json).unwrap();
        assert_eq!(json, "\"json\"");
        let parsed: LogFormat = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(parsed, LogFormat::Text);
    }
}
