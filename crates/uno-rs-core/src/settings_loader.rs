//! Settings loading from configuration files and the environment.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML file (overriding defaults).
//! 3. Apply environment variable overrides.
//!
//! Command-line flags are applied last by the CLI and win over all of these.
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `MIGRATION_DRIVER` | `driver` |
//! | `MIGRATION_DBSTRING` | `dbstring` |
//! | `MIGRATION_DIR` | `dir` |
//! | `MIGRATION_TABLE` | `table` |
//! | `MIGRATION_LOG_LEVEL` | `log_level` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use uno_rs_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("uno-migrate.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::UnoError;
use crate::settings::Settings;

/// Environment variable holding the driver identifier.
pub const ENV_DRIVER: &str = "MIGRATION_DRIVER";
/// Environment variable holding the connection string.
pub const ENV_DBSTRING: &str = "MIGRATION_DBSTRING";
/// Environment variable holding the migrations directory.
pub const ENV_DIR: &str = "MIGRATION_DIR";
/// Environment variable holding the version table name.
pub const ENV_TABLE: &str = "MIGRATION_TABLE";
/// Environment variable holding the log filter.
pub const ENV_LOG_LEVEL: &str = "MIGRATION_LOG_LEVEL";

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, UnoError> {
    // Merge through serde_json so partial documents keep the defaults.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| UnoError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    let json_value = toml_to_json(toml_value);
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        UnoError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, json_value);
    serde_json::from_value(merged).map_err(|e| {
        UnoError::ConfigurationError(format!("Failed to deserialize settings from TOML: {e}"))
    })
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, UnoError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        UnoError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, UnoError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `MIGRATION_*` environment variable overrides to a settings struct.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Applies overrides from an arbitrary key lookup.
///
/// Empty values are ignored, so an exported-but-blank variable does not wipe
/// a value loaded from a file.
pub fn apply_overrides_from<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(val) = get(ENV_DRIVER) {
        settings.driver = val;
    }
    if let Some(val) = get(ENV_DBSTRING) {
        settings.dbstring = val;
    }
    if let Some(val) = get(ENV_DIR) {
        settings.dir = PathBuf::from(val);
    }
    if let Some(val) = get(ENV_TABLE) {
        settings.table = val;
    }
    if let Some(val) = get(ENV_LOG_LEVEL) {
        settings.log_level = val;
    }
}

// ============================================================
// Helpers
// ============================================================

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::settings::LogFormat;

    // ── TOML loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            driver = "postgres"
            dbstring = "host=localhost dbname=app"
            table = "schema_versions"
            allow_missing = true
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.driver, "postgres");
        assert_eq!(settings.dbstring, "host=localhost dbname=app");
        assert_eq!(settings.table, "schema_versions");
        assert!(settings.allow_missing);
        // Defaults preserved
        assert_eq!(settings.dir, PathBuf::from("./migrations"));
        assert!(!settings.no_versioning);
    }

    #[test]
    fn test_from_toml_str_logging() {
        let toml = r#"
            log_level = "warn"
            log_format = "json"
            progress_interval_secs = 5
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.progress_interval_secs, 5);
    }

    #[test]
    fn test_from_toml_str_prefixes() {
        let settings = from_toml_str(r#"annotation_prefixes = ["+goose"]"#).unwrap();
        assert_eq!(settings.annotation_prefixes, vec!["+goose"]);
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert_eq!(settings.table, "migrations");
        assert!(settings.driver.is_empty());
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let result = from_toml_str("this is not = [valid toml");
        assert!(matches!(result, Err(UnoError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_toml_str_wrong_type() {
        let result = from_toml_str("sequential = \"yes\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = from_toml_file("/nonexistent/uno-migrate.toml");
        assert!(matches!(result, Err(UnoError::ConfigurationError(_))));
    }

    // ── Overrides ───────────────────────────────────────────────────

    #[test]
    fn test_apply_overrides_from() {
        let mut vars = HashMap::new();
        vars.insert(ENV_DRIVER, "sqlite3");
        vars.insert(ENV_DBSTRING, "./app.db");
        vars.insert(ENV_DIR, "db/migrations");
        vars.insert(ENV_TABLE, "versions");
        vars.insert(ENV_LOG_LEVEL, "debug");

        let mut settings = Settings::default();
        apply_overrides_from(&mut settings, |k| vars.get(k).map(|v| (*v).to_string()));

        assert_eq!(settings.driver, "sqlite3");
        assert_eq!(settings.dbstring, "./app.db");
        assert_eq!(settings.dir, PathBuf::from("db/migrations"));
        assert_eq!(settings.table, "versions");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut settings = from_toml_str(r#"driver = "mysql""#).unwrap();
        apply_overrides_from(&mut settings, |k| {
            (k == ENV_DRIVER).then(|| "  ".to_string())
        });
        assert_eq!(settings.driver, "mysql");
    }

    // ── Helpers ─────────────────────────────────────────────────────

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}});
        let over = serde_json::json!({"b": {"c": 20}, "e": 5});
        let merged = merge_json(base, over);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"]["c"], 20);
        assert_eq!(merged["b"]["d"], 3);
        assert_eq!(merged["e"], 5);
    }
}
