//! Migration source discovery.
//!
//! A source is a file named `<version>_<name>.<ext>` where `<ext>` is `sql`
//! or `rs`, or a native migration from the [`MigrationRegistry`]. The
//! [`MigrationCollector`] scans a directory through a [`MigrationFs`] and
//! returns [`Migrations`], a version-sorted list with the slicing helpers the
//! executor needs.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use uno_rs_core::{UnoError, UnoResult};

use crate::fs::MigrationFs;
use crate::registry::{MigrationRegistry, NativeMigration};

/// Extension of SQL migration scripts.
pub const SQL_EXTENSION: &str = "sql";

/// Extension of native migration sources.
pub const NATIVE_EXTENSION: &str = "rs";

/// Whether a source is a SQL script or a native migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// An annotated SQL script.
    Sql,
    /// A Rust migration linked into the binary.
    Native,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql => f.write_str("sql"),
            Self::Native => f.write_str("native"),
        }
    }
}

/// One migration found by the collector.
#[derive(Clone)]
pub struct MigrationSource {
    /// Version parsed from the file name.
    pub version: i64,
    /// Path of the source file (for registered natives, the registered name
    /// joined onto the scanned directory).
    pub source: PathBuf,
    /// SQL or native.
    pub kind: SourceKind,
    /// `true` if a native migration has callbacks linked in. Always `true`
    /// for SQL sources.
    pub registered: bool,
    /// The callbacks of a registered native migration.
    pub native: Option<Arc<dyn NativeMigration>>,
}

impl MigrationSource {
    /// Creates a SQL source.
    pub fn sql(version: i64, source: impl Into<PathBuf>) -> Self {
        Self {
            version,
            source: source.into(),
            kind: SourceKind::Sql,
            registered: true,
            native: None,
        }
    }

    /// Creates a native source, registered if `native` is present.
    pub fn native(
        version: i64,
        source: impl Into<PathBuf>,
        native: Option<Arc<dyn NativeMigration>>,
    ) -> Self {
        Self {
            version,
            source: source.into(),
            kind: SourceKind::Native,
            registered: native.is_some(),
            native,
        }
    }

    /// The base name of the source, used in logs and errors.
    pub fn file_name(&self) -> String {
        self.source.file_name().map_or_else(
            || self.source.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        )
    }
}

impl fmt::Debug for MigrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationSource")
            .field("version", &self.version)
            .field("source", &self.source)
            .field("kind", &self.kind)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for MigrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Parses the version out of a migration file name.
///
/// # Errors
///
/// Returns [`UnoError::ParseError`] if the extension is not recognized, the
/// name has no `_` separator, or the prefix is not an integer greater than
/// zero.
///
/// # Examples
///
/// ```
/// use uno_rs_db_migrations::source::numeric_component;
///
/// assert_eq!(numeric_component("20240101120000_add_users.sql").unwrap(), 20240101120000);
/// assert!(numeric_component("add_users.sql").is_err());
/// ```
pub fn numeric_component(name: &str) -> UnoResult<i64> {
    let path = Path::new(name);
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext != SQL_EXTENSION && ext != NATIVE_EXTENSION {
        return Err(UnoError::ParseError(format!(
            "{base}: not a recognized migration file type"
        )));
    }

    let Some((prefix, _)) = base.split_once('_') else {
        return Err(UnoError::ParseError(format!(
            "{base}: no filename separator '_' found"
        )));
    };

    let version: i64 = prefix.parse().map_err(|e| {
        UnoError::ParseError(format!("{base}: invalid version prefix {prefix:?}: {e}"))
    })?;
    if version <= 0 {
        return Err(UnoError::ParseError(format!(
            "{base}: migration versions must be greater than zero"
        )));
    }
    Ok(version)
}

// ============================================================
// Migrations
// ============================================================

/// A version-sorted list of migration sources.
#[derive(Debug, Clone, Default)]
pub struct Migrations {
    sources: Vec<MigrationSource>,
}

impl Migrations {
    /// Sorts the sources by version.
    ///
    /// # Errors
    ///
    /// Returns [`UnoError::ParseError`] if two sources share a version.
    pub fn new(mut sources: Vec<MigrationSource>) -> UnoResult<Self> {
        sources.sort_by_key(|s| s.version);
        if let Some(pair) = sources.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(UnoError::ParseError(format!(
                "duplicate migration version {}: {} and {}",
                pair[0].version,
                pair[0].file_name(),
                pair[1].file_name()
            )));
        }
        Ok(Self { sources })
    }

    /// All sources in ascending version order.
    pub fn as_slice(&self) -> &[MigrationSource] {
        &self.sources
    }

    /// Iterates sources in ascending version order.
    pub fn iter(&self) -> std::slice::Iter<'_, MigrationSource> {
        self.sources.iter()
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if there are no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The source with exactly this version.
    pub fn find(&self, version: i64) -> Option<&MigrationSource> {
        self.sources
            .binary_search_by_key(&version, |s| s.version)
            .ok()
            .map(|idx| &self.sources[idx])
    }

    /// The highest-versioned source.
    pub fn last(&self) -> Option<&MigrationSource> {
        self.sources.last()
    }

    /// The first source with a version strictly greater than `version`.
    pub fn next_after(&self, version: i64) -> Option<&MigrationSource> {
        self.sources.iter().find(|s| s.version > version)
    }

    /// The last source with a version strictly lower than `version`.
    pub fn previous_before(&self, version: i64) -> Option<&MigrationSource> {
        self.sources.iter().rev().find(|s| s.version < version)
    }

    /// Sources with `lower < version <= upper`, ascending.
    pub fn between(&self, lower: i64, upper: i64) -> Vec<&MigrationSource> {
        self.sources
            .iter()
            .filter(|s| s.version > lower && s.version <= upper)
            .collect()
    }

    /// Sources with `lower < version <= upper`, descending.
    pub fn between_reversed(&self, lower: i64, upper: i64) -> Vec<&MigrationSource> {
        let mut out = self.between(lower, upper);
        out.reverse();
        out
    }

    /// All versions, ascending.
    pub fn versions(&self) -> Vec<i64> {
        self.sources.iter().map(|s| s.version).collect()
    }
}

impl<'a> IntoIterator for &'a Migrations {
    type Item = &'a MigrationSource;
    type IntoIter = std::slice::Iter<'a, MigrationSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}

// ============================================================
// MigrationCollector
// ============================================================

/// Discovers migration sources in a directory.
#[derive(Debug, Clone, Copy)]
pub struct MigrationCollector<'a> {
    fs: &'a dyn MigrationFs,
    registry: &'a MigrationRegistry,
}

impl<'a> MigrationCollector<'a> {
    /// Creates a collector over a filesystem and a registry of native migrations.
    pub fn new(fs: &'a dyn MigrationFs, registry: &'a MigrationRegistry) -> Self {
        Self { fs, registry }
    }

    /// Scans `dir` and returns every source, sorted by version.
    ///
    /// SQL scripts and native sources are taken from the directory. Native
    /// sources are matched to the registry by version; a native file without
    /// a registration is kept as unregistered and fails when run. Registered
    /// migrations without a file in the directory are included too.
    ///
    /// # Errors
    ///
    /// Returns [`UnoError::NotFound`] if `dir` is missing or not a directory,
    /// and [`UnoError::ParseError`] for a malformed file name or a duplicate
    /// version.
    pub fn collect(&self, dir: &Path) -> UnoResult<Migrations> {
        match self.fs.stat(dir) {
            Ok(info) if info.is_dir => {}
            _ => {
                return Err(UnoError::NotFound(format!(
                    "{} directory does not exist",
                    dir.display()
                )));
            }
        }

        let mut sources = Vec::new();

        for path in self.fs.glob(dir, &format!("*.{SQL_EXTENSION}"))? {
            let version = numeric_component(&path.to_string_lossy())?;
            sources.push(MigrationSource::sql(version, path));
        }

        let mut natives: BTreeMap<i64, MigrationSource> = self
            .registry
            .iter()
            .map(|r| {
                (
                    r.version,
                    MigrationSource::native(
                        r.version,
                        dir.join(&r.source),
                        Some(Arc::clone(&r.migration)),
                    ),
                )
            })
            .collect();

        for path in self.fs.glob(dir, &format!("*.{NATIVE_EXTENSION}"))? {
            let version = numeric_component(&path.to_string_lossy())?;
            match natives.get(&version) {
                Some(registered) if registered.file_name() != file_name_of(&path) => {
                    return Err(UnoError::ParseError(format!(
                        "duplicate migration version {version}: {} is registered but {} is on disk",
                        registered.file_name(),
                        file_name_of(&path)
                    )));
                }
                Some(_) => {}
                None => {
                    tracing::debug!(version, path = %path.display(), "unregistered native migration");
                    natives.insert(version, MigrationSource::native(version, path, None));
                }
            }
        }

        sources.extend(natives.into_values());
        let migrations = Migrations::new(sources)?;
        tracing::debug!(
            dir = %dir.display(),
            count = migrations.len(),
            "collected migrations"
        );
        Ok(migrations)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
