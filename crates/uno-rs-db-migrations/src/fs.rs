//! Filesystem abstraction for migration sources.
//!
//! The collector and runner only touch migration files through
//! [`MigrationFs`], so migrations can be read from disk ([`OsFs`]) or from
//! sources compiled into the binary ([`MemoryFs`]).

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use regex::Regex;
use uno_rs_core::{UnoError, UnoResult};

/// Metadata returned by [`MigrationFs::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// `true` for directories.
    pub is_dir: bool,
    /// Size in bytes (zero for directories).
    pub len: u64,
}

/// Read access to migration sources.
pub trait MigrationFs: Send + Sync + fmt::Debug {
    /// Opens a file for streaming reads.
    fn open(&self, path: &Path) -> UnoResult<Box<dyn Read + Send + '_>>;

    /// Lists the entries of a directory, sorted by path.
    fn read_dir(&self, dir: &Path) -> UnoResult<Vec<PathBuf>>;

    /// Returns metadata for a path.
    fn stat(&self, path: &Path) -> UnoResult<FileInfo>;

    /// Reads a whole file into a string.
    fn read_to_string(&self, path: &Path) -> UnoResult<String> {
        let mut out = String::new();
        self.open(path)?.read_to_string(&mut out)?;
        Ok(out)
    }

    /// Returns the files in `dir` whose names match a `*`/`?` wildcard pattern.
    fn glob(&self, dir: &Path, pattern: &str) -> UnoResult<Vec<PathBuf>> {
        let matcher = glob_regex(pattern)?;
        let mut matches = Vec::new();
        for path in self.read_dir(dir)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if matcher.is_match(name) && !self.stat(&path)?.is_dir {
                matches.push(path);
            }
        }
        Ok(matches)
    }

    /// Returns `true` if the path exists.
    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }
}

/// Translates a filename wildcard pattern into an anchored regex.
fn glob_regex(pattern: &str) -> UnoResult<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
        .map_err(|e| UnoError::ConfigurationError(format!("invalid glob {pattern:?}: {e}")))
}

// ============================================================
// OsFs
// ============================================================

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl MigrationFs for OsFs {
    fn open(&self, path: &Path) -> UnoResult<Box<dyn Read + Send + '_>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    fn read_dir(&self, dir: &Path) -> UnoResult<Vec<PathBuf>> {
        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> UnoResult<FileInfo> {
        let meta = std::fs::metadata(path)?;
        Ok(FileInfo {
            is_dir: meta.is_dir(),
            len: if meta.is_dir() { 0 } else { meta.len() },
        })
    }

    fn read_to_string(&self, path: &Path) -> UnoResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }
}

// ============================================================
// MemoryFs
// ============================================================

/// An in-memory filesystem, typically filled with `include_str!` sources.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use uno_rs_db_migrations::fs::{MemoryFs, MigrationFs};
///
/// let fs = MemoryFs::new()
///     .with_file("migrations/00001_init.sql", "-- +migration Up\nSELECT 1;\n");
/// assert!(fs.exists(Path::new("migrations")));
/// assert_eq!(fs.glob(Path::new("migrations"), "*.sql").unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryFs {
    /// Creates an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, returning the filesystem for chaining.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.insert(normalize(&path.into()), contents.into());
    }

    fn is_dir(&self, path: &Path) -> bool {
        let path = normalize(path);
        path.as_os_str().is_empty() || self.files.keys().any(|f| f.starts_with(&path) && *f != path)
    }

    fn not_found(path: &Path) -> UnoError {
        UnoError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{}: no such file or directory", path.display()),
        ))
    }
}

/// Drops `.` components so `./migrations/x.sql` and `migrations/x.sql` agree.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

impl MigrationFs for MemoryFs {
    fn open(&self, path: &Path) -> UnoResult<Box<dyn Read + Send + '_>> {
        let contents = self
            .files
            .get(&normalize(path))
            .ok_or_else(|| Self::not_found(path))?;
        Ok(Box::new(contents.as_bytes()))
    }

    fn read_dir(&self, dir: &Path) -> UnoResult<Vec<PathBuf>> {
        if !self.is_dir(dir) {
            return Err(Self::not_found(dir));
        }
        let dir = normalize(dir);
        let mut entries: Vec<PathBuf> = self
            .files
            .keys()
            .filter_map(|f| {
                let rest = f.strip_prefix(&dir).ok()?;
                let first = rest.components().next()?;
                Some(dir.join(first))
            })
            .collect();
        entries.dedup();
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> UnoResult<FileInfo> {
        if let Some(contents) = self.files.get(&normalize(path)) {
            return Ok(FileInfo {
                is_dir: false,
                len: contents.len() as u64,
            });
        }
        if self.is_dir(path) {
            return Ok(FileInfo { is_dir: true, len: 0 });
        }
        Err(Self::not_found(path))
    }

    fn read_to_string(&self, path: &Path) -> UnoResult<String> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }
}
