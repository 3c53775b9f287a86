//! Version-table SQL for each supported database family.
//!
//! A [`Dialect`] knows how to create the version table, record and remove a
//! version row, and list the recorded rows. The table name is supplied by the
//! caller and interpolated as-is, so it must already be a validated
//! identifier (see `Settings::validate`).

use std::fmt;
use std::str::FromStr;

use uno_rs_core::{UnoError, UnoResult};
use uno_rs_db_backends::{DatabaseBackend, DatabaseBackendType};

/// A database family with its own version-table SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL (`postgres`, `pgx`).
    Postgres,
    /// MySQL (`mysql`).
    MySql,
    /// SQLite (`sqlite3`, `sqlite`).
    Sqlite3,
    /// Microsoft SQL Server (`sqlserver`, `mssql`).
    SqlServer,
    /// Amazon Redshift (`redshift`).
    Redshift,
    /// TiDB (`tidb`).
    TiDb,
    /// ClickHouse (`clickhouse`).
    ClickHouse,
}

/// Every dialect, in documentation order.
pub const ALL_DIALECTS: [Dialect; 7] = [
    Dialect::Postgres,
    Dialect::MySql,
    Dialect::Sqlite3,
    Dialect::SqlServer,
    Dialect::Redshift,
    Dialect::TiDb,
    Dialect::ClickHouse,
];

impl Dialect {
    /// Resolves a driver identifier, including its aliases.
    ///
    /// # Errors
    ///
    /// Returns [`UnoError::DialectError`] for unrecognized drivers.
    pub fn from_driver(driver: &str) -> UnoResult<Self> {
        match driver.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgx" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "sqlite3" | "sqlite" => Ok(Self::Sqlite3),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "redshift" => Ok(Self::Redshift),
            "tidb" => Ok(Self::TiDb),
            "clickhouse" => Ok(Self::ClickHouse),
            other => Err(UnoError::DialectError(format!("unsupported driver {other:?}"))),
        }
    }

    /// The canonical driver name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite3 => "sqlite3",
            Self::SqlServer => "sqlserver",
            Self::Redshift => "redshift",
            Self::TiDb => "tidb",
            Self::ClickHouse => "clickhouse",
        }
    }

    /// The backend that speaks this dialect's wire protocol, if one exists.
    ///
    /// Redshift rides on the PostgreSQL backend and TiDB on the MySQL one.
    pub const fn backend_type(self) -> Option<DatabaseBackendType> {
        match self {
            Self::Postgres | Self::Redshift => Some(DatabaseBackendType::PostgreSQL),
            Self::MySql | Self::TiDb => Some(DatabaseBackendType::MySQL),
            Self::Sqlite3 => Some(DatabaseBackendType::SQLite),
            Self::SqlServer | Self::ClickHouse => None,
        }
    }

    /// The bind placeholder for the `n`th (1-based) parameter.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres | Self::Redshift | Self::ClickHouse => format!("${n}"),
            Self::MySql | Self::TiDb | Self::Sqlite3 => "?".to_string(),
            Self::SqlServer => format!("@p{n}"),
        }
    }

    /// `CREATE TABLE` statement for the version table.
    pub fn create_version_table_sql(self, table: &str) -> String {
        match self {
            Self::Postgres => format!(
                "CREATE TABLE {table} (\n\
                 \tid serial NOT NULL,\n\
                 \tversion_id bigint NOT NULL,\n\
                 \tis_applied boolean NOT NULL,\n\
                 \ttstamp timestamp NULL default now(),\n\
                 \tPRIMARY KEY(id)\n\
                 )"
            ),
            Self::MySql => format!(
                "CREATE TABLE {table} (\n\
                 \tid serial NOT NULL,\n\
                 \tversion_id bigint NOT NULL,\n\
                 \tis_applied boolean NOT NULL,\n\
                 \ttstamp timestamp NULL default now(),\n\
                 \tPRIMARY KEY(id)\n\
                 )"
            ),
            Self::Sqlite3 => format!(
                "CREATE TABLE {table} (\n\
                 \tid INTEGER PRIMARY KEY AUTOINCREMENT,\n\
                 \tversion_id INTEGER NOT NULL,\n\
                 \tis_applied INTEGER NOT NULL,\n\
                 \ttstamp TIMESTAMP DEFAULT (datetime('now'))\n\
                 )"
            ),
            Self::SqlServer => format!(
                "CREATE TABLE {table} (\n\
                 \tid INT NOT NULL IDENTITY(1,1) PRIMARY KEY,\n\
                 \tversion_id BIGINT NOT NULL,\n\
                 \tis_applied BIT NOT NULL,\n\
                 \ttstamp DATETIME NULL DEFAULT CURRENT_TIMESTAMP\n\
                 )"
            ),
            Self::Redshift => format!(
                "CREATE TABLE {table} (\n\
                 \tid integer NOT NULL identity(1, 1),\n\
                 \tversion_id bigint NOT NULL,\n\
                 \tis_applied boolean NOT NULL,\n\
                 \ttstamp timestamp NULL default sysdate,\n\
                 \tPRIMARY KEY(id)\n\
                 )"
            ),
            Self::TiDb => format!(
                "CREATE TABLE {table} (\n\
                 \tid BIGINT UNSIGNED NOT NULL AUTO_INCREMENT UNIQUE,\n\
                 \tversion_id bigint NOT NULL,\n\
                 \tis_applied boolean NOT NULL,\n\
                 \ttstamp timestamp NULL default now(),\n\
                 \tPRIMARY KEY(id)\n\
                 )"
            ),
            Self::ClickHouse => format!(
                "CREATE TABLE {table} (\n\
                 \tversion_id Int64,\n\
                 \tis_applied UInt8,\n\
                 \tdate Date default now(),\n\
                 \ttstamp DateTime default now()\n\
                 )\n\
                 ENGINE = MergeTree()\n\
                 ORDER BY (date)"
            ),
        }
    }

    /// `INSERT` of a `(version_id, is_applied)` row.
    pub fn insert_version_sql(self, table: &str) -> String {
        format!(
            "INSERT INTO {table} (version_id, is_applied) VALUES ({}, {})",
            self.placeholder(1),
            self.placeholder(2)
        )
    }

    /// `DELETE` of every row for one `version_id`.
    pub fn delete_version_sql(self, table: &str) -> String {
        let p = self.placeholder(1);
        match self {
            Self::ClickHouse => format!(
                "ALTER TABLE {table} DELETE WHERE version_id = {p} SETTINGS mutations_sync = 2"
            ),
            _ => format!("DELETE FROM {table} WHERE version_id={p}"),
        }
    }

    /// `SELECT` of all version rows, most recent first.
    pub fn select_versions_sql(self, table: &str) -> String {
        match self {
            Self::ClickHouse => {
                format!("SELECT version_id, is_applied, tstamp FROM {table} ORDER BY tstamp DESC")
            }
            _ => format!("SELECT version_id, is_applied, tstamp FROM {table} ORDER BY id DESC"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = UnoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_driver(s)
    }
}

/// Opens a session for `driver`, resolving its aliases first.
///
/// # Errors
///
/// Returns [`UnoError::DialectError`] for an unknown driver, and
/// [`UnoError::OperationalError`] if the dialect has no backend in this build
/// or the connection fails.
pub async fn connect(driver: &str, dbstring: &str) -> UnoResult<Box<dyn DatabaseBackend>> {
    let dialect = Dialect::from_driver(driver)?;
    let Some(backend) = dialect.backend_type() else {
        return Err(UnoError::OperationalError(format!(
            "no database backend for the {dialect} dialect"
        )));
    };
    uno_rs_db_backends::connect(backend, dbstring).await
}
