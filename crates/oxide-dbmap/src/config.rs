//! Dialect selection from configuration.
//!
//! [`DialectConfig`] can be deserialized from any serde format or read
//! from the environment:
//!
//! | Variable                  | Meaning                                   |
//! |---------------------------|-------------------------------------------|
//! | `DBMAP_DIALECT`           | `sqlite`, `postgres`, `mysql`, `sqlserver` or `oracle` |
//! | `DBMAP_TABLE_SUFFIX`      | text appended to CREATE TABLE (sqlite, postgres) |
//! | `DBMAP_MYSQL_ENGINE`      | MySQL storage engine                      |
//! | `DBMAP_MYSQL_ENCODING`    | MySQL character set                       |
//! | `DBMAP_SQLSERVER_VERSION` | SQL Server version, `2005` for legacy types |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dialect::{
    Dialect, MySqlDialect, OracleDialect, PostgresDialect, SqlServerDialect, SqliteDialect,
};
use crate::error::{DbMapError, Result};

/// The supported database families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
    Mysql,
    #[serde(alias = "mssql")]
    Sqlserver,
    Oracle,
}

impl DialectKind {
    /// Lower-case name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlserver => "sqlserver",
            Self::Oracle => "oracle",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = DbMapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "sqlserver" | "mssql" => Ok(Self::Sqlserver),
            "oracle" => Ok(Self::Oracle),
            other => Err(DbMapError::config("dialect", format!("unknown dialect {other:?}"))),
        }
    }
}

/// Settings for building a [`Dialect`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectConfig {
    pub dialect: DialectKind,
    /// Appended to CREATE TABLE by the SQLite and PostgreSQL dialects.
    pub table_suffix: Option<String>,
    /// MySQL storage engine, e.g. `InnoDB`.
    pub engine: Option<String>,
    /// MySQL character set, e.g. `UTF8`.
    pub encoding: Option<String>,
    /// SQL Server version.
    pub version: Option<String>,
}

impl DialectConfig {
    /// Configuration for `dialect` with no options set.
    #[must_use]
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Reads the configuration from `DBMAP_*` environment variables.
    ///
    /// An unset `DBMAP_DIALECT` selects SQLite.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Config`] when `DBMAP_DIALECT` names no
    /// known dialect.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let dialect = match lookup("DBMAP_DIALECT") {
            Some(name) if !name.trim().is_empty() => name.parse()?,
            _ => DialectKind::default(),
        };
        Ok(Self {
            dialect,
            table_suffix: lookup("DBMAP_TABLE_SUFFIX"),
            engine: lookup("DBMAP_MYSQL_ENGINE"),
            encoding: lookup("DBMAP_MYSQL_ENCODING"),
            version: lookup("DBMAP_SQLSERVER_VERSION"),
        })
    }

    /// Builds the configured dialect.
    ///
    /// Options that do not apply to the selected dialect are ignored.
    #[must_use]
    pub fn build(&self) -> Box<dyn Dialect> {
        let suffix = self.table_suffix.clone().unwrap_or_default();
        match self.dialect {
            DialectKind::Sqlite => Box::new(SqliteDialect::new().with_table_suffix(suffix)),
            DialectKind::Postgres => Box::new(PostgresDialect::new().with_table_suffix(suffix)),
            DialectKind::Mysql => Box::new(MySqlDialect::new(
                self.engine.clone().unwrap_or_default(),
                self.encoding.clone().unwrap_or_default(),
            )),
            DialectKind::Sqlserver => Box::new(SqlServerDialect::with_version(
                self.version.clone().unwrap_or_default(),
            )),
            DialectKind::Oracle => Box::new(OracleDialect::new()),
        }
    }
}
