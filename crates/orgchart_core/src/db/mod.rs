//! Employee database bootstrap.
//!
//! # Responsibility
//! - Open SQLite connections configured for the employee store.
//! - Bring the `employees` schema up to the version this binary knows.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A connection is handed out only after every migration has committed.
//! - A database written by a newer binary is refused, never downgraded.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the employee database.
#[derive(Debug)]
pub enum DbError {
    /// SQLite failed outside of a migration step.
    Sqlite(rusqlite::Error),
    /// One migration script failed; nothing from the run was kept.
    MigrationFailed {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file was migrated by a newer binary.
    SchemaTooNew { found: u32, supported: u32 },
}

impl DbError {
    /// True when another connection held the database lock past the busy timeout.
    pub fn is_busy(&self) -> bool {
        let err = match self {
            Self::Sqlite(err) | Self::MigrationFailed { source: err, .. } => err,
            Self::SchemaTooNew { .. } => return false,
        };
        matches!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "employee database error: {err}"),
            Self::MigrationFailed { version, source } => {
                write!(f, "employee schema migration {version} failed: {source}")
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "employee schema version {found} is newer than supported {supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::MigrationFailed { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
