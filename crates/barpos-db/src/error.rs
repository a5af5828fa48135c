//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Business rule (CoreError)           │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError::{QueryFailed, ...}       DbError::Domain(CoreError)          │
//! │       │                                   │                             │
//! │       └──────────────┬────────────────────┘                             │
//! │                      ▼                                                  │
//! │  API collaborator maps `code()` to its response                        │
//! │  (domain codes are user-facing, storage failures are "INTERNAL")       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error returned from a repository operation means its transaction was
//! rolled back: the `Transaction` is dropped without `commit()`.

use barpos_core::CoreError;
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and domain failures raised while a
/// transaction was in flight.
#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule rejected the operation.
    ///
    /// ## When This Occurs
    /// - Order already closed, table not free, stock too low, ...
    /// - Any [`CoreError`] raised inside a repository transaction
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// A row expected by a storage helper is missing. Missing orders,
    /// tables, products and items surface as `Domain` instead.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate table label
    /// - A second OPEN register (partial unique index)
    /// - A second active order on the same table
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// FOREIGN KEY constraint failed.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation.
    ///
    /// ## When This Occurs
    /// - A write that would leave stock negative
    /// - An enum column outside its allowed values
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Could not open the database, or the pool was closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    ///
    /// ## When This Occurs
    /// - SQL error at runtime
    /// - `database is locked` after the busy timeout expired
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// No pooled connection became free within `connect_timeout`.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True when a business rule (not storage) rejected the operation.
    pub fn is_domain(&self) -> bool {
        matches!(self, DbError::Domain(_))
    }

    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// Stable machine-readable code.
    ///
    /// Domain errors keep their own code; storage failures collapse to
    /// `INTERNAL` and must be treated as generic by the caller.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Domain(err) => err.code(),
            _ => "INTERNAL",
        }
    }

    /// True when the UNIQUE violation came from the given index/column text.
    pub(crate) fn is_unique_on(&self, needle: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(needle))
    }
}

/// ```text
/// RowNotFound              → NotFound
/// Database (UNIQUE ...)    → UniqueViolation { field: "<table>.<column>" }
/// Database (FOREIGN KEY)   → ForeignKeyViolation
/// Database (CHECK ...)     → CheckViolation
/// Database (other)         → QueryFailed   e.g. "database is locked"
/// PoolTimedOut             → PoolExhausted
/// PoolClosed               → ConnectionFailed
/// anything else            → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>[, ...]"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_code_passes_through() {
        let err = DbError::from(CoreError::NoOpenCashRegister);
        assert!(err.is_domain());
        assert_eq!(err.code(), "NO_OPEN_CASH_REGISTER");
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::NoOpenCashRegister)
        ));
    }

    #[test]
    fn test_storage_errors_are_internal() {
        let err = DbError::QueryFailed("database is locked".into());
        assert!(!err.is_domain());
        assert_eq!(err.code(), "INTERNAL");
    }

    #[test]
    fn test_unique_on() {
        let err = DbError::duplicate("cash_registers.status", "OPEN");
        assert!(err.is_unique_on("cash_registers"));
        assert!(!err.is_unique_on("dining_tables"));
    }
}
