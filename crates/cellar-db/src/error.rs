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
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError (this module) ← storage failures + wrapped domain errors      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError::kind() → ErrorKind ← what the caller branches on             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CliError (in the cellar binary) ← printed for the operator            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cellar_core::{CoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule refused the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Unique constraint violation not caught by a pre-check.
    ///
    /// ## When This Occurs
    /// - Two writers racing on the same barcode code or SKU
    ///   (the writer lock makes this rare)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a non-existent product_id
    /// - Deleting a row something still points at
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation: a value outside its column's domain.
    #[error("Check constraint failed: {message}")]
    CheckViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Backup or restore file could not be read or written.
    #[error("File error at {path}: {message}")]
    File { path: String, message: String },

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Coarse classification callers branch on.
///
/// Everything except `StorageFailure` is an expected, recoverable outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    DuplicateBarcode,
    DuplicateSku,
    UnknownBarcode,
    InsufficientStock,
    InvalidSnapshot,
    Validation,
    /// The product still has ledger history.
    Conflict,
    StorageFailure,
}

impl DbError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Core(core) => match core {
                CoreError::ProductNotFound(_)
                | CoreError::BarcodeNotFound(_)
                | CoreError::SaleNotFound(_)
                | CoreError::SettingsNotFound => ErrorKind::NotFound,
                CoreError::UnknownBarcode(_) => ErrorKind::UnknownBarcode,
                CoreError::DuplicateBarcode(_) => ErrorKind::DuplicateBarcode,
                CoreError::DuplicateSku(_) => ErrorKind::DuplicateSku,
                CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
                CoreError::ProductHasHistory(_) => ErrorKind::Conflict,
                CoreError::InvalidSnapshot(_) => ErrorKind::InvalidSnapshot,
                CoreError::Validation(_) => ErrorKind::Validation,
            },
            DbError::UniqueViolation { field, .. } if field == "barcodes.code" => {
                ErrorKind::DuplicateBarcode
            }
            DbError::UniqueViolation { field, .. } if field == "products.sku" => {
                ErrorKind::DuplicateSku
            }
            _ => ErrorKind::StorageFailure,
        }
    }

    /// True for failures of the store itself rather than of the request.
    pub fn is_storage_failure(&self) -> bool {
        self.kind() == ErrorKind::StorageFailure
    }

    /// True when SQLite refused a row because of a schema constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::CheckViolation { .. }
        )
    }

    pub(crate) fn file(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        DbError::File {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
///                               (UNIQUE, FOREIGN KEY, CHECK)
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
///
/// `RowNotFound` is never relied on: lookups use `fetch_optional` and
/// name the missing entity themselves.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error codes for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if let Some(check) = msg.strip_prefix("CHECK constraint failed: ") {
                    DbError::CheckViolation {
                        message: check.to_string(),
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
