//! # Error Types
//!
//! Domain-specific error types for cellar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cellar-core errors (this file)                                        │
//! │  ├── CoreError        - Expected, caller-recoverable domain failures   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cellar-db errors (separate crate)                                     │
//! │  └── DbError          - Wraps CoreError, adds storage failures         │
//! │                                                                         │
//! │  cellar CLI errors                                                     │
//! │  └── CliError         - What the operator sees                         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → CliError                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule failures.
///
/// Every variant here is an expected outcome the caller can act on.
/// Storage failures never appear here; they belong to `cellar-db`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Barcode id does not exist (or belongs to another product).
    #[error("Barcode not found: {0}")]
    BarcodeNotFound(String),

    /// Sale id does not exist.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// The settings singleton is missing.
    #[error("Settings not found")]
    SettingsNotFound,

    /// A scanned code resolves to nothing.
    #[error("Unknown barcode: {0}")]
    UnknownBarcode(String),

    /// Barcode code already registered, on any product.
    #[error("Barcode '{0}' is already assigned")]
    DuplicateBarcode(String),

    /// SKU already used by another product.
    #[error("SKU '{0}' is already in use")]
    DuplicateSku(String),

    /// The stock guard tripped.
    ///
    /// ## User Workflow
    /// ```text
    /// Scan HR-001 × 10
    ///      │
    ///      ▼
    /// on hand = 9
    ///      │
    ///      ▼
    /// InsufficientStock { on_hand: 9, requested: 10 }
    ///      │
    ///      ▼
    /// Operator decides: re-run with force (override) or cancel
    /// ```
    #[error("Insufficient stock for {title}: on hand {on_hand}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        title: String,
        on_hand: i64,
        requested: i64,
    },

    /// The product still has movements or sales and cannot be removed.
    #[error("Product {0} has ledger history and cannot be deleted")]
    ProductHasHistory(String),

    /// A snapshot blob is corrupt or incompatible.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for `InvalidSnapshot`.
    pub fn invalid_snapshot(reason: impl Into<String>) -> Self {
        CoreError::InvalidSnapshot(reason.into())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be non-zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid_format(field: &str, reason: &str) -> Self {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            title: "House Red".to_string(),
            on_hand: 9,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for House Red: on hand 9, requested 10"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("title").to_string(), "title is required");

        let err = ValidationError::TooLong {
            field: "code".to_string(),
            max: 64,
        };
        assert_eq!(err.to_string(), "code must be at most 64 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("sku").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
