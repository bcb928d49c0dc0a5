//! # CLI Error Type
//!
//! What a failed command prints to stderr, and the exit code it returns.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cellar sell HR-001 --units 10                                          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  db.sales().sell(..) ─── Err(DbError::Core(InsufficientStock)) ──┐      │
//! │                                                                   │      │
//! │                                                                   ▼      │
//! │  CliError { code: INSUFFICIENT_STOCK, message, hint, details } ──►stderr │
//! │                                                                          │
//! │  exit 1  expected, caller-recoverable failure                            │
//! │  exit 2  storage failure                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```json
//! {
//!   "code": "INSUFFICIENT_STOCK",
//!   "message": "Insufficient stock for House Red: 9 on hand, 10 requested",
//!   "hint": "re-run with --force to record an override sale",
//!   "details": { "productId": "…", "title": "House Red", "onHand": 9, "requested": 10 }
//! }
//! ```

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use cellar_core::CoreError;
use cellar_db::{DbError, ErrorKind};

/// Error printed by the `cellar` binary.
#[derive(Debug, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("[{code:?}] {message}")]
pub struct CliError {
    /// Machine-readable code
    pub code: ErrorKind,

    /// Human-readable message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl CliError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
            hint: None,
            details: None,
        }
    }

    /// Startup problems: no data directory, unusable path.
    pub fn config(message: impl Into<String>) -> Self {
        CliError::new(ErrorKind::StorageFailure, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// 2 for storage failures, 1 for everything the caller can fix.
    pub fn exit_status(&self) -> u8 {
        match self.code {
            ErrorKind::StorageFailure => 2,
            _ => 1,
        }
    }
}

impl From<DbError> for CliError {
    fn from(err: DbError) -> Self {
        let code = err.kind();
        match err {
            DbError::Core(CoreError::InsufficientStock {
                product_id,
                title,
                on_hand,
                requested,
            }) => CliError {
                code,
                message: format!(
                    "Insufficient stock for {title}: {on_hand} on hand, {requested} requested"
                ),
                hint: Some("re-run with --force to record an override sale".to_string()),
                details: Some(json!({
                    "productId": product_id,
                    "title": title,
                    "onHand": on_hand,
                    "requested": requested,
                })),
            },
            DbError::Core(CoreError::UnknownBarcode(code_scanned)) => {
                CliError::new(code, format!("No product has barcode '{code_scanned}'"))
                    .with_hint("register it with `cellar barcode add <product-id> <code>`")
            }
            other if code == ErrorKind::StorageFailure => {
                tracing::error!(error = %other, "Storage failure");
                CliError::new(code, other.to_string())
            }
            other => CliError::new(code, other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::new(ErrorKind::StorageFailure, format!("Cannot encode output: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_carries_counts_and_hint() {
        let err = CliError::from(DbError::Core(CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            title: "House Red".to_string(),
            on_hand: 9,
            requested: 10,
        }));
        assert_eq!(err.code, ErrorKind::InsufficientStock);
        assert!(err.hint.as_deref().unwrap().contains("--force"));

        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "INSUFFICIENT_STOCK");
        assert_eq!(value["details"]["onHand"], 9);
        assert_eq!(value["details"]["requested"], 10);
        assert_eq!(err.exit_status(), 1);
    }

    #[test]
    fn test_storage_failure_exit_code() {
        let err = CliError::from(DbError::QueryFailed("disk I/O error".to_string()));
        assert_eq!(err.code, ErrorKind::StorageFailure);
        assert_eq!(err.exit_status(), 2);
        assert!(serde_json::to_value(&err).unwrap().get("hint").is_none());
    }
}
