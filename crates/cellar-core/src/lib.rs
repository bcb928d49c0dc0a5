//! # cellar-core: Pure Business Logic for Cellar POS
//!
//! Domain types and the rules of the inventory ledger, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cellar POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    cellar CLI (apps/cli)                        │   │
//! │  │    sell, stock add, report earnings, backup, restore ...        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cellar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │   │  types  │ │  money  │ │ ledger  │ │ snapshot │ │ clock  │ │   │
//! │  │   │ Product │ │  Money  │ │ guard + │ │  format  │ │  Clock │ │   │
//! │  │   │Movement │ │         │ │SalePlan │ │ validate │ │        │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO FILES • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    cellar-db (Database Layer)                   │   │
//! │  │        SQLite ledger, transactions, migrations, repositories    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Barcode, Movement, Sale, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`ledger`] - Derived on-hand, the insufficient-stock guard, sale planning
//! - [`snapshot`] - The backup document format and its validation
//! - [`clock`] - Injected time source
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use cellar_core::ledger::{check_stock, StockDecision};
//!
//! // 9 on hand, 3 requested, no override needed
//! assert_eq!(check_stock(9, 3, false).unwrap(), StockDecision::Sale);
//!
//! // 9 on hand, 10 requested: refused unless forced
//! assert!(check_stock(9, 10, false).is_err());
//! assert_eq!(check_stock(9, 10, true).unwrap(), StockDecision::Override);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod error;
pub mod ledger;
pub mod money;
pub mod snapshot;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Primary key of the singleton settings row.
pub const SETTINGS_ID: &str = "default";

/// Currency used when settings are first created.
pub const DEFAULT_CURRENCY: &str = "INR";

/// Units sold by a scan that does not say otherwise.
pub const DEFAULT_SCAN_QUANTITY: i64 = 1;

/// On-hand level at or below which a product counts as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Data location recorded in fresh settings.
pub const DEFAULT_DATA_PATH: &str = "local";

/// Barcode type used when the caller gives none.
pub const DEFAULT_BARCODE_TYPE: &str = "custom";

/// Maximum units in a single sale
///
/// ## Business Reason
/// Catches a mistyped quantity (9999 bottles is already absurd for one scan).
pub const MAX_SALE_UNITS: i64 = 9_999;
