//! # cellar-db: Database Layer for Cellar POS
//!
//! The SQLite store behind the ledger: products, barcodes, the movement
//! log, sales with their earnings entries, settings, and snapshots.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cellar POS Data Flow                             │
//! │                                                                         │
//! │  cellar sell HR-001 --units 3                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cellar-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Catalog       │    │              │  │   │
//! │  │   │ SqlitePool    │    │ Ledger        │    │ 0001_initial │  │   │
//! │  │   │ StoreLocks    │◄───│ Sale          │    │   _schema    │  │   │
//! │  │   │ Clock         │    │ Report        │    │              │  │   │
//! │  │   │               │    │ Settings      │    │              │  │   │
//! │  │   │               │    │ Snapshot      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/cellar.db                                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`lock`] - Store-wide writer and snapshot locks
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types and the stable error kinds
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cellar_core::{ManualReason, SaleRequest};
//! use cellar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("cellar.db")).await?;
//!
//! db.ledger().adjust_stock(&product_id, 12, ManualReason::Intake, None).await?;
//! let receipt = db.sales().sell(SaleRequest::scan("HR-001").units(3)).await?;
//! assert_eq!(receipt.new_on_hand, 9);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lock;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, ErrorKind};
pub use lock::StoreLocks;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::settings::SettingsRepository;
pub use repository::snapshot::SnapshotRepository;
