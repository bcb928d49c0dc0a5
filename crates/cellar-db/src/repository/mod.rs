//! # Repository Module
//!
//! Database repository implementations for Cellar POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  CLI command                                                           │
//! │       │                                                                 │
//! │       │  db.sales().sell(SaleRequest::scan("HR-001"))                  │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── takes the store lock (write)                                      │
//! │  ├── opens one transaction                                             │
//! │  └── calls connection-level helpers from the other repositories:       │
//! │        catalog::resolve_in, ledger::on_hand_in, ...                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Public methods lock; `*_in(conn, ..)` helpers never do, so they       │
//! │  compose inside another operation's transaction.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Products and barcodes
//! - [`LedgerRepository`](ledger::LedgerRepository) - Movements and on-hand
//! - [`SaleRepository`](sale::SaleRepository) - The sale protocol
//! - [`ReportRepository`](report::ReportRepository) - Earnings and stock reports
//! - [`SettingsRepository`](settings::SettingsRepository) - The settings singleton
//! - [`SnapshotRepository`](snapshot::SnapshotRepository) - Backup and restore

pub mod catalog;
pub mod ledger;
pub mod report;
pub(crate) mod rows;
pub mod sale;
pub mod settings;
pub mod snapshot;
