//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  cellar binary startup                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings + clock                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← pool + migrations + default settings    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │  StoreHandle (cloned into every repo)   │                           │
//! │  │  ├── SqlitePool                         │                           │
//! │  │  ├── Arc<StoreLocks>  writer + gate     │                           │
//! │  │  └── Arc<dyn Clock>   timestamps        │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.catalog() / ledger() / sales() / reports() / settings() /          │
//! │  snapshots()                                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases run in WAL (Write-Ahead Logging) mode:
//! - Readers don't block the writer
//! - The writer doesn't block readers
//! - Better crash recovery
//!
//! In-memory databases skip WAL; each one is private to its pool.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use cellar_core::{Clock, SystemClock};

use crate::error::{DbError, DbResult};
use crate::lock::StoreLocks;
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::settings::SettingsRepository;
use crate::repository::snapshot::SnapshotRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/cellar.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5 (plenty for a single till)
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a free connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections
    /// forever, which an in-memory database needs.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Whether to run migrations (and create default settings) on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Source of every timestamp the store writes.
    pub clock: Arc<dyn Clock>,

    /// Where backups go when neither the caller nor the `backup_path`
    /// setting names a place.
    /// Default: `backups/` beside the database file; none in memory
    pub backup_dir: Option<PathBuf>,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let database_path: PathBuf = path.into();
        let backup_dir = database_path
            .parent()
            .map(|dir| dir.join("backups"))
            .or_else(|| Some(PathBuf::from("backups")));
        DbConfig {
            database_path,
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
            clock: Arc::new(SystemClock),
            backup_dir,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Replaces the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the fallback backup directory.
    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Isolated: a second Database::new gets its own empty store
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
            clock: Arc::new(SystemClock),
            backup_dir: None,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                // WAL mode: readers don't block the writer
                .journal_mode(SqliteJournalMode::Wal)
                // NORMAL synchronous: safe from corruption, may lose the
                // last transaction on power loss
                .synchronous(SqliteSynchronous::Normal)
        };

        // SQLite has them disabled by default for backwards compatibility
        Ok(options.foreign_keys(true))
    }
}

// =============================================================================
// Store Handle
// =============================================================================

/// What every repository needs: the pool, the store locks, the clock.
///
/// Cloning is cheap; all clones coordinate through the same locks.
#[derive(Debug, Clone)]
pub(crate) struct StoreHandle {
    pub(crate) pool: SqlitePool,
    pub(crate) locks: Arc<StoreLocks>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) backup_dir: Option<PathBuf>,
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("cellar.db")).await?;
/// let receipt = db.sales().sell(SaleRequest::scan("HR-001").units(3)).await?;
/// println!("{} left", receipt.new_on_hand);
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    store: StoreHandle,
}

impl Database {
    /// Opens the store.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite (WAL, NORMAL synchronous, foreign keys)
    /// 3. Creates the connection pool
    /// 4. Runs migrations and creates default settings (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_options = config.connect_options()?;
        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(if config.is_in_memory() {
                None
            } else {
                Some(Duration::from_secs(30 * 60))
            })
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            store: StoreHandle {
                pool,
                locks: Arc::new(StoreLocks::new()),
                clock: config.clock,
                backup_dir: config.backup_dir,
            },
        };

        if config.run_migrations {
            db.ensure_schema().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Idempotent: already applied migrations are skipped.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.store.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Makes sure the schema is current and the settings row exists.
    ///
    /// Called on open and again after a snapshot restore.
    pub async fn ensure_schema(&self) -> DbResult<()> {
        self.run_migrations().await?;
        self.settings().ensure_default().await?;
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For diagnostics. Writes that bypass the repositories also bypass
    /// the store locks.
    pub fn pool(&self) -> &SqlitePool {
        &self.store.pool
    }

    /// The clock this store stamps records with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.store.clock
    }

    /// Products and barcodes.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.store.clone())
    }

    /// Movements, on-hand and inventory listing.
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.store.clone())
    }

    /// The sale protocol.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.store.clone())
    }

    /// Read-only aggregates.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.store.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.store.clone())
    }

    /// Export, import, backup and restore.
    pub fn snapshots(&self) -> SnapshotRepository {
        SnapshotRepository::new(self.store.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.store.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.store.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
