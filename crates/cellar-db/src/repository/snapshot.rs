//! # Snapshot Repository
//!
//! Whole-store export and import, plus file backups built on them.
//!
//! ## Import Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  bytes ──► StoreSnapshot::from_bytes ──► validate(latest_version)       │
//! │                                              │                          │
//! │                        any failure ◄─────────┤  (store untouched)       │
//! │                        InvalidSnapshot       │                          │
//! │                                              ▼                          │
//! │  LOCK exclusive (no reads, no writes)                                   │
//! │  BEGIN                                                                  │
//! │    DELETE earnings, sales, movements, barcodes, products, settings      │
//! │    INSERT products, barcodes, movements, sales, earnings, settings      │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Export reads every table inside one transaction under the shared gate,
//! in insertion order, so the same store always exports the same rows.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use cellar_core::snapshot::{SnapshotMetadata, StoreSnapshot};
use cellar_core::{CoreError, EarningsEntry, Movement, Product, Sale, Settings, ValidationError};

use crate::error::{DbError, DbResult, ErrorKind};
use crate::migrations;
use crate::pool::StoreHandle;
use crate::repository::catalog::{all_barcodes_in, write_barcode_in, write_product_in};
use crate::repository::ledger::write_movement_in;
use crate::repository::rows::{
    EarningsRow, MovementRow, ProductRow, SaleRow, EARNINGS_COLUMNS, MOVEMENT_COLUMNS,
    PRODUCT_COLUMNS, SALE_COLUMNS,
};
use crate::repository::sale::{insert_earnings_in, insert_sale_in};
use crate::repository::settings::{ensure_default_in, settings_in, write_settings_in};

/// Repository for snapshots and backups.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    store: StoreHandle,
}

impl SnapshotRepository {
    pub(crate) fn new(store: StoreHandle) -> Self {
        SnapshotRepository { store }
    }

    /// The whole store as a [`StoreSnapshot`].
    pub async fn snapshot(&self) -> DbResult<StoreSnapshot> {
        let _guard = self.store.locks.read().await;
        let mut tx = self.store.pool.begin().await?;
        let snapshot = snapshot_in(&mut tx, self.store.clock.now()).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    /// The whole store, serialized.
    pub async fn export(&self) -> DbResult<Vec<u8>> {
        let snapshot = self.snapshot().await?;
        let bytes = snapshot.to_bytes()?;
        info!(
            rows = snapshot.row_count(),
            bytes = bytes.len(),
            "Store exported"
        );
        Ok(bytes)
    }

    /// Replaces the entire store with the snapshot in `bytes`.
    ///
    /// The snapshot is parsed and checked before anything is touched; a
    /// rejected snapshot returns `InvalidSnapshot` and leaves the store as
    /// it was.
    pub async fn import(&self, bytes: &[u8]) -> DbResult<SnapshotMetadata> {
        let snapshot = StoreSnapshot::from_bytes(bytes)
            .and_then(|snapshot| {
                snapshot.validate(migrations::latest_version())?;
                Ok(snapshot)
            })
            .map_err(|err| {
                warn!(error = %err, "Snapshot rejected");
                err
            })?;

        let _guard = self.store.locks.exclusive().await;
        let now = self.store.clock.now();
        let mut tx = self.store.pool.begin().await?;

        if let Err(err) = replace_in(&mut tx, &snapshot, now).await {
            return Err(refused_by_schema(err));
        }
        tx.commit().await.map_err(|e| refused_by_schema(e.into()))?;

        // Still under the exclusive lock: the restored store gets the same
        // schema check as a freshly opened one.
        migrations::run_migrations(&self.store.pool).await?;

        let metadata = SnapshotMetadata::from(&snapshot);
        info!(
            products = metadata.product_count,
            movements = metadata.movement_count,
            sales = metadata.sale_count,
            exported_at = %metadata.exported_at,
            "Store restored from snapshot"
        );
        Ok(metadata)
    }

    /// Writes an export to disk and returns the file written.
    ///
    /// `target` may be a file or an existing directory. Without one the
    /// `backup_path` setting names the directory, falling back to the
    /// configured backup directory. In a directory the file is named
    /// `cellar-<unix millis>.snapshot.json`.
    pub async fn backup_to_file(&self, target: Option<&Path>) -> DbResult<PathBuf> {
        let path = match target {
            Some(target) if is_dir(target).await => {
                target.join(backup_file_name(self.store.clock.now()))
            }
            Some(target) => target.to_path_buf(),
            None => {
                let dir = self.backup_dir().await?;
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| DbError::file(&dir, e))?;
                dir.join(backup_file_name(self.store.clock.now()))
            }
        };

        let bytes = self.export().await?;

        // Write beside the target and rename so a crash never leaves half a backup.
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| DbError::file(&partial, e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| DbError::file(&path, e))?;

        info!(path = %path.display(), bytes = bytes.len(), "Backup written");
        Ok(path)
    }

    /// Reads a backup file and imports it.
    pub async fn restore_from_file(&self, path: &Path) -> DbResult<SnapshotMetadata> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DbError::file(path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Backup read");
        self.import(&bytes).await
    }

    async fn backup_dir(&self) -> DbResult<PathBuf> {
        let settings = {
            let _guard = self.store.locks.read().await;
            let mut conn = self.store.pool.acquire().await?;
            settings_in(&mut conn).await?
        };
        settings
            .backup_path
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| self.store.backup_dir.clone())
            .ok_or_else(|| {
                ValidationError::Required {
                    field: "backupPath".to_string(),
                }
                .into()
            })
    }
}

/// A row the schema refuses means the snapshot was bad, not the store.
fn refused_by_schema(err: DbError) -> DbError {
    if err.is_constraint_violation() {
        warn!(error = %err, "Snapshot rejected by schema constraints");
        CoreError::invalid_snapshot(err.to_string()).into()
    } else {
        err
    }
}

fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("cellar-{}.snapshot.json", at.timestamp_millis())
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

// =============================================================================
// Connection-level helpers
// =============================================================================

async fn snapshot_in(conn: &mut SqliteConnection, now: DateTime<Utc>) -> DbResult<StoreSnapshot> {
    let mut snapshot = StoreSnapshot::new(migrations::latest_version(), now);

    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at, rowid");
    snapshot.products = sqlx::query_as::<_, ProductRow>(&sql)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    snapshot.barcodes = all_barcodes_in(conn).await?;

    let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM movements ORDER BY created_at, rowid");
    snapshot.movements = sqlx::query_as::<_, MovementRow>(&sql)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Movement::from)
        .collect();

    let sql = format!("SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at, rowid");
    snapshot.sales = sqlx::query_as::<_, SaleRow>(&sql)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Sale::from)
        .collect();

    let sql = format!("SELECT {EARNINGS_COLUMNS} FROM earnings_entries ORDER BY created_at, rowid");
    snapshot.earnings = sqlx::query_as::<_, EarningsRow>(&sql)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(EarningsEntry::from)
        .collect();

    snapshot.settings = match settings_in(conn).await {
        Ok(settings) => Some(settings),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => return Err(err),
    };

    Ok(snapshot)
}

async fn replace_in(
    conn: &mut SqliteConnection,
    snapshot: &StoreSnapshot,
    now: DateTime<Utc>,
) -> DbResult<()> {
    // Children first so no foreign key is left dangling mid-way.
    for table in [
        "earnings_entries",
        "sales",
        "movements",
        "barcodes",
        "products",
        "settings",
    ] {
        let deleted = sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *conn)
            .await?
            .rows_affected();
        debug!(table, deleted, "Table cleared");
    }

    // products.default_barcode_id is checked at COMMIT, after the barcodes exist.
    for product in &snapshot.products {
        write_product_in(conn, product).await?;
    }
    for barcode in &snapshot.barcodes {
        write_barcode_in(conn, barcode).await?;
    }
    for movement in &snapshot.movements {
        write_movement_in(conn, movement).await?;
    }
    for sale in &snapshot.sales {
        insert_sale_in(conn, sale).await?;
    }
    for entry in &snapshot.earnings {
        insert_earnings_in(conn, entry).await?;
    }

    match &snapshot.settings {
        Some(settings) => {
            write_settings_in(conn, settings, false).await?;
        }
        None => ensure_default_in(conn, &Settings::defaults(now)).await?,
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::refused_by_schema;
    use crate::error::{DbError, ErrorKind};
    use crate::{Database, DbConfig};
    use cellar_core::snapshot::StoreSnapshot;
    use cellar_core::{
        Category, ManualReason, Money, NewProduct, SaleRequest, SettingsPatch, Volume,
    };

    async fn populated() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product, _) = db
            .catalog()
            .create_product(
                NewProduct::new(
                    "House Red",
                    Volume::ml(750.0),
                    Category::Wine,
                    Money::from_minor(45_000),
                )
                .with_sku("HR")
                .with_barcode("HR-001"),
            )
            .await
            .unwrap();
        db.ledger()
            .adjust_stock(&product.id, 12, ManualReason::Intake, None)
            .await
            .unwrap();
        db.sales()
            .sell(SaleRequest::scan("HR-001").units(3))
            .await
            .unwrap();
        db.settings()
            .update(SettingsPatch {
                currency: Some("EUR".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_export_import_reproduces_store() {
        let source = populated().await;
        let bytes = source.snapshots().export().await.unwrap();

        let target = Database::new(DbConfig::in_memory()).await.unwrap();
        let metadata = target.snapshots().import(&bytes).await.unwrap();
        assert_eq!(metadata.product_count, 1);
        assert_eq!(metadata.movement_count, 2);
        assert_eq!(metadata.sale_count, 1);

        assert_eq!(
            source.ledger().list_inventory().await.unwrap(),
            target.ledger().list_inventory().await.unwrap()
        );
        assert_eq!(target.settings().get().await.unwrap().currency, "EUR");

        let resolved = target
            .catalog()
            .resolve_barcode("HR-001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.ledger().on_hand(&resolved.product.id).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_import_replaces_existing_rows() {
        let source = populated().await;
        let bytes = source.snapshots().export().await.unwrap();

        let target = Database::new(DbConfig::in_memory()).await.unwrap();
        target
            .catalog()
            .create_product(
                NewProduct::new("Old", Volume::ml(330.0), Category::Beer, Money::from_minor(100))
                    .with_barcode("OLD"),
            )
            .await
            .unwrap();

        target.snapshots().import(&bytes).await.unwrap();
        assert!(target.catalog().resolve_barcode("OLD").await.unwrap().is_none());
        assert_eq!(target.catalog().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_snapshot_leaves_store_untouched() {
        let db = populated().await;
        let before = db.ledger().list_inventory().await.unwrap();

        let err = db.snapshots().import(b"not json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSnapshot);

        let mut snapshot: StoreSnapshot = StoreSnapshot::from_bytes(
            &db.snapshots().export().await.unwrap(),
        )
        .unwrap();
        snapshot.movements[0].product_id = "ghost".to_string();
        let err = db
            .snapshots()
            .import(&snapshot.to_bytes().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSnapshot);

        let mut newer = StoreSnapshot::from_bytes(&db.snapshots().export().await.unwrap()).unwrap();
        newer.schema_version += 1;
        let err = db
            .snapshots()
            .import(&newer.to_bytes().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSnapshot);

        assert_eq!(db.ledger().list_inventory().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_out_of_range_values_are_invalid_snapshots() {
        let db = populated().await;
        let before = db.ledger().list_inventory().await.unwrap();
        let exported = db.snapshots().snapshot().await.unwrap();

        let mut negative_volume = exported.clone();
        negative_volume.products[0].volume = Volume::ml(-1.0);

        let mut zero_scan_qty = exported.clone();
        let mut bad_currency = exported.clone();
        if let (Some(a), Some(b)) = (
            zero_scan_qty.settings.as_mut(),
            bad_currency.settings.as_mut(),
        ) {
            a.scan_default_qty = 0;
            b.currency = "not a currency".to_string();
        }

        for snapshot in [negative_volume, zero_scan_qty, bad_currency] {
            let err = db
                .snapshots()
                .import(&snapshot.to_bytes().unwrap())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSnapshot);
        }

        assert_eq!(db.ledger().list_inventory().await.unwrap(), before);
        assert_eq!(db.settings().get().await.unwrap().currency, "EUR");
    }

    #[tokio::test]
    async fn test_sale_movement_without_its_sale_is_invalid() {
        let db = populated().await;
        let before = db.ledger().list_inventory().await.unwrap();

        let mut snapshot = db.snapshots().snapshot().await.unwrap();
        let sale_movement = snapshot
            .movements
            .iter_mut()
            .find(|m| m.reference_id.is_some())
            .unwrap();
        sale_movement.reference_id = Some("ghost-sale".to_string());
        sale_movement.change = -50;

        let err = db
            .snapshots()
            .import(&snapshot.to_bytes().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSnapshot);
        assert_eq!(db.ledger().list_inventory().await.unwrap(), before);
        assert_eq!(db.sales().list_sales(Default::default()).await.unwrap().len(), 1);
    }

    #[test]
    fn test_schema_refusals_become_invalid_snapshots() {
        let err = refused_by_schema(DbError::CheckViolation {
            message: "volume_quantity > 0".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::InvalidSnapshot);

        let err = refused_by_schema(DbError::QueryFailed("disk I/O error".to_string()));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[tokio::test]
    async fn test_import_without_settings_restores_defaults() {
        let db = populated().await;
        let mut snapshot = db.snapshots().snapshot().await.unwrap();
        snapshot.settings = None;

        db.snapshots()
            .import(&snapshot.to_bytes().unwrap())
            .await
            .unwrap();
        assert_eq!(db.settings().get().await.unwrap().currency, "INR");
    }

    #[tokio::test]
    async fn test_backup_and_restore_files() {
        let dir = tempfile::tempdir().unwrap();
        let db = populated().await;

        let written = db.snapshots().backup_to_file(Some(dir.path())).await.unwrap();
        assert!(written.starts_with(dir.path()));
        let name = written.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("cellar-") && name.ends_with(".snapshot.json"));

        let explicit = dir.path().join("manual.json");
        let written = db.snapshots().backup_to_file(Some(explicit.as_path())).await.unwrap();
        assert_eq!(written, explicit);

        let fresh = Database::new(DbConfig::in_memory()).await.unwrap();
        fresh.snapshots().restore_from_file(&explicit).await.unwrap();
        assert_eq!(
            fresh.ledger().list_inventory().await.unwrap(),
            db.ledger().list_inventory().await.unwrap()
        );

        let err = fresh
            .snapshots()
            .restore_from_file(&dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(err.is_storage_failure());
    }

    #[tokio::test]
    async fn test_backup_uses_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = populated().await;

        let err = db.snapshots().backup_to_file(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let backups = dir.path().join("backups");
        db.settings()
            .update(SettingsPatch {
                backup_path: Some(Some(backups.display().to_string())),
                ..Default::default()
            })
            .await
            .unwrap();

        let written = db.snapshots().backup_to_file(None).await.unwrap();
        assert_eq!(written.parent().unwrap(), backups);
        assert!(written.exists());
    }

    #[tokio::test]
    async fn test_backup_falls_back_to_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("fallback");
        let db = Database::new(DbConfig::in_memory().backup_dir(&fallback))
            .await
            .unwrap();

        let written = db.snapshots().backup_to_file(None).await.unwrap();
        assert_eq!(written.parent().unwrap(), fallback);
    }
}
