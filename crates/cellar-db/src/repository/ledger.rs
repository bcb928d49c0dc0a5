//! # Ledger Repository
//!
//! The append-only movement log and everything derived from it.
//!
//! ## On-hand Is Derived
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  movements (product House Red)                                          │
//! │  ┌────────┬───────────────┬───────────┐                                 │
//! │  │ change │ reason        │ reference │                                 │
//! │  ├────────┼───────────────┼───────────┤                                 │
//! │  │  +12   │ intake        │           │                                 │
//! │  │   -3   │ sale          │ s-1       │                                 │
//! │  │  -10   │ sale_override │ s-2       │                                 │
//! │  └────────┴───────────────┴───────────┘                                 │
//! │                                                                         │
//! │  on_hand = SUM(change) = -1                                             │
//! │  (idx_movements_product_change covers the query)                        │
//! │                                                                         │
//! │  No stock counter is stored anywhere. Rows are never updated or        │
//! │  deleted; corrections are new adjustment rows.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use cellar_core::ledger::manual_movement;
use cellar_core::validation::{validate_note, validate_recorded_reason};
use cellar_core::{Barcode, InventoryItem, ManualReason, Movement, NewMovement};

use crate::error::DbResult;
use crate::pool::StoreHandle;
use crate::repository::catalog::{all_barcodes_in, list_products_in, require_product_in};
use crate::repository::rows::{MovementRow, MOVEMENT_COLUMNS};

/// Repository for the movement ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    store: StoreHandle,
}

impl LedgerRepository {
    pub(crate) fn new(store: StoreHandle) -> Self {
        LedgerRepository { store }
    }

    /// Appends a movement and returns its id.
    ///
    /// `change` must be non-zero and the product must exist. Sale reasons are
    /// refused: only [`SaleRepository::sell`](crate::SaleRepository::sell)
    /// writes those, together with their sale and earnings rows.
    pub async fn record_movement(&self, movement: NewMovement) -> DbResult<String> {
        validate_recorded_reason(movement.reason, movement.change)?;
        if let Some(note) = &movement.note {
            validate_note(note)?;
        }

        let _guard = self.store.locks.write().await;
        let now = self.store.clock.now();
        let mut tx = self.store.pool.begin().await?;

        require_product_in(&mut tx, &movement.product_id).await?;
        let recorded = insert_movement_in(&mut tx, movement, now).await?;

        tx.commit().await?;

        debug!(
            id = %recorded.id,
            product_id = %recorded.product_id,
            change = recorded.change,
            reason = ?recorded.reason,
            "Movement recorded"
        );
        Ok(recorded.id)
    }

    /// Manual stock entry: intake (units > 0) or adjustment (any non-zero).
    ///
    /// Returns the product's new on-hand.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        units: i64,
        reason: ManualReason,
        note: Option<&str>,
    ) -> DbResult<i64> {
        let movement = manual_movement(product_id, units, reason, note)?;

        let _guard = self.store.locks.write().await;
        let now = self.store.clock.now();
        let mut tx = self.store.pool.begin().await?;

        require_product_in(&mut tx, product_id).await?;
        insert_movement_in(&mut tx, movement, now).await?;
        let on_hand = on_hand_in(&mut tx, product_id).await?;

        tx.commit().await?;

        info!(product_id = %product_id, units, reason = ?reason, on_hand, "Stock adjusted");
        Ok(on_hand)
    }

    /// Σ change over the product's movements; 0 with no movements.
    pub async fn on_hand(&self, product_id: &str) -> DbResult<i64> {
        let _guard = self.store.locks.read().await;
        let mut conn = self.store.pool.acquire().await?;
        require_product_in(&mut conn, product_id).await?;
        on_hand_in(&mut conn, product_id).await
    }

    /// Movements of one product, oldest first.
    pub async fn history(&self, product_id: &str) -> DbResult<Vec<Movement>> {
        let _guard = self.store.locks.read().await;
        let mut conn = self.store.pool.acquire().await?;
        require_product_in(&mut conn, product_id).await?;

        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE product_id = ? ORDER BY created_at, rowid"
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(product_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(Movement::from).collect())
    }

    /// Every product with its barcodes and on-hand, ordered by title.
    ///
    /// Read inside one transaction so the listing is a consistent cut.
    pub async fn list_inventory(&self) -> DbResult<Vec<InventoryItem>> {
        let _guard = self.store.locks.read().await;
        let mut tx = self.store.pool.begin().await?;
        let items = inventory_in(&mut tx).await?;
        tx.commit().await?;
        Ok(items)
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn on_hand_in(conn: &mut SqliteConnection, product_id: &str) -> DbResult<i64> {
    let on_hand: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(change), 0) FROM movements WHERE product_id = ?")
            .bind(product_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(on_hand)
}

pub(crate) async fn insert_movement_in(
    conn: &mut SqliteConnection,
    movement: NewMovement,
    now: DateTime<Utc>,
) -> DbResult<Movement> {
    let movement = Movement {
        id: Uuid::new_v4().to_string(),
        product_id: movement.product_id,
        change: movement.change,
        reason: movement.reason,
        reference_id: movement.reference_id,
        note: movement.note,
        created_at: now,
    };
    write_movement_in(conn, &movement).await?;
    Ok(movement)
}

/// Inserts a fully built movement row as-is.
pub(crate) async fn write_movement_in(
    conn: &mut SqliteConnection,
    movement: &Movement,
) -> DbResult<()> {
    let sql = format!("INSERT INTO movements ({MOVEMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)");
    sqlx::query(&sql)
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.change)
        .bind(movement.reason)
        .bind(&movement.reference_id)
        .bind(&movement.note)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    product_id: String,
    on_hand: i64,
    last_movement_at: Option<DateTime<Utc>>,
}

pub(crate) async fn inventory_in(conn: &mut SqliteConnection) -> DbResult<Vec<InventoryItem>> {
    let products = list_products_in(conn).await?;

    let mut barcodes: HashMap<String, Vec<Barcode>> = HashMap::new();
    for barcode in all_barcodes_in(conn).await? {
        barcodes
            .entry(barcode.product_id.clone())
            .or_default()
            .push(barcode);
    }

    let stock: HashMap<String, StockRow> = sqlx::query_as::<_, StockRow>(
        r#"
        SELECT
            product_id,
            SUM(change) AS on_hand,
            MAX(created_at) AS last_movement_at
        FROM movements
        GROUP BY product_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| (row.product_id.clone(), row))
    .collect();

    Ok(products
        .into_iter()
        .map(|product| {
            let stock = stock.get(&product.id);
            InventoryItem {
                barcodes: barcodes.remove(&product.id).unwrap_or_default(),
                on_hand: stock.map_or(0, |s| s.on_hand),
                last_movement_at: stock.and_then(|s| s.last_movement_at),
                product,
            }
        })
        .collect())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::{Database, DbConfig};
    use cellar_core::{
        Category, ManualReason, Money, MovementReason, NewMovement, NewProduct, Product, Volume,
    };

    async fn setup() -> (Database, Product) {
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
                .with_barcode("HR-001"),
            )
            .await
            .unwrap();
        (db, product)
    }

    #[tokio::test]
    async fn test_on_hand_is_sum_of_changes() {
        let (db, product) = setup().await;
        assert_eq!(db.ledger().on_hand(&product.id).await.unwrap(), 0);

        db.ledger()
            .adjust_stock(&product.id, 12, ManualReason::Intake, None)
            .await
            .unwrap();
        let on_hand = db
            .ledger()
            .adjust_stock(&product.id, -2, ManualReason::Adjustment, Some("breakage"))
            .await
            .unwrap();
        assert_eq!(on_hand, 10);

        let history = db.ledger().history(&product.id).await.unwrap();
        let sum: i64 = history.iter().map(|m| m.change).sum();
        assert_eq!(sum, db.ledger().on_hand(&product.id).await.unwrap());
        assert_eq!(history[0].reason, MovementReason::Intake);
        assert_eq!(history[1].note.as_deref(), Some("breakage"));
    }

    #[tokio::test]
    async fn test_history_keeps_insertion_order_on_equal_timestamps() {
        let (db, product) = setup().await;
        for change in [5, -1, 3, -2] {
            db.ledger()
                .record_movement(NewMovement::new(&product.id, change, MovementReason::Adjustment))
                .await
                .unwrap();
        }
        let changes: Vec<i64> = db
            .ledger()
            .history(&product.id)
            .await
            .unwrap()
            .iter()
            .map(|m| m.change)
            .collect();
        assert_eq!(changes, [5, -1, 3, -2]);
    }

    #[tokio::test]
    async fn test_zero_and_unknown_product_are_rejected() {
        let (db, product) = setup().await;

        let err = db
            .ledger()
            .record_movement(NewMovement::new(&product.id, 0, MovementReason::Adjustment))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = db
            .ledger()
            .record_movement(NewMovement::new("missing", 4, MovementReason::Return))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = db
            .ledger()
            .adjust_stock(&product.id, -1, ManualReason::Intake, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_sale_reasons_are_refused() {
        let (db, product) = setup().await;
        db.ledger()
            .adjust_stock(&product.id, 9, ManualReason::Intake, None)
            .await
            .unwrap();

        for reason in [MovementReason::Sale, MovementReason::SaleOverride] {
            let err = db
                .ledger()
                .record_movement(NewMovement::new(&product.id, -5, reason))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let err = db
            .ledger()
            .record_movement(NewMovement::new(&product.id, -1, MovementReason::Return))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(db.ledger().on_hand(&product.id).await.unwrap(), 9);
        assert_eq!(db.ledger().history(&product.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_inventory() {
        let (db, product) = setup().await;
        let (empty, _) = db
            .catalog()
            .create_product(NewProduct::new(
                "Amber Ale",
                Volume::ml(330.0),
                Category::Beer,
                Money::from_minor(9_000),
            ))
            .await
            .unwrap();
        db.ledger()
            .adjust_stock(&product.id, 7, ManualReason::Intake, None)
            .await
            .unwrap();

        let inventory = db.ledger().list_inventory().await.unwrap();
        assert_eq!(inventory.len(), 2);

        assert_eq!(inventory[0].product.id, empty.id);
        assert_eq!(inventory[0].on_hand, 0);
        assert!(inventory[0].last_movement_at.is_none());
        assert!(inventory[0].barcodes.is_empty());

        assert_eq!(inventory[1].product.id, product.id);
        assert_eq!(inventory[1].on_hand, 7);
        assert!(inventory[1].last_movement_at.is_some());
        assert_eq!(inventory[1].barcodes[0].code, "HR-001");
    }
}
