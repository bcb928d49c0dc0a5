//! # Sale Repository
//!
//! The sale protocol: one scan becomes a sale row, a stock movement, and an
//! earnings entry, committed together.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       sell(SaleRequest)                                 │
//! │                                                                         │
//! │  1. LOCK      store writer (no other mutation can interleave)           │
//! │  2. BEGIN     one SQLite transaction                                    │
//! │  3. UNITS     request.units or settings.scan_default_qty                │
//! │  4. RESOLVE   barcode → product          (UnknownBarcode)               │
//! │  5. ON HAND   SUM(change) for product                                   │
//! │  6. GUARD     on_hand < units && !force  (InsufficientStock, no writes) │
//! │  7. WRITE     INSERT sales                                              │
//! │               INSERT movements   (-units, sale | sale_override)         │
//! │               INSERT earnings_entries (units × unit_price)              │
//! │  8. COMMIT    all three or none                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dropping the transaction without committing rolls it back, so every
//! early return with `?` leaves the store as it was.

use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use cellar_core::ledger::{plan_sale, SaleIds, SaleInput};
use cellar_core::validation::validate_units;
use cellar_core::{
    CoreError, DateRange, EarningsEntry, ResolvedBarcode, Sale, SaleReceipt, SaleRequest,
};

use crate::error::DbResult;
use crate::pool::StoreHandle;
use crate::repository::catalog::resolve_in;
use crate::repository::ledger::{on_hand_in, write_movement_in};
use crate::repository::rows::{EarningsRow, SaleRow, EARNINGS_COLUMNS, SALE_COLUMNS};
use crate::repository::settings::settings_in;

/// Repository for sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    store: StoreHandle,
}

impl SaleRepository {
    pub(crate) fn new(store: StoreHandle) -> Self {
        SaleRepository { store }
    }

    /// Sells `units` of whatever `code` resolves to.
    ///
    /// ## Errors
    /// - `UnknownBarcode` if nothing has this code
    /// - `InsufficientStock` if stock is short and `force` is not set
    /// - `Validation` for units outside 1..=9999
    ///
    /// None of these write anything.
    pub async fn sell(&self, request: SaleRequest) -> DbResult<SaleReceipt> {
        let code = request.code.trim();
        if let Some(units) = request.units {
            validate_units(units)?;
        }

        let _guard = self.store.locks.write().await;
        let now = self.store.clock.now();
        let mut tx = self.store.pool.begin().await?;

        let units = match request.units {
            Some(units) => units,
            None => settings_in(&mut tx).await?.scan_default_qty,
        };

        let Some(ResolvedBarcode { product, barcode }) = resolve_in(&mut tx, code).await? else {
            debug!(code = %code, "Scan did not resolve");
            return Err(CoreError::UnknownBarcode(code.to_string()).into());
        };

        let on_hand = on_hand_in(&mut tx, &product.id).await?;

        let plan = plan_sale(
            SaleInput {
                product: &product,
                barcode: &barcode,
                units,
                on_hand,
                force: request.force,
                note: request.note.as_deref(),
                now,
            },
            SaleIds::generate(),
        )
        .map_err(|err| {
            if let CoreError::InsufficientStock { .. } = &err {
                info!(product_id = %product.id, on_hand, requested = units, "Sale refused: insufficient stock");
            }
            err
        })?;

        insert_sale_in(&mut tx, &plan.sale).await?;
        write_movement_in(&mut tx, &plan.movement).await?;
        insert_earnings_in(&mut tx, &plan.earnings).await?;

        tx.commit().await?;

        if plan.decision.is_override() {
            warn!(
                sale_id = %plan.sale.id,
                product_id = %product.id,
                on_hand,
                units,
                note = plan.movement.note.as_deref().unwrap_or(""),
                "Sale recorded as override"
            );
        }
        info!(
            sale_id = %plan.sale.id,
            product_id = %product.id,
            units,
            amount = plan.earnings.amount.minor(),
            new_on_hand = plan.new_on_hand(),
            "Sale committed"
        );

        Ok(plan.receipt(product, barcode))
    }

    /// A sale by id. `SaleNotFound` if missing.
    pub async fn get_sale(&self, id: &str) -> DbResult<Sale> {
        let _guard = self.store.locks.read().await;
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await?;
        row.map(Sale::from)
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()).into())
    }

    /// Sales inside `range`, newest first.
    pub async fn list_sales(&self, range: DateRange) -> DbResult<Vec<Sale>> {
        let _guard = self.store.locks.read().await;
        let sql = format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
            ORDER BY created_at DESC, rowid DESC
            "#
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(range.from)
            .bind(range.to)
            .fetch_all(&self.store.pool)
            .await?;
        Ok(rows.into_iter().map(Sale::from).collect())
    }

    /// The earnings entry booked for a sale.
    pub async fn earnings_for_sale(&self, sale_id: &str) -> DbResult<EarningsEntry> {
        let _guard = self.store.locks.read().await;
        let sql = format!("SELECT {EARNINGS_COLUMNS} FROM earnings_entries WHERE sale_id = ?");
        let row = sqlx::query_as::<_, EarningsRow>(&sql)
            .bind(sale_id)
            .fetch_optional(&self.store.pool)
            .await?;
        row.map(EarningsEntry::from)
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn insert_sale_in(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    let sql = format!("INSERT INTO sales ({SALE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)");
    sqlx::query(&sql)
        .bind(&sale.id)
        .bind(&sale.product_id)
        .bind(sale.units)
        .bind(sale.unit_price.minor())
        .bind(&sale.barcode_id)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn insert_earnings_in(
    conn: &mut SqliteConnection,
    entry: &EarningsEntry,
) -> DbResult<()> {
    let sql = format!("INSERT INTO earnings_entries ({EARNINGS_COLUMNS}) VALUES (?, ?, ?, ?, ?)");
    sqlx::query(&sql)
        .bind(&entry.id)
        .bind(&entry.sale_id)
        .bind(&entry.product_id)
        .bind(entry.amount.minor())
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use crate::error::ErrorKind;
    use crate::{Database, DbConfig};
    use cellar_core::{
        Category, DateRange, ManualClock, ManualReason, Money, MovementReason, NewProduct,
        ProductPatch, SaleRequest, SettingsPatch, Volume,
    };

    async fn stocked(units: i64) -> (Database, String, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        ));
        let db = Database::new(DbConfig::in_memory().clock(clock.clone()))
            .await
            .unwrap();
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
        if units > 0 {
            db.ledger()
                .adjust_stock(&product.id, units, ManualReason::Intake, None)
                .await
                .unwrap();
        }
        (db, product.id, clock)
    }

    #[tokio::test]
    async fn test_sell_writes_three_linked_records() {
        let (db, product_id, _) = stocked(12).await;

        let receipt = db
            .sales()
            .sell(SaleRequest::scan("HR-001").units(3))
            .await
            .unwrap();
        assert_eq!(receipt.units, 3);
        assert_eq!(receipt.amount.minor(), 135_000);
        assert_eq!(receipt.new_on_hand, 9);
        assert!(!receipt.overridden);

        let sale = db.sales().get_sale(&receipt.sale_id).await.unwrap();
        assert_eq!(sale.product_id, product_id);
        assert_eq!(sale.unit_price.minor(), 45_000);
        assert_eq!(sale.barcode_id.as_deref(), Some(receipt.barcode.id.as_str()));

        let earnings = db.sales().earnings_for_sale(&sale.id).await.unwrap();
        assert_eq!(earnings.amount.minor(), 135_000);

        let history = db.ledger().history(&product_id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.change, -3);
        assert_eq!(last.reason, MovementReason::Sale);
        assert_eq!(last.reference_id.as_deref(), Some(sale.id.as_str()));
    }

    #[tokio::test]
    async fn test_units_default_to_scan_quantity() {
        let (db, _, _) = stocked(12).await;
        db.settings()
            .update(SettingsPatch {
                scan_default_qty: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();

        let receipt = db.sales().sell(SaleRequest::scan("HR-001")).await.unwrap();
        assert_eq!(receipt.units, 2);
        assert_eq!(receipt.new_on_hand, 10);
    }

    #[tokio::test]
    async fn test_selling_exactly_the_last_units_needs_no_force() {
        let (db, _, _) = stocked(3).await;
        let receipt = db
            .sales()
            .sell(SaleRequest::scan("HR-001").units(3))
            .await
            .unwrap();
        assert_eq!(receipt.new_on_hand, 0);
        assert!(!receipt.overridden);

        let err = db
            .sales()
            .sell(SaleRequest::scan("HR-001"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[tokio::test]
    async fn test_unknown_code_and_bad_units() {
        let (db, _, _) = stocked(5).await;

        let err = db.sales().sell(SaleRequest::scan("NOPE")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownBarcode);

        let err = db
            .sales()
            .sell(SaleRequest::scan("HR-001").units(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(db.sales().list_sales(DateRange::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_captured_price_survives_price_change() {
        let (db, product_id, _) = stocked(10).await;
        let receipt = db
            .sales()
            .sell(SaleRequest::scan("HR-001").units(1))
            .await
            .unwrap();

        db.catalog()
            .update_product(
                &product_id,
                ProductPatch {
                    price: Some(Money::from_minor(99_900)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let sale = db.sales().get_sale(&receipt.sale_id).await.unwrap();
        assert_eq!(sale.unit_price.minor(), 45_000);
    }

    #[tokio::test]
    async fn test_list_sales_newest_first_within_range() {
        let (db, _, clock) = stocked(10).await;

        let first = db.sales().sell(SaleRequest::scan("HR-001")).await.unwrap();
        clock.advance(Duration::days(1));
        let second = db.sales().sell(SaleRequest::scan("HR-001")).await.unwrap();
        clock.advance(Duration::days(1));
        let third = db.sales().sell(SaleRequest::scan("HR-001")).await.unwrap();

        let ids: Vec<String> = db
            .sales()
            .list_sales(DateRange::all())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, [third.sale_id.clone(), second.sale_id.clone(), first.sale_id]);

        let day_two = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let only_second = db
            .sales()
            .list_sales(DateRange::between(day_two, day_two))
            .await
            .unwrap();
        assert_eq!(only_second.len(), 1);
        assert_eq!(only_second[0].id, second.sale_id);

        let since = db.sales().list_sales(DateRange::since(day_two)).await.unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].id, third.sale_id);
    }

    #[tokio::test]
    async fn test_missing_sale_is_not_found() {
        let (db, _, _) = stocked(0).await;
        let err = db.sales().get_sale("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = db.sales().earnings_for_sale("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
