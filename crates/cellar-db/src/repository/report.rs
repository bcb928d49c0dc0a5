//! # Report Repository
//!
//! Read-only aggregates over sales, earnings and the ledger.
//!
//! Every report is computed from the stored rows on demand. Nothing here
//! writes, and nothing is cached.

use tracing::debug;

use cellar_core::validation::validate_low_stock_threshold;
use cellar_core::{DateRange, InventoryItem, Money, ProductSales};

use crate::error::DbResult;
use crate::pool::StoreHandle;
use crate::repository::ledger::inventory_in;
use crate::repository::settings::settings_in;

/// Repository for reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    store: StoreHandle,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductSalesRow {
    product_id: String,
    title: String,
    total_units: i64,
    total_revenue: i64,
}

impl From<ProductSalesRow> for ProductSales {
    fn from(row: ProductSalesRow) -> Self {
        ProductSales {
            product_id: row.product_id,
            title: row.title,
            total_units: row.total_units,
            total_revenue: Money::from_minor(row.total_revenue),
        }
    }
}

impl ReportRepository {
    pub(crate) fn new(store: StoreHandle) -> Self {
        ReportRepository { store }
    }

    /// Sum of earnings entries inside `range` (bounds inclusive).
    pub async fn total_earnings(&self, range: DateRange) -> DbResult<Money> {
        let _guard = self.store.locks.read().await;
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_minor), 0) FROM earnings_entries
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.store.pool)
        .await?;

        debug!(from = ?range.from, to = ?range.to, total, "Earnings totalled");
        Ok(Money::from_minor(total))
    }

    /// Units and revenue per product inside `range`, highest revenue first.
    ///
    /// Revenue is units × the unit price captured at sale time.
    pub async fn sales_by_product(&self, range: DateRange) -> DbResult<Vec<ProductSales>> {
        let _guard = self.store.locks.read().await;
        let rows = sqlx::query_as::<_, ProductSalesRow>(
            r#"
            SELECT
                s.product_id AS product_id,
                p.title AS title,
                SUM(s.units) AS total_units,
                SUM(s.units * s.unit_price_minor) AS total_revenue
            FROM sales s
            JOIN products p ON p.id = s.product_id
            WHERE (?1 IS NULL OR s.created_at >= ?1)
              AND (?2 IS NULL OR s.created_at <= ?2)
            GROUP BY s.product_id, p.title
            ORDER BY total_revenue DESC, p.title, s.product_id
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.store.pool)
        .await?;

        Ok(rows.into_iter().map(ProductSales::from).collect())
    }

    /// Products whose on-hand is at or below `threshold`, lowest first.
    ///
    /// Without a threshold the store's `low_stock_threshold` setting applies.
    pub async fn low_stock(&self, threshold: Option<i64>) -> DbResult<Vec<InventoryItem>> {
        if let Some(threshold) = threshold {
            validate_low_stock_threshold(threshold)?;
        }

        let _guard = self.store.locks.read().await;
        let mut tx = self.store.pool.begin().await?;

        let threshold = match threshold {
            Some(threshold) => threshold,
            None => settings_in(&mut tx).await?.low_stock_threshold,
        };
        let mut items: Vec<InventoryItem> = inventory_in(&mut tx)
            .await?
            .into_iter()
            .filter(|item| item.on_hand <= threshold)
            .collect();
        tx.commit().await?;

        // Stable sort keeps title order among equal stock levels.
        items.sort_by_key(|item| item.on_hand);

        debug!(threshold, count = items.len(), "Low stock computed");
        Ok(items)
    }
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
        Category, DateRange, ManualClock, ManualReason, Money, NewProduct, ProductPatch,
        SaleRequest, SettingsPatch, Volume,
    };

    async fn store() -> (Database, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
        ));
        let db = Database::new(DbConfig::in_memory().clock(clock.clone()))
            .await
            .unwrap();
        (db, clock)
    }

    async fn product(db: &Database, title: &str, code: &str, price: i64, stock: i64) -> String {
        let (product, _) = db
            .catalog()
            .create_product(
                NewProduct::new(title, Volume::ml(750.0), Category::Spirits, Money::from_minor(price))
                    .with_barcode(code),
            )
            .await
            .unwrap();
        if stock > 0 {
            db.ledger()
                .adjust_stock(&product.id, stock, ManualReason::Intake, None)
                .await
                .unwrap();
        }
        product.id
    }

    #[tokio::test]
    async fn test_total_earnings_respects_range() {
        let (db, clock) = store().await;
        product(&db, "Gin", "GIN", 1_000, 10).await;

        db.sales().sell(SaleRequest::scan("GIN").units(2)).await.unwrap();
        clock.advance(Duration::days(2));
        db.sales().sell(SaleRequest::scan("GIN").units(3)).await.unwrap();

        let all = db.reports().total_earnings(DateRange::all()).await.unwrap();
        assert_eq!(all.minor(), 5_000);

        let first_day = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let end_first_day = Utc.with_ymd_and_hms(2026, 5, 1, 23, 59, 59).unwrap();
        let day_one = db
            .reports()
            .total_earnings(DateRange::between(first_day, end_first_day))
            .await
            .unwrap();
        assert_eq!(day_one.minor(), 2_000);

        let empty = db
            .reports()
            .total_earnings(DateRange::since(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()))
            .await
            .unwrap();
        assert_eq!(empty, Money::zero());
    }

    #[tokio::test]
    async fn test_sales_by_product_uses_captured_prices() {
        let (db, _) = store().await;
        let gin = product(&db, "Gin", "GIN", 1_000, 10).await;
        product(&db, "Rum", "RUM", 800, 10).await;

        db.sales().sell(SaleRequest::scan("GIN").units(1)).await.unwrap();
        db.catalog()
            .update_product(
                &gin,
                ProductPatch {
                    price: Some(Money::from_minor(2_000)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        db.sales().sell(SaleRequest::scan("GIN").units(1)).await.unwrap();
        db.sales().sell(SaleRequest::scan("RUM").units(5)).await.unwrap();

        let rows = db.reports().sales_by_product(DateRange::all()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Rum");
        assert_eq!(rows[0].total_revenue.minor(), 4_000);
        assert_eq!(rows[1].title, "Gin");
        assert_eq!(rows[1].total_units, 2);
        assert_eq!(rows[1].total_revenue.minor(), 3_000);
    }

    #[tokio::test]
    async fn test_low_stock_default_and_explicit_threshold() {
        let (db, _) = store().await;
        product(&db, "Gin", "GIN", 1_000, 3).await;
        product(&db, "Rum", "RUM", 800, 20).await;
        product(&db, "Vodka", "VOD", 900, 0).await;

        let low = db.reports().low_stock(None).await.unwrap();
        let titles: Vec<&str> = low.iter().map(|i| i.product.title.as_str()).collect();
        assert_eq!(titles, ["Vodka", "Gin"]);

        db.settings()
            .update(SettingsPatch {
                low_stock_threshold: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        let low = db.reports().low_stock(None).await.unwrap();
        assert_eq!(low.len(), 1);

        let low = db.reports().low_stock(Some(25)).await.unwrap();
        assert_eq!(low.len(), 3);
        assert_eq!(low[2].product.title, "Rum");

        let err = db.reports().low_stock(Some(-1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_overridden_stock_counts_as_low() {
        let (db, _) = store().await;
        product(&db, "Gin", "GIN", 1_000, 1).await;
        db.sales()
            .sell(SaleRequest::scan("GIN").units(3).forced())
            .await
            .unwrap();

        let low = db.reports().low_stock(Some(0)).await.unwrap();
        assert_eq!(low[0].on_hand, -2);
    }
}
