//! # Catalog Repository
//!
//! Products, their barcodes, and scan resolution.
//!
//! ## Scan Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Scanner emits "HR-001"                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  barcodes.code (UNIQUE index) ──► barcode row                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  products.id = barcode.product_id ──► product row                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ResolvedBarcode { product, barcode }                                   │
//! │                                                                         │
//! │  A code belongs to exactly one product, store-wide.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use cellar_core::validation::{validate_new_barcode, validate_new_product, validate_product_patch};
use cellar_core::{Barcode, CoreError, NewBarcode, NewProduct, Product, ProductPatch, ResolvedBarcode};

use crate::error::DbResult;
use crate::pool::StoreHandle;
use crate::repository::rows::{BarcodeRow, ProductRow, BARCODE_COLUMNS, PRODUCT_COLUMNS};

/// Repository for products and barcodes.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    store: StoreHandle,
}

impl CatalogRepository {
    pub(crate) fn new(store: StoreHandle) -> Self {
        CatalogRepository { store }
    }

    /// Creates a product, with any initial barcodes, in one transaction.
    ///
    /// ## Errors
    /// - `DuplicateSku` if another product has the SKU
    /// - `DuplicateBarcode` if any listed code is already registered
    ///
    /// Nothing is written when either check fails.
    pub async fn create_product(&self, input: NewProduct) -> DbResult<(Product, Vec<Barcode>)> {
        let input = NewProduct {
            title: input.title.trim().to_string(),
            sku: input.sku.map(|s| s.trim().to_string()),
            barcodes: input.barcodes.into_iter().map(trimmed).collect(),
            ..input
        };
        validate_new_product(&input)?;

        let _guard = self.store.locks.write().await;
        let now = self.store.clock.now();
        let mut tx = self.store.pool.begin().await?;

        if let Some(sku) = &input.sku {
            if sku_owner_in(&mut tx, sku).await?.is_some() {
                return Err(CoreError::DuplicateSku(sku.clone()).into());
            }
        }

        let product = Product {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            volume: input.volume,
            category: input.category,
            price: input.price,
            cost: input.cost,
            sku: input.sku,
            default_barcode_id: None,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, title = %product.title, "Creating product");

        write_product_in(&mut tx, &product).await?;

        let mut barcodes = Vec::with_capacity(input.barcodes.len());
        for barcode in &input.barcodes {
            barcodes.push(insert_barcode_in(&mut tx, &product.id, barcode, now).await?);
        }

        tx.commit().await?;

        info!(id = %product.id, barcodes = barcodes.len(), "Product created");
        Ok((product, barcodes))
    }

    /// Applies a partial update.
    ///
    /// ## Errors
    /// - `ProductNotFound` for an unknown id
    /// - `BarcodeNotFound` if `default_barcode_id` is not one of this
    ///   product's barcodes
    /// - `DuplicateSku` if another product has the new SKU
    pub async fn update_product(&self, id: &str, patch: ProductPatch) -> DbResult<Product> {
        let patch = ProductPatch {
            title: patch.title.map(|t| t.trim().to_string()),
            sku: patch.sku.map(|sku| sku.map(|s| s.trim().to_string())),
            ..patch
        };
        validate_product_patch(&patch)?;

        let _guard = self.store.locks.write().await;
        let now = self.store.clock.now();
        let mut tx = self.store.pool.begin().await?;

        let existing = require_product_in(&mut tx, id).await?;

        if let Some(Some(barcode_id)) = &patch.default_barcode_id {
            let owner: Option<String> =
                sqlx::query_scalar("SELECT product_id FROM barcodes WHERE id = ?")
                    .bind(barcode_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if owner.as_deref() != Some(id) {
                return Err(CoreError::BarcodeNotFound(barcode_id.clone()).into());
            }
        }

        if let Some(Some(sku)) = &patch.sku {
            if let Some(owner) = sku_owner_in(&mut tx, sku).await? {
                if owner != id {
                    return Err(CoreError::DuplicateSku(sku.clone()).into());
                }
            }
        }

        let updated = patch.apply(&existing, now);

        sqlx::query(
            r#"
            UPDATE products SET
                title = ?2,
                volume_quantity = ?3,
                volume_unit = ?4,
                category = ?5,
                price_minor = ?6,
                cost_minor = ?7,
                sku = ?8,
                default_barcode_id = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(&updated.id)
        .bind(&updated.title)
        .bind(updated.volume.quantity)
        .bind(updated.volume.unit)
        .bind(updated.category)
        .bind(updated.price.minor())
        .bind(updated.cost.map(|c| c.minor()))
        .bind(&updated.sku)
        .bind(&updated.default_barcode_id)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(id = %id, "Product updated");
        Ok(updated)
    }

    /// Deletes a product and its barcodes.
    ///
    /// ## Errors
    /// - `ProductNotFound` for an unknown id
    /// - `ProductHasHistory` if any movement or sale references it
    pub async fn delete_product(&self, id: &str) -> DbResult<()> {
        let _guard = self.store.locks.write().await;
        let mut tx = self.store.pool.begin().await?;

        require_product_in(&mut tx, id).await?;

        let history: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM movements WHERE product_id = ?1) +
                (SELECT COUNT(*) FROM sales WHERE product_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if history > 0 {
            return Err(CoreError::ProductHasHistory(id.to_string()).into());
        }

        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(id = %id, "Product deleted");
        Ok(())
    }

    /// All products ordered by title.
    pub async fn list_products(&self) -> DbResult<Vec<Product>> {
        let _guard = self.store.locks.read().await;
        let mut conn = self.store.pool.acquire().await?;
        list_products_in(&mut conn).await
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Product> {
        let _guard = self.store.locks.read().await;
        let mut conn = self.store.pool.acquire().await?;
        require_product_in(&mut conn, id).await
    }

    /// Barcodes of one product, oldest first.
    pub async fn barcodes_for(&self, product_id: &str) -> DbResult<Vec<Barcode>> {
        let _guard = self.store.locks.read().await;
        let mut conn = self.store.pool.acquire().await?;
        require_product_in(&mut conn, product_id).await?;
        barcodes_in(&mut conn, product_id).await
    }

    /// Registers another barcode for a product.
    ///
    /// ## Errors
    /// - `ProductNotFound` for an unknown product
    /// - `DuplicateBarcode` if the code exists on any product
    pub async fn add_barcode(&self, product_id: &str, barcode: NewBarcode) -> DbResult<Barcode> {
        let barcode = trimmed(barcode);
        validate_new_barcode(&barcode)?;

        let _guard = self.store.locks.write().await;
        let now = self.store.clock.now();
        let mut tx = self.store.pool.begin().await?;

        require_product_in(&mut tx, product_id).await?;
        let created = insert_barcode_in(&mut tx, product_id, &barcode, now).await?;

        tx.commit().await?;

        info!(product_id = %product_id, code = %created.code, "Barcode added");
        Ok(created)
    }

    /// Looks up a scanned code.
    pub async fn resolve_barcode(&self, code: &str) -> DbResult<Option<ResolvedBarcode>> {
        let _guard = self.store.locks.read().await;
        let mut conn = self.store.pool.acquire().await?;
        resolve_in(&mut conn, code.trim()).await
    }

    /// Number of products in the catalog.
    pub async fn count(&self) -> DbResult<i64> {
        let _guard = self.store.locks.read().await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.store.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

fn trimmed(barcode: NewBarcode) -> NewBarcode {
    NewBarcode {
        code: barcode.code.trim().to_string(),
        barcode_type: barcode.barcode_type.map(|t| t.trim().to_string()),
    }
}

pub(crate) async fn product_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(Product::from))
}

pub(crate) async fn require_product_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    product_in(conn, id)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
}

pub(crate) async fn list_products_in(conn: &mut SqliteConnection) -> DbResult<Vec<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY title, id");
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(Product::from).collect())
}

pub(crate) async fn barcodes_in(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Vec<Barcode>> {
    let sql = format!(
        "SELECT {BARCODE_COLUMNS} FROM barcodes WHERE product_id = ? ORDER BY created_at, rowid"
    );
    let rows = sqlx::query_as::<_, BarcodeRow>(&sql)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(Barcode::from).collect())
}

pub(crate) async fn all_barcodes_in(conn: &mut SqliteConnection) -> DbResult<Vec<Barcode>> {
    let sql = format!("SELECT {BARCODE_COLUMNS} FROM barcodes ORDER BY created_at, rowid");
    let rows = sqlx::query_as::<_, BarcodeRow>(&sql)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(Barcode::from).collect())
}

pub(crate) async fn resolve_in(
    conn: &mut SqliteConnection,
    code: &str,
) -> DbResult<Option<ResolvedBarcode>> {
    let sql = format!("SELECT {BARCODE_COLUMNS} FROM barcodes WHERE code = ?");
    let Some(row) = sqlx::query_as::<_, BarcodeRow>(&sql)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let barcode = Barcode::from(row);
    let product = require_product_in(conn, &barcode.product_id).await?;
    Ok(Some(ResolvedBarcode { product, barcode }))
}

async fn sku_owner_in(conn: &mut SqliteConnection, sku: &str) -> DbResult<Option<String>> {
    let owner: Option<String> = sqlx::query_scalar("SELECT id FROM products WHERE sku = ?")
        .bind(sku)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(owner)
}

async fn insert_barcode_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    input: &NewBarcode,
    now: DateTime<Utc>,
) -> DbResult<Barcode> {
    let taken: Option<String> = sqlx::query_scalar("SELECT id FROM barcodes WHERE code = ?")
        .bind(&input.code)
        .fetch_optional(&mut *conn)
        .await?;
    if taken.is_some() {
        return Err(CoreError::DuplicateBarcode(input.code.clone()).into());
    }

    let barcode = Barcode {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        code: input.code.clone(),
        barcode_type: input.type_or_default().to_string(),
        created_at: now,
        updated_at: now,
    };

    write_barcode_in(conn, &barcode).await?;
    Ok(barcode)
}

/// Inserts a fully built product row as-is.
pub(crate) async fn write_product_in(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    let sql = format!(
        "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );
    sqlx::query(&sql)
        .bind(&product.id)
        .bind(&product.title)
        .bind(product.volume.quantity)
        .bind(product.volume.unit)
        .bind(product.category)
        .bind(product.price.minor())
        .bind(product.cost.map(|c| c.minor()))
        .bind(&product.sku)
        .bind(&product.default_barcode_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Inserts a fully built barcode row as-is.
pub(crate) async fn write_barcode_in(conn: &mut SqliteConnection, barcode: &Barcode) -> DbResult<()> {
    let sql = format!("INSERT INTO barcodes ({BARCODE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)");
    sqlx::query(&sql)
        .bind(&barcode.id)
        .bind(&barcode.product_id)
        .bind(&barcode.code)
        .bind(&barcode.barcode_type)
        .bind(barcode.created_at)
        .bind(barcode.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::{Database, DbConfig};
    use cellar_core::{Category, Money, NewBarcode, NewProduct, ProductPatch, Volume};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn house_red() -> NewProduct {
        NewProduct::new("House Red", Volume::ml(750.0), Category::Wine, Money::from_minor(45_000))
    }

    #[tokio::test]
    async fn test_create_with_barcodes_and_resolve() {
        let db = db().await;
        let (product, barcodes) = db
            .catalog()
            .create_product(house_red().with_sku("HR-750").with_barcode(" HR-001 "))
            .await
            .unwrap();

        assert_eq!(barcodes.len(), 1);
        assert_eq!(barcodes[0].code, "HR-001");
        assert_eq!(barcodes[0].barcode_type, "custom");

        let resolved = db.catalog().resolve_barcode("HR-001").await.unwrap().unwrap();
        assert_eq!(resolved.product.id, product.id);
        assert_eq!(resolved.product.volume, Volume::ml(750.0));
        assert!(db.catalog().resolve_barcode("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku_writes_nothing() {
        let db = db().await;
        db.catalog()
            .create_product(house_red().with_sku("HR-750"))
            .await
            .unwrap();

        let err = db
            .catalog()
            .create_product(house_red().with_sku("HR-750").with_barcode("HR-XYZ"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateSku);
        assert_eq!(db.catalog().count().await.unwrap(), 1);
        assert!(db.catalog().resolve_barcode("HR-XYZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_with_taken_code_rolls_back_product() {
        let db = db().await;
        db.catalog()
            .create_product(house_red().with_barcode("HR-001"))
            .await
            .unwrap();

        let err = db
            .catalog()
            .create_product(house_red().with_barcode("HR-002").with_barcode("HR-001"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateBarcode);
        assert_eq!(db.catalog().count().await.unwrap(), 1);
        assert!(db.catalog().resolve_barcode("HR-002").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_patch_and_default_barcode() {
        let db = db().await;
        let (product, _) = db.catalog().create_product(house_red()).await.unwrap();
        let (other, _) = db
            .catalog()
            .create_product(NewProduct::new(
                "Lager",
                Volume::ml(330.0),
                Category::Beer,
                Money::from_minor(12_000),
            ))
            .await
            .unwrap();
        let own = db
            .catalog()
            .add_barcode(&product.id, NewBarcode::new("HR-001"))
            .await
            .unwrap();
        let foreign = db
            .catalog()
            .add_barcode(&other.id, NewBarcode::new("LG-001"))
            .await
            .unwrap();

        let updated = db
            .catalog()
            .update_product(
                &product.id,
                ProductPatch {
                    price: Some(Money::from_minor(48_000)),
                    default_barcode_id: Some(Some(own.id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price.minor(), 48_000);
        assert_eq!(updated.title, "House Red");
        assert_eq!(updated.default_barcode_id.as_deref(), Some(own.id.as_str()));

        let err = db
            .catalog()
            .update_product(
                &product.id,
                ProductPatch {
                    default_barcode_id: Some(Some(foreign.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = db
            .catalog()
            .update_product("missing", ProductPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_clears_optional_fields() {
        let db = db().await;
        let (product, barcodes) = db
            .catalog()
            .create_product(
                house_red()
                    .with_sku("HR-750")
                    .with_cost(Money::from_minor(30_000))
                    .with_barcode("HR-001"),
            )
            .await
            .unwrap();
        db.catalog()
            .update_product(
                &product.id,
                ProductPatch {
                    default_barcode_id: Some(Some(barcodes[0].id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let cleared = db
            .catalog()
            .update_product(
                &product.id,
                ProductPatch {
                    cost: Some(None),
                    sku: Some(None),
                    default_barcode_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.cost, None);
        assert_eq!(cleared.sku, None);
        assert_eq!(cleared.default_barcode_id, None);
        let stored = db.catalog().get_product(&product.id).await.unwrap();
        assert_eq!(stored.sku, None);
        assert_eq!(stored.default_barcode_id, None);
    }

    #[tokio::test]
    async fn test_delete_cascades_barcodes() {
        let db = db().await;
        let (product, _) = db
            .catalog()
            .create_product(house_red().with_barcode("HR-001"))
            .await
            .unwrap();

        db.catalog().delete_product(&product.id).await.unwrap();
        assert!(db.catalog().resolve_barcode("HR-001").await.unwrap().is_none());

        let err = db.catalog().delete_product(&product.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_products_by_title() {
        let db = db().await;
        for title in ["Whisky", "Ale", "Merlot"] {
            db.catalog()
                .create_product(NewProduct::new(
                    title,
                    Volume::litres(1.0),
                    Category::Misc,
                    Money::from_minor(100),
                ))
                .await
                .unwrap();
        }
        let titles: Vec<String> = db
            .catalog()
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, ["Ale", "Merlot", "Whisky"]);
    }

    #[tokio::test]
    async fn test_add_barcode_validation() {
        let db = db().await;
        let (product, _) = db.catalog().create_product(house_red()).await.unwrap();

        let err = db
            .catalog()
            .add_barcode(&product.id, NewBarcode::new("HR 001"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = db
            .catalog()
            .add_barcode("missing", NewBarcode::new("HR-001"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(db.catalog().barcodes_for(&product.id).await.unwrap().is_empty());
    }
}
