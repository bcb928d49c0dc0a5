//! Flat row types as SQLite returns them, and their conversion into the
//! domain types from `cellar-core`.

use chrono::{DateTime, Utc};

use cellar_core::{
    Barcode, Category, EarningsEntry, Money, Movement, MovementReason, Product, Sale, Settings,
    Theme, Volume, VolumeUnit,
};

pub(crate) const PRODUCT_COLUMNS: &str = "id, title, volume_quantity, volume_unit, category, \
     price_minor, cost_minor, sku, default_barcode_id, created_at, updated_at";

pub(crate) const BARCODE_COLUMNS: &str =
    "id, product_id, code, barcode_type, created_at, updated_at";

pub(crate) const MOVEMENT_COLUMNS: &str =
    "id, product_id, change, reason, reference_id, note, created_at";

pub(crate) const SALE_COLUMNS: &str =
    "id, product_id, units, unit_price_minor, barcode_id, created_at";

pub(crate) const EARNINGS_COLUMNS: &str = "id, sale_id, product_id, amount_minor, created_at";

pub(crate) const SETTINGS_COLUMNS: &str = "id, currency, scan_default_qty, low_stock_threshold, \
     data_path, backup_path, theme, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: String,
    title: String,
    volume_quantity: f64,
    volume_unit: VolumeUnit,
    category: Category,
    price_minor: i64,
    cost_minor: Option<i64>,
    sku: Option<String>,
    default_barcode_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            title: row.title,
            volume: Volume {
                quantity: row.volume_quantity,
                unit: row.volume_unit,
            },
            category: row.category,
            price: Money::from_minor(row.price_minor),
            cost: row.cost_minor.map(Money::from_minor),
            sku: row.sku,
            default_barcode_id: row.default_barcode_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BarcodeRow {
    id: String,
    product_id: String,
    code: String,
    barcode_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BarcodeRow> for Barcode {
    fn from(row: BarcodeRow) -> Self {
        Barcode {
            id: row.id,
            product_id: row.product_id,
            code: row.code,
            barcode_type: row.barcode_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MovementRow {
    id: String,
    product_id: String,
    change: i64,
    reason: MovementReason,
    reference_id: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<MovementRow> for Movement {
    fn from(row: MovementRow) -> Self {
        Movement {
            id: row.id,
            product_id: row.product_id,
            change: row.change,
            reason: row.reason,
            reference_id: row.reference_id,
            note: row.note,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SaleRow {
    id: String,
    product_id: String,
    units: i64,
    unit_price_minor: i64,
    barcode_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Sale {
            id: row.id,
            product_id: row.product_id,
            units: row.units,
            unit_price: Money::from_minor(row.unit_price_minor),
            barcode_id: row.barcode_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EarningsRow {
    id: String,
    sale_id: String,
    product_id: String,
    amount_minor: i64,
    created_at: DateTime<Utc>,
}

impl From<EarningsRow> for EarningsEntry {
    fn from(row: EarningsRow) -> Self {
        EarningsEntry {
            id: row.id,
            sale_id: row.sale_id,
            product_id: row.product_id,
            amount: Money::from_minor(row.amount_minor),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SettingsRow {
    id: String,
    currency: String,
    scan_default_qty: i64,
    low_stock_threshold: i64,
    data_path: String,
    backup_path: Option<String>,
    theme: Theme,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SettingsRow> for Settings {
    fn from(row: SettingsRow) -> Self {
        Settings {
            id: row.id,
            currency: row.currency,
            scan_default_qty: row.scan_default_qty,
            low_stock_threshold: row.low_stock_threshold,
            data_path: row.data_path,
            backup_path: row.backup_path,
            theme: row.theme,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
