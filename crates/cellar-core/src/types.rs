//! # Domain Types
//!
//! Core domain types used throughout Cellar POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌─────────────────┐                          │
//! │  │    Product      │───────│    Barcode      │  code globally unique    │
//! │  │  id, title      │       │  id, code, type │                          │
//! │  │  volume, price  │       └─────────────────┘                          │
//! │  └────────┬────────┘                                                    │
//! │           │ 1                                                           │
//! │           │ *                                                           │
//! │  ┌────────┴────────┐       ┌─────────────────┐ 1   1 ┌───────────────┐ │
//! │  │    Movement     │       │      Sale       │───────│ EarningsEntry │ │
//! │  │  change (±)     │◄──────│  units          │       │  amount       │ │
//! │  │  reason         │ ref   │  unit_price     │       └───────────────┘ │
//! │  └─────────────────┘       └─────────────────┘                          │
//! │                                                                         │
//! │  Movement, Sale, EarningsEntry are write-once.                          │
//! │  On-hand = Σ Movement.change, never stored.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::DEFAULT_BARCODE_TYPE;

// =============================================================================
// Volume
// =============================================================================

/// Unit a bottle or can size is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum VolumeUnit {
    Ml,
    L,
}

/// Container size as one `(quantity, unit)` pair.
///
/// The unit is always stored next to the quantity; it is never inferred
/// from which column happens to be populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Volume {
    pub quantity: f64,
    pub unit: VolumeUnit,
}

impl Volume {
    pub const fn ml(quantity: f64) -> Self {
        Volume {
            quantity,
            unit: VolumeUnit::Ml,
        }
    }

    pub const fn litres(quantity: f64) -> Self {
        Volume {
            quantity,
            unit: VolumeUnit::L,
        }
    }

    /// The same size expressed in millilitres.
    pub fn in_ml(&self) -> f64 {
        match self.unit {
            VolumeUnit::Ml => self.quantity,
            VolumeUnit::L => self.quantity * 1000.0,
        }
    }
}

// =============================================================================
// Category
// =============================================================================

/// Shelf category of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum Category {
    Wine,
    Beer,
    Spirits,
    NonLiquor,
    Misc,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Wine,
        Category::Beer,
        Category::Spirits,
        Category::NonLiquor,
        Category::Misc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Wine => "wine",
            Category::Beer => "beer",
            Category::Spirits => "spirits",
            Category::NonLiquor => "non-liquor",
            Category::Misc => "misc",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = crate::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| crate::ValidationError::NotAllowed {
                field: "category".to_string(),
                allowed: Category::ALL.iter().map(|c| c.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to the cashier.
    pub title: String,

    pub volume: Volume,

    pub category: Category,

    /// Current unit sale price. Sales capture it; later edits do not
    /// touch past sales.
    pub price: Money,

    /// Purchase cost, for margin reporting.
    pub cost: Option<Money>,

    /// Stock Keeping Unit, unique when present.
    pub sku: Option<String>,

    /// Preferred barcode; always one of this product's own barcodes.
    pub default_barcode_id: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub title: String,
    pub volume: Volume,
    pub category: Category,
    pub price: Money,
    #[serde(default)]
    pub cost: Option<Money>,
    #[serde(default)]
    pub sku: Option<String>,
    /// Barcodes registered together with the product.
    #[serde(default)]
    pub barcodes: Vec<NewBarcode>,
}

impl NewProduct {
    pub fn new(title: impl Into<String>, volume: Volume, category: Category, price: Money) -> Self {
        NewProduct {
            title: title.into(),
            volume,
            category,
            price,
            cost: None,
            sku: None,
            barcodes: Vec::new(),
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_cost(mut self, cost: Money) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_barcode(mut self, code: impl Into<String>) -> Self {
        self.barcodes.push(NewBarcode::new(code));
        self
    }
}

/// Partial update of a product. `None` keeps the stored value.
///
/// Optional fields take `Some(None)` to clear them; in JSON an explicit
/// `null` clears and an absent key keeps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub volume: Option<Volume>,
    pub category: Option<Category>,
    pub price: Option<Money>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub cost: Option<Option<Money>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub sku: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub default_barcode_id: Option<Option<String>>,
}

/// Present key (even `null`) → `Some(..)`; absent key falls back to the
/// field default of `None`.
fn clearable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.volume.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.cost.is_none()
            && self.sku.is_none()
            && self.default_barcode_id.is_none()
    }

    /// Returns `product` with the patch applied and `updated_at` moved to `now`.
    pub fn apply(&self, product: &Product, now: DateTime<Utc>) -> Product {
        Product {
            id: product.id.clone(),
            title: self.title.clone().unwrap_or_else(|| product.title.clone()),
            volume: self.volume.unwrap_or(product.volume),
            category: self.category.unwrap_or(product.category),
            price: self.price.unwrap_or(product.price),
            cost: self.cost.unwrap_or(product.cost),
            sku: self.sku.clone().unwrap_or_else(|| product.sku.clone()),
            default_barcode_id: self
                .default_barcode_id
                .clone()
                .unwrap_or_else(|| product.default_barcode_id.clone()),
            created_at: product.created_at,
            updated_at: now,
        }
    }
}

// =============================================================================
// Barcode
// =============================================================================

/// A scannable code owned by exactly one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Barcode {
    pub id: String,
    pub product_id: String,
    /// Globally unique across the store.
    pub code: String,
    /// Free-form tag (`ean13`, `custom`, ...).
    #[serde(rename = "type")]
    pub barcode_type: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Barcode to register.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBarcode {
    pub code: String,
    #[serde(rename = "type", default)]
    pub barcode_type: Option<String>,
}

impl NewBarcode {
    pub fn new(code: impl Into<String>) -> Self {
        NewBarcode {
            code: code.into(),
            barcode_type: None,
        }
    }

    /// The type tag, defaulting to `custom`.
    pub fn type_or_default(&self) -> &str {
        self.barcode_type.as_deref().unwrap_or(DEFAULT_BARCODE_TYPE)
    }
}

/// Result of a successful barcode lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedBarcode {
    pub product: Product,
    pub barcode: Barcode,
}

// =============================================================================
// Movement Ledger
// =============================================================================

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MovementReason {
    /// Goods received.
    Intake,
    /// Sold with enough recorded stock.
    Sale,
    /// Sold despite insufficient recorded stock, by explicit choice.
    SaleOverride,
    /// Stock count correction, either sign.
    Adjustment,
    /// Customer return.
    Return,
}

/// Reasons accepted from the manual stock entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ManualReason {
    Intake,
    Adjustment,
}

impl From<ManualReason> for MovementReason {
    fn from(reason: ManualReason) -> Self {
        match reason {
            ManualReason::Intake => MovementReason::Intake,
            ManualReason::Adjustment => MovementReason::Adjustment,
        }
    }
}

/// One append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Movement {
    pub id: String,
    pub product_id: String,
    /// Positive = stock in, negative = stock out. Never zero.
    pub change: i64,
    pub reason: MovementReason,
    /// Sale id for sale movements.
    pub reference_id: Option<String>,
    /// Free text, e.g. why an override was accepted.
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A movement to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub product_id: String,
    pub change: i64,
    pub reason: MovementReason,
    pub reference_id: Option<String>,
    pub note: Option<String>,
}

impl NewMovement {
    pub fn new(product_id: impl Into<String>, change: i64, reason: MovementReason) -> Self {
        NewMovement {
            product_id: product_id.into(),
            change,
            reason,
            reference_id: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// =============================================================================
// Sale & Earnings
// =============================================================================

/// A recorded sale of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub product_id: String,
    pub units: i64,
    /// Price per unit at the moment of sale (frozen).
    pub unit_price: Money,
    /// Barcode that was scanned.
    pub barcode_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Revenue booked for a sale. One per sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EarningsEntry {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// units × unit_price
    pub amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// What the cashier asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleRequest {
    pub code: String,
    /// `None` uses the default scan quantity from settings.
    #[serde(default)]
    pub units: Option<i64>,
    /// Sell even if recorded stock is short.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub note: Option<String>,
}

impl SaleRequest {
    /// A plain scan: default quantity, no override.
    pub fn scan(code: impl Into<String>) -> Self {
        SaleRequest {
            code: code.into(),
            units: None,
            force: false,
            note: None,
        }
    }

    pub fn units(mut self, units: i64) -> Self {
        self.units = Some(units);
        self
    }

    /// Marks the request as an override.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Outcome of a committed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleReceipt {
    pub sale_id: String,
    pub product: Product,
    pub barcode: Barcode,
    pub units: i64,
    pub unit_price: Money,
    pub amount: Money,
    /// On-hand after this sale (prior on-hand − units).
    pub new_on_hand: i64,
    /// True when recorded as `sale_override`.
    pub overridden: bool,
}

// =============================================================================
// Inventory & Reports
// =============================================================================

/// A product with its barcodes and derived stock level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventoryItem {
    pub product: Product,
    pub barcodes: Vec<Barcode>,
    pub on_hand: i64,
    #[ts(as = "Option<String>")]
    pub last_movement_at: Option<DateTime<Utc>>,
}

/// Per-product sales rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductSales {
    pub product_id: String,
    pub title: String,
    pub total_units: i64,
    pub total_revenue: Money,
}

/// Inclusive time window; an open end means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// No bounds at all.
    pub fn all() -> Self {
        DateRange::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        DateRange {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        DateRange {
            from: Some(from),
            to: None,
        }
    }

    pub fn until(to: DateTime<Utc>) -> Self {
        DateRange {
            from: None,
            to: Some(to),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Store-wide settings singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Settings {
    pub id: String,
    /// ISO 4217 code.
    pub currency: String,
    /// Units sold by a scan that does not specify a quantity.
    pub scan_default_qty: i64,
    pub low_stock_threshold: i64,
    pub data_path: String,
    /// Where backups go when no target is given.
    pub backup_path: Option<String>,
    pub theme: Theme,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    /// First-start defaults.
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Settings {
            id: crate::SETTINGS_ID.to_string(),
            currency: crate::DEFAULT_CURRENCY.to_string(),
            scan_default_qty: crate::DEFAULT_SCAN_QUANTITY,
            low_stock_threshold: crate::DEFAULT_LOW_STOCK_THRESHOLD,
            data_path: crate::DEFAULT_DATA_PATH.to_string(),
            backup_path: None,
            theme: Theme::Light,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial settings update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SettingsPatch {
    pub currency: Option<String>,
    pub scan_default_qty: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub data_path: Option<String>,
    /// `Some(None)` clears it, falling back to the default backup directory.
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<Option<String>>,
    pub theme: Option<Theme>,
}

impl SettingsPatch {
    pub fn apply(&self, settings: &Settings, now: DateTime<Utc>) -> Settings {
        Settings {
            id: settings.id.clone(),
            currency: self
                .currency
                .clone()
                .unwrap_or_else(|| settings.currency.clone()),
            scan_default_qty: self.scan_default_qty.unwrap_or(settings.scan_default_qty),
            low_stock_threshold: self
                .low_stock_threshold
                .unwrap_or(settings.low_stock_threshold),
            data_path: self
                .data_path
                .clone()
                .unwrap_or_else(|| settings.data_path.clone()),
            backup_path: self
                .backup_path
                .clone()
                .unwrap_or_else(|| settings.backup_path.clone()),
            theme: self.theme.unwrap_or(settings.theme),
            created_at: settings.created_at,
            updated_at: now,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
