//! Snapshot document for backing up and restoring the whole store.
//!
//! A snapshot is a versioned JSON document holding every table. Rows are
//! written in a fixed order (by creation time, then id) so the same store
//! always exports the same bytes.
//!
//! Decoding never touches the store: [`StoreSnapshot::from_bytes`] parses and
//! [`StoreSnapshot::validate`] checks integrity, and only a snapshot that
//! passes both is handed to the database layer for replacement.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Barcode, EarningsEntry, Movement, MovementReason, Product, Sale, Settings};
use crate::validation::{validate_barcode, validate_note, validate_product, validate_settings};

/// Version of the snapshot document layout.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// The full store at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Document layout version
    pub format_version: u32,
    /// Latest applied database migration when exported
    pub schema_version: i64,
    pub exported_at: DateTime<Utc>,
    pub products: Vec<Product>,
    pub barcodes: Vec<Barcode>,
    pub movements: Vec<Movement>,
    pub sales: Vec<Sale>,
    pub earnings: Vec<EarningsEntry>,
    /// Absent only in snapshots of a store that never started
    pub settings: Option<Settings>,
}

impl StoreSnapshot {
    /// An empty snapshot.
    pub fn new(schema_version: i64, exported_at: DateTime<Utc>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            schema_version,
            exported_at,
            products: Vec::new(),
            barcodes: Vec::new(),
            movements: Vec::new(),
            sales: Vec::new(),
            earnings: Vec::new(),
            settings: None,
        }
    }

    /// Total rows across all tables (settings included).
    pub fn row_count(&self) -> usize {
        self.products.len()
            + self.barcodes.len()
            + self.movements.len()
            + self.sales.len()
            + self.earnings.len()
            + usize::from(self.settings.is_some())
    }

    /// Serialize to pretty JSON bytes.
    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| CoreError::invalid_snapshot(e.to_string()))
    }

    /// Parse JSON bytes and check the format version.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        let snapshot: Self = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::invalid_snapshot(format!("not a snapshot document: {e}")))?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(CoreError::invalid_snapshot(format!(
                "unsupported snapshot format version: {} (expected {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }

    /// Checks that this snapshot can be loaded into a store whose newest
    /// migration is `max_schema_version`.
    ///
    /// ## Checks
    /// - schema version not newer than this build
    /// - ids unique within every table
    /// - barcode codes and SKUs unique
    /// - every row's fields pass the same validators as direct writes
    /// - every reference (barcode, movement, sale, earnings, default barcode)
    ///   points at an existing row of the right product
    /// - movement changes non-zero, sale units positive, prices non-negative
    /// - exactly one sale movement per sale, with change = -units
    /// - exactly one earnings entry per sale, with amount = units × price
    pub fn validate(&self, max_schema_version: i64) -> CoreResult<()> {
        if self.schema_version > max_schema_version {
            return Err(CoreError::invalid_snapshot(format!(
                "snapshot schema version {} is newer than this build ({})",
                self.schema_version, max_schema_version
            )));
        }

        let products = unique_ids("products", self.products.iter().map(|p| p.id.as_str()))?;
        let mut skus = HashSet::new();
        for product in &self.products {
            validate_product(product)
                .map_err(|e| invalid_row("product", &product.id, &e.to_string()))?;
            if let Some(sku) = &product.sku {
                if !skus.insert(sku.as_str()) {
                    return Err(CoreError::invalid_snapshot(format!("duplicate sku '{sku}'")));
                }
            }
        }

        unique_ids("barcodes", self.barcodes.iter().map(|b| b.id.as_str()))?;
        let mut barcode_owner: HashMap<&str, &str> = HashMap::new();
        let mut codes = HashSet::new();
        for barcode in &self.barcodes {
            validate_barcode(barcode)
                .map_err(|e| invalid_row("barcode", &barcode.id, &e.to_string()))?;
            if !products.contains(barcode.product_id.as_str()) {
                return Err(dangling("barcode", &barcode.id, "product", &barcode.product_id));
            }
            if !codes.insert(barcode.code.as_str()) {
                return Err(CoreError::invalid_snapshot(format!(
                    "duplicate barcode code '{}'",
                    barcode.code
                )));
            }
            barcode_owner.insert(barcode.id.as_str(), barcode.product_id.as_str());
        }

        for product in &self.products {
            if let Some(default_id) = &product.default_barcode_id {
                if barcode_owner.get(default_id.as_str()) != Some(&product.id.as_str()) {
                    return Err(invalid_row(
                        "product",
                        &product.id,
                        "default barcode does not belong to it",
                    ));
                }
            }
        }

        unique_ids("sales", self.sales.iter().map(|s| s.id.as_str()))?;
        let mut sale_by_id = HashMap::new();
        for sale in &self.sales {
            if !products.contains(sale.product_id.as_str()) {
                return Err(dangling("sale", &sale.id, "product", &sale.product_id));
            }
            if sale.units <= 0 {
                return Err(invalid_row("sale", &sale.id, "units must be positive"));
            }
            if sale.unit_price.is_negative() {
                return Err(invalid_row("sale", &sale.id, "negative unit price"));
            }
            if let Some(barcode_id) = &sale.barcode_id {
                if !barcode_owner.contains_key(barcode_id.as_str()) {
                    return Err(dangling("sale", &sale.id, "barcode", barcode_id));
                }
            }
            sale_by_id.insert(sale.id.as_str(), sale);
        }

        unique_ids("movements", self.movements.iter().map(|m| m.id.as_str()))?;
        let mut moved = HashSet::new();
        for movement in &self.movements {
            if !products.contains(movement.product_id.as_str()) {
                return Err(dangling("movement", &movement.id, "product", &movement.product_id));
            }
            if movement.change == 0 {
                return Err(invalid_row("movement", &movement.id, "zero change"));
            }
            if let Some(note) = &movement.note {
                validate_note(note)
                    .map_err(|e| invalid_row("movement", &movement.id, &e.to_string()))?;
            }
            if !matches!(movement.reason, MovementReason::Sale | MovementReason::SaleOverride) {
                continue;
            }
            let sale = movement
                .reference_id
                .as_deref()
                .and_then(|id| sale_by_id.get(id));
            let Some(sale) = sale else {
                return Err(invalid_row(
                    "movement",
                    &movement.id,
                    "sale movement without its sale",
                ));
            };
            if sale.product_id != movement.product_id || movement.change != -sale.units {
                return Err(invalid_row("movement", &movement.id, "does not match its sale"));
            }
            if !moved.insert(sale.id.as_str()) {
                return Err(CoreError::invalid_snapshot(format!(
                    "sale {} has more than one sale movement",
                    sale.id
                )));
            }
        }
        if moved.len() != sale_by_id.len() {
            return Err(CoreError::invalid_snapshot(
                "every sale needs exactly one sale movement",
            ));
        }

        unique_ids("earnings", self.earnings.iter().map(|e| e.id.as_str()))?;
        let mut booked = HashSet::new();
        for entry in &self.earnings {
            let Some(sale) = sale_by_id.get(entry.sale_id.as_str()) else {
                return Err(dangling("earnings entry", &entry.id, "sale", &entry.sale_id));
            };
            if !booked.insert(entry.sale_id.as_str()) {
                return Err(CoreError::invalid_snapshot(format!(
                    "sale {} has more than one earnings entry",
                    entry.sale_id
                )));
            }
            if entry.product_id != sale.product_id {
                return Err(invalid_row("earnings entry", &entry.id, "product differs from its sale"));
            }
            if sale.unit_price.checked_times_units(sale.units) != Some(entry.amount) {
                return Err(invalid_row("earnings entry", &entry.id, "amount is not units × price"));
            }
        }
        if booked.len() != sale_by_id.len() {
            return Err(CoreError::invalid_snapshot(
                "every sale needs exactly one earnings entry",
            ));
        }

        if let Some(settings) = &self.settings {
            if settings.id != crate::SETTINGS_ID {
                return Err(CoreError::invalid_snapshot(format!(
                    "unexpected settings id '{}'",
                    settings.id
                )));
            }
            validate_settings(settings)
                .map_err(|e| CoreError::invalid_snapshot(format!("settings: {e}")))?;
        }

        Ok(())
    }
}

fn unique_ids<'a>(table: &str, ids: impl Iterator<Item = &'a str>) -> CoreResult<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CoreError::invalid_snapshot(format!("duplicate id '{id}' in {table}")));
        }
    }
    Ok(seen)
}

fn dangling(kind: &str, id: &str, target: &str, target_id: &str) -> CoreError {
    CoreError::invalid_snapshot(format!("{kind} {id} references missing {target} {target_id}"))
}

fn invalid_row(kind: &str, id: &str, reason: &str) -> CoreError {
    CoreError::invalid_snapshot(format!("{kind} {id}: {reason}"))
}

/// Summary of a snapshot, for logs and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub schema_version: i64,
    pub exported_at: DateTime<Utc>,
    pub product_count: usize,
    pub movement_count: usize,
    pub sale_count: usize,
}

impl From<&StoreSnapshot> for SnapshotMetadata {
    fn from(snapshot: &StoreSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            schema_version: snapshot.schema_version,
            exported_at: snapshot.exported_at,
            product_count: snapshot.products.len(),
            movement_count: snapshot.movements.len(),
            sale_count: snapshot.sales.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{Category, MovementReason, Volume};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn sample() -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::new(1, at());
        snapshot.products.push(Product {
            id: "p-1".to_string(),
            title: "House Red".to_string(),
            volume: Volume::ml(750.0),
            category: Category::Wine,
            price: Money::from_minor(45_000),
            cost: None,
            sku: Some("HR-750".to_string()),
            default_barcode_id: Some("b-1".to_string()),
            created_at: at(),
            updated_at: at(),
        });
        snapshot.barcodes.push(Barcode {
            id: "b-1".to_string(),
            product_id: "p-1".to_string(),
            code: "HR-001".to_string(),
            barcode_type: "custom".to_string(),
            created_at: at(),
            updated_at: at(),
        });
        snapshot.movements.push(Movement {
            id: "m-1".to_string(),
            product_id: "p-1".to_string(),
            change: 12,
            reason: MovementReason::Intake,
            reference_id: None,
            note: None,
            created_at: at(),
        });
        snapshot.sales.push(Sale {
            id: "s-1".to_string(),
            product_id: "p-1".to_string(),
            units: 3,
            unit_price: Money::from_minor(45_000),
            barcode_id: Some("b-1".to_string()),
            created_at: at(),
        });
        snapshot.movements.push(Movement {
            id: "m-2".to_string(),
            product_id: "p-1".to_string(),
            change: -3,
            reason: MovementReason::Sale,
            reference_id: Some("s-1".to_string()),
            note: None,
            created_at: at(),
        });
        snapshot.earnings.push(EarningsEntry {
            id: "e-1".to_string(),
            sale_id: "s-1".to_string(),
            product_id: "p-1".to_string(),
            amount: Money::from_minor(135_000),
            created_at: at(),
        });
        snapshot.settings = Some(Settings::defaults(at()));
        snapshot
    }

    #[test]
    fn valid_snapshot_passes_and_survives_bytes() {
        let snapshot = sample();
        snapshot.validate(1).unwrap();
        assert_eq!(snapshot.row_count(), 7);

        let bytes = snapshot.to_bytes().unwrap();
        let back = StoreSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn garbage_is_invalid() {
        let err = StoreSnapshot::from_bytes(b"not json").unwrap_err();
        assert!(matches!(err, CoreError::InvalidSnapshot(_)));
    }

    #[test]
    fn unknown_format_version_is_invalid() {
        let mut snapshot = sample();
        snapshot.format_version = 99;
        let bytes = snapshot.to_bytes().unwrap();
        assert!(StoreSnapshot::from_bytes(&bytes).is_err());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let snapshot = sample();
        assert!(snapshot.validate(0).is_err());
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let mut snapshot = sample();
        let mut twin = snapshot.barcodes[0].clone();
        twin.id = "b-2".to_string();
        snapshot.barcodes.push(twin);
        let err = snapshot.validate(1).unwrap_err();
        assert!(err.to_string().contains("duplicate barcode code"));
    }

    #[test]
    fn dangling_references_are_rejected() {
        let mut snapshot = sample();
        snapshot.movements[0].product_id = "ghost".to_string();
        assert!(snapshot.validate(1).is_err());

        let mut snapshot = sample();
        snapshot.products[0].default_barcode_id = Some("b-9".to_string());
        assert!(snapshot.validate(1).is_err());
    }

    #[test]
    fn earnings_must_match_sales_one_to_one() {
        let mut snapshot = sample();
        snapshot.earnings.clear();
        assert!(snapshot.validate(1).is_err());

        let mut snapshot = sample();
        let mut extra = snapshot.earnings[0].clone();
        extra.id = "e-2".to_string();
        snapshot.earnings.push(extra);
        assert!(snapshot.validate(1).is_err());

        let mut snapshot = sample();
        snapshot.earnings[0].amount = Money::from_minor(1);
        assert!(snapshot.validate(1).is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut snapshot = sample();
        snapshot.products[0].volume = Volume::ml(-1.0);
        assert!(matches!(snapshot.validate(1), Err(CoreError::InvalidSnapshot(_))));

        let mut snapshot = sample();
        snapshot.barcodes[0].code = "HR 001".to_string();
        assert!(snapshot.validate(1).is_err());

        let mut snapshot = sample();
        if let Some(settings) = snapshot.settings.as_mut() {
            settings.scan_default_qty = 0;
        }
        assert!(snapshot.validate(1).is_err());

        let mut snapshot = sample();
        if let Some(settings) = snapshot.settings.as_mut() {
            settings.currency = "not a currency".to_string();
        }
        let err = snapshot.validate(1).unwrap_err();
        assert!(err.to_string().contains("currency"));
    }

    #[test]
    fn sale_movements_must_match_their_sale() {
        let mut snapshot = sample();
        snapshot.movements[1].reference_id = Some("ghost-sale".to_string());
        assert!(snapshot.validate(1).is_err());

        let mut snapshot = sample();
        snapshot.movements[1].change = -50;
        assert!(snapshot.validate(1).is_err());

        let mut snapshot = sample();
        snapshot.movements.pop();
        let err = snapshot.validate(1).unwrap_err();
        assert!(err.to_string().contains("sale movement"));

        let mut snapshot = sample();
        let mut twin = snapshot.movements[1].clone();
        twin.id = "m-3".to_string();
        snapshot.movements.push(twin);
        assert!(snapshot.validate(1).is_err());
    }

    #[test]
    fn metadata_counts_rows() {
        let meta = SnapshotMetadata::from(&sample());
        assert_eq!(meta.product_count, 1);
        assert_eq!(meta.movement_count, 2);
        assert_eq!(meta.sale_count, 1);
    }
}
