//! # Validation Module
//!
//! Input validation for everything that enters the ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: CLI (clap)                                                   │
//! │  └── Type parsing (numbers, enums)                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repositories (cellar-db)                                     │
//! │  └── THIS MODULE: Business rule validation, before any write           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (barcode code, sku, one earnings entry per sale)           │
//! │  ├── CHECK (change <> 0, units > 0)                                    │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cellar_core::validation::{validate_barcode_code, validate_units};
//!
//! validate_barcode_code("HR-001").unwrap();
//! validate_units(3).unwrap();
//! assert!(validate_units(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{
    Barcode, MovementReason, NewBarcode, NewProduct, Product, ProductPatch, Settings,
    SettingsPatch, Volume,
};
use crate::MAX_SALE_UNITS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_TITLE_LEN: usize = 200;
const MAX_SKU_LEN: usize = 50;
const MAX_CODE_LEN: usize = 64;
const MAX_BARCODE_TYPE_LEN: usize = 32;
const MAX_NOTE_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only letters, digits, hyphens, underscores
///
/// ## Example
/// ```rust
/// use cellar_core::validation::validate_sku;
///
/// assert!(validate_sku("HR-750").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.chars().count() > MAX_SKU_LEN {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: MAX_SKU_LEN,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid_format(
            "sku",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a product title: non-empty, at most 200 characters.
pub fn validate_title(title: &str) -> ValidationResult<()> {
    let title = title.trim();

    if title.is_empty() {
        return Err(ValidationError::required("title"));
    }

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: MAX_TITLE_LEN,
        });
    }

    Ok(())
}

/// Validates a barcode code.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - No whitespace anywhere (scanners never emit it)
///
/// ## Example
/// ```rust
/// use cellar_core::validation::validate_barcode_code;
///
/// assert!(validate_barcode_code("8901234567890").is_ok());
/// assert!(validate_barcode_code("HR 001").is_err());
/// ```
pub fn validate_barcode_code(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::required("code"));
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if code.chars().any(char::is_whitespace) {
        return Err(ValidationError::invalid_format(
            "code",
            "must not contain whitespace",
        ));
    }

    Ok(())
}

pub fn validate_barcode_type(barcode_type: &str) -> ValidationResult<()> {
    if barcode_type.trim().is_empty() {
        return Err(ValidationError::required("type"));
    }

    if barcode_type.chars().count() > MAX_BARCODE_TYPE_LEN {
        return Err(ValidationError::TooLong {
            field: "type".to_string(),
            max: MAX_BARCODE_TYPE_LEN,
        });
    }

    Ok(())
}

pub fn validate_note(note: &str) -> ValidationResult<()> {
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_NOTE_LEN,
        });
    }

    Ok(())
}

/// Validates an ISO 4217 currency code (three uppercase ASCII letters).
///
/// ```rust
/// use cellar_core::validation::validate_currency;
///
/// assert!(validate_currency("INR").is_ok());
/// assert!(validate_currency("inr").is_err());
/// assert!(validate_currency("RUPEE").is_err());
/// ```
pub fn validate_currency(code: &str) -> ValidationResult<()> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::invalid_format(
            "currency",
            "must be a three-letter ISO 4217 code",
        ));
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the units of a single sale.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_SALE_UNITS (9999)
pub fn validate_units(units: i64) -> ValidationResult<()> {
    if units <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "units".to_string(),
        });
    }

    if units > MAX_SALE_UNITS {
        return Err(ValidationError::OutOfRange {
            field: "units".to_string(),
            min: 1,
            max: MAX_SALE_UNITS,
        });
    }

    Ok(())
}

/// A manual movement may go either way but never be zero.
pub fn validate_change(change: i64) -> ValidationResult<()> {
    if change == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "change".to_string(),
        });
    }

    Ok(())
}

/// Validates a price or cost: zero is allowed (free items), negative is not.
///
/// ```rust
/// use cellar_core::money::Money;
/// use cellar_core::validation::validate_price;
///
/// assert!(validate_price("price", Money::from_minor(45_000)).is_ok());
/// assert!(validate_price("price", Money::zero()).is_ok());
/// assert!(validate_price("price", Money::from_minor(-1)).is_err());
/// ```
pub fn validate_price(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

pub fn validate_volume(volume: &Volume) -> ValidationResult<()> {
    if !volume.quantity.is_finite() || volume.quantity <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "volume".to_string(),
        });
    }

    Ok(())
}

pub fn validate_scan_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_SALE_UNITS).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "scanDefaultQty".to_string(),
            min: 1,
            max: MAX_SALE_UNITS,
        });
    }

    Ok(())
}

pub fn validate_low_stock_threshold(threshold: i64) -> ValidationResult<()> {
    if threshold < 0 {
        return Err(ValidationError::OutOfRange {
            field: "lowStockThreshold".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Reasons a movement may be recorded with outside a sale.
///
/// `sale` and `sale_override` rows only come from a sale, which writes the
/// matching sale and earnings rows with them. Intake and returns add stock.
pub fn validate_recorded_reason(reason: MovementReason, change: i64) -> ValidationResult<()> {
    match reason {
        MovementReason::Sale | MovementReason::SaleOverride => Err(ValidationError::invalid_format(
            "reason",
            "sale movements are recorded by selling",
        )),
        MovementReason::Intake | MovementReason::Return if change <= 0 => {
            Err(ValidationError::MustBePositive {
                field: "change".to_string(),
            })
        }
        _ => validate_change(change),
    }
}

// =============================================================================
// Composite Validators
// =============================================================================

pub fn validate_new_barcode(barcode: &NewBarcode) -> ValidationResult<()> {
    validate_barcode_code(&barcode.code)?;
    if let Some(barcode_type) = &barcode.barcode_type {
        validate_barcode_type(barcode_type)?;
    }
    Ok(())
}

/// Validates a product before it is created.
///
/// Barcode codes must also be unique within the request itself.
pub fn validate_new_product(input: &NewProduct) -> ValidationResult<()> {
    validate_title(&input.title)?;
    validate_volume(&input.volume)?;
    validate_price("price", input.price)?;
    if let Some(cost) = input.cost {
        validate_price("cost", cost)?;
    }
    if let Some(sku) = &input.sku {
        validate_sku(sku)?;
    }

    for (i, barcode) in input.barcodes.iter().enumerate() {
        validate_new_barcode(barcode)?;
        if input.barcodes[..i].iter().any(|b| b.code == barcode.code) {
            return Err(ValidationError::invalid_format(
                "barcodes",
                "the same code is listed twice",
            ));
        }
    }

    Ok(())
}

/// Validates a stored product, as found in a snapshot.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_title(&product.title)?;
    validate_volume(&product.volume)?;
    validate_price("price", product.price)?;
    if let Some(cost) = product.cost {
        validate_price("cost", cost)?;
    }
    if let Some(sku) = &product.sku {
        validate_sku(sku)?;
    }
    Ok(())
}

pub fn validate_barcode(barcode: &Barcode) -> ValidationResult<()> {
    validate_barcode_code(&barcode.code)?;
    validate_barcode_type(&barcode.barcode_type)
}

/// Validates a whole settings row, as found in a snapshot.
pub fn validate_settings(settings: &Settings) -> ValidationResult<()> {
    validate_currency(&settings.currency)?;
    validate_scan_quantity(settings.scan_default_qty)?;
    validate_low_stock_threshold(settings.low_stock_threshold)?;
    if settings.data_path.trim().is_empty() {
        return Err(ValidationError::required("dataPath"));
    }
    Ok(())
}

/// Validates only the fields a patch sets.
pub fn validate_product_patch(patch: &ProductPatch) -> ValidationResult<()> {
    if let Some(title) = &patch.title {
        validate_title(title)?;
    }
    if let Some(volume) = &patch.volume {
        validate_volume(volume)?;
    }
    if let Some(price) = patch.price {
        validate_price("price", price)?;
    }
    if let Some(Some(cost)) = patch.cost {
        validate_price("cost", cost)?;
    }
    if let Some(Some(sku)) = &patch.sku {
        validate_sku(sku)?;
    }
    Ok(())
}

pub fn validate_settings_patch(patch: &SettingsPatch) -> ValidationResult<()> {
    if let Some(currency) = &patch.currency {
        validate_currency(currency)?;
    }
    if let Some(qty) = patch.scan_default_qty {
        validate_scan_quantity(qty)?;
    }
    if let Some(threshold) = patch.low_stock_threshold {
        validate_low_stock_threshold(threshold)?;
    }
    if let Some(data_path) = &patch.data_path {
        if data_path.trim().is_empty() {
            return Err(ValidationError::required("dataPath"));
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, NewProduct};

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("HR-750").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("whisky_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("House Red 750ml").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_barcode_code() {
        assert!(validate_barcode_code("HR-001").is_ok());
        assert!(validate_barcode_code("").is_err());
        assert!(validate_barcode_code("a\tb").is_err());
        assert!(validate_barcode_code(&"9".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_units() {
        assert!(validate_units(1).is_ok());
        assert!(validate_units(9_999).is_ok());

        assert!(validate_units(0).is_err());
        assert!(validate_units(-1).is_err());
        assert!(validate_units(10_000).is_err());
    }

    #[test]
    fn test_validate_change() {
        assert!(validate_change(12).is_ok());
        assert!(validate_change(-3).is_ok());
        assert!(matches!(
            validate_change(0),
            Err(ValidationError::MustBeNonZero { .. })
        ));
    }

    #[test]
    fn test_validate_volume() {
        assert!(validate_volume(&Volume::ml(750.0)).is_ok());
        assert!(validate_volume(&Volume::litres(0.0)).is_err());
        assert!(validate_volume(&Volume::ml(f64::NAN)).is_err());
        assert!(validate_volume(&Volume::ml(-1.0)).is_err());
    }

    #[test]
    fn test_validate_new_product_rejects_repeated_code() {
        let input = NewProduct::new("House Red", Volume::ml(750.0), Category::Wine, Money::from_minor(45_000))
            .with_barcode("HR-001")
            .with_barcode("HR-001");
        assert!(validate_new_product(&input).is_err());

        let ok = NewProduct::new("House Red", Volume::ml(750.0), Category::Wine, Money::from_minor(45_000))
            .with_barcode("HR-001")
            .with_barcode("HR-002")
            .with_sku("HR-750");
        assert!(validate_new_product(&ok).is_ok());
    }

    #[test]
    fn test_validate_recorded_reason() {
        assert!(validate_recorded_reason(MovementReason::Intake, 12).is_ok());
        assert!(validate_recorded_reason(MovementReason::Adjustment, -2).is_ok());
        assert!(validate_recorded_reason(MovementReason::Return, 1).is_ok());
        assert!(validate_recorded_reason(MovementReason::Return, -1).is_err());
        assert!(validate_recorded_reason(MovementReason::Adjustment, 0).is_err());
        assert!(validate_recorded_reason(MovementReason::Sale, -3).is_err());
        assert!(validate_recorded_reason(MovementReason::SaleOverride, -3).is_err());
    }

    #[test]
    fn test_validate_settings_patch() {
        let bad = SettingsPatch {
            scan_default_qty: Some(0),
            ..Default::default()
        };
        assert!(validate_settings_patch(&bad).is_err());

        let good = SettingsPatch {
            currency: Some("USD".to_string()),
            low_stock_threshold: Some(0),
            ..Default::default()
        };
        assert!(validate_settings_patch(&good).is_ok());
    }
}
