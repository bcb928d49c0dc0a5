//! # Ledger Rules
//!
//! The pure half of the sale engine: deriving on-hand from movements,
//! the insufficient-stock guard, and planning the three records a sale
//! writes. The database layer runs these inside one transaction.
//!
//! ## Sale Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  scan "HR-001" × 3                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  resolve barcode ──► Product (price 450.00)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  on_hand = Σ change             (same transaction)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  check_stock(on_hand, 3, force) ← guard                                 │
//! │       │                                                                 │
//! │       ├── short and not forced ──► InsufficientStock, nothing written   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  plan_sale(..) ──► SalePlan                                             │
//! │       ├── Sale           units 3, unit_price 450.00                     │
//! │       ├── Movement       change -3, reason sale, reference = sale id    │
//! │       └── EarningsEntry  amount 1350.00                                 │
//! │                                                                         │
//! │  All three commit together or not at all.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::{
    Barcode, EarningsEntry, ManualReason, Movement, MovementReason, NewMovement, Product, Sale,
    SaleReceipt,
};
use crate::validation::{validate_change, validate_note, validate_units};
use crate::ValidationError;

// =============================================================================
// On-hand
// =============================================================================

/// On-hand quantity: the sum of every movement's change. Zero when empty.
///
/// ```rust
/// use cellar_core::ledger::on_hand;
///
/// assert_eq!(on_hand([12, -3, -10]), -1);
/// assert_eq!(on_hand(std::iter::empty()), 0);
/// ```
pub fn on_hand<I>(changes: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    changes.into_iter().sum()
}

/// On-hand over full movement records.
pub fn on_hand_of(movements: &[Movement]) -> i64 {
    on_hand(movements.iter().map(|m| m.change))
}

// =============================================================================
// Stock Guard
// =============================================================================

/// How a permitted sale is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecision {
    /// Normal sale.
    Sale,
    /// Caller forced the sale; audited as `sale_override`.
    Override,
}

impl StockDecision {
    pub fn reason(&self) -> MovementReason {
        match self {
            StockDecision::Sale => MovementReason::Sale,
            StockDecision::Override => MovementReason::SaleOverride,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, StockDecision::Override)
    }
}

/// Recorded stock cannot cover the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub on_hand: i64,
    pub requested: i64,
}

impl Shortfall {
    pub fn into_error(self, product: &Product) -> CoreError {
        CoreError::InsufficientStock {
            product_id: product.id.clone(),
            title: product.title.clone(),
            on_hand: self.on_hand,
            requested: self.requested,
        }
    }
}

/// The insufficient-stock guard.
///
/// ## Rules
/// - `force` always records an override, whatever the stock level
/// - otherwise `on_hand >= requested` sells normally (selling the last
///   bottle needs no force)
/// - otherwise the sale is refused; a negative on-hand always refuses
pub fn check_stock(on_hand: i64, requested: i64, force: bool) -> Result<StockDecision, Shortfall> {
    if force {
        return Ok(StockDecision::Override);
    }

    if on_hand >= requested {
        Ok(StockDecision::Sale)
    } else {
        Err(Shortfall { on_hand, requested })
    }
}

// =============================================================================
// Sale Planning
// =============================================================================

/// Ids for the three records a sale writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleIds {
    pub sale: String,
    pub movement: String,
    pub earnings: String,
}

impl SaleIds {
    pub fn generate() -> Self {
        SaleIds {
            sale: Uuid::new_v4().to_string(),
            movement: Uuid::new_v4().to_string(),
            earnings: Uuid::new_v4().to_string(),
        }
    }
}

/// Everything one sale writes, fully decided before any write happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalePlan {
    pub sale: Sale,
    pub movement: Movement,
    pub earnings: EarningsEntry,
    pub prior_on_hand: i64,
    pub decision: StockDecision,
}

/// Inputs to [`plan_sale`].
#[derive(Debug, Clone)]
pub struct SaleInput<'a> {
    pub product: &'a Product,
    pub barcode: &'a Barcode,
    pub units: i64,
    pub on_hand: i64,
    pub force: bool,
    pub note: Option<&'a str>,
    pub now: DateTime<Utc>,
}

/// Applies the guard and builds the sale, movement and earnings records.
///
/// The unit price is captured from the product as it is right now; later
/// price edits never reach these records.
pub fn plan_sale(input: SaleInput<'_>, ids: SaleIds) -> CoreResult<SalePlan> {
    validate_units(input.units)?;
    if let Some(note) = input.note {
        validate_note(note)?;
    }

    let decision = check_stock(input.on_hand, input.units, input.force)
        .map_err(|shortfall| shortfall.into_error(input.product))?;

    let unit_price = input.product.price;
    let amount = unit_price
        .checked_times_units(input.units)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 0,
            max: i64::MAX,
        })?;

    let sale = Sale {
        id: ids.sale.clone(),
        product_id: input.product.id.clone(),
        units: input.units,
        unit_price,
        barcode_id: Some(input.barcode.id.clone()),
        created_at: input.now,
    };

    let movement = Movement {
        id: ids.movement,
        product_id: input.product.id.clone(),
        change: -input.units,
        reason: decision.reason(),
        reference_id: Some(ids.sale.clone()),
        note: match decision {
            StockDecision::Override => input.note.map(str::to_string),
            StockDecision::Sale => None,
        },
        created_at: input.now,
    };

    let earnings = EarningsEntry {
        id: ids.earnings,
        sale_id: ids.sale,
        product_id: input.product.id.clone(),
        amount,
        created_at: input.now,
    };

    Ok(SalePlan {
        sale,
        movement,
        earnings,
        prior_on_hand: input.on_hand,
        decision,
    })
}

impl SalePlan {
    pub fn new_on_hand(&self) -> i64 {
        self.prior_on_hand - self.sale.units
    }

    pub fn receipt(&self, product: Product, barcode: Barcode) -> SaleReceipt {
        SaleReceipt {
            sale_id: self.sale.id.clone(),
            product,
            barcode,
            units: self.sale.units,
            unit_price: self.sale.unit_price,
            amount: self.earnings.amount,
            new_on_hand: self.new_on_hand(),
            overridden: self.decision.is_override(),
        }
    }
}

// =============================================================================
// Manual Movements
// =============================================================================

/// Builds the movement for a manual stock entry.
///
/// Intake must add stock; an adjustment may go either way but not be zero.
pub fn manual_movement(
    product_id: &str,
    units: i64,
    reason: ManualReason,
    note: Option<&str>,
) -> CoreResult<NewMovement> {
    match reason {
        ManualReason::Intake if units <= 0 => {
            return Err(ValidationError::MustBePositive {
                field: "units".to_string(),
            }
            .into());
        }
        _ => validate_change(units)?,
    }
    if let Some(note) = note {
        validate_note(note)?;
    }

    Ok(NewMovement {
        product_id: product_id.to_string(),
        change: units,
        reason: reason.into(),
        reference_id: None,
        note: note.map(str::to_string),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
