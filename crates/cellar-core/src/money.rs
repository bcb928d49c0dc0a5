//! # Money Module
//!
//! The `Money` type: monetary values in integer minor units.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  Earnings are summed over thousands of sales; float drift would make    │
//! │  totalEarnings disagree with the sum of the receipts.                   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (paise, cents)                       │
//! │    price 45000 × 3 units = 135000, exactly                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cellar_core::money::Money;
//!
//! let price = Money::from_minor(45_000); // 450.00
//! let amount = price.times_units(3);
//! assert_eq!(amount.minor(), 135_000);
//! assert_eq!(amount.to_string(), "1350.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: differences and corrections can be negative
/// - **No currency inside**: the store has one currency, held in Settings
/// - **Transparent serde**: serializes as a bare integer
///
/// ## Where Money Flows
/// ```text
/// Product.price ──► Sale.unit_price (captured) ──► EarningsEntry.amount
///                                                        │
///                                                        ▼
///                                        totalEarnings / salesByProduct
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from major and minor parts.
    ///
    /// ```rust
    /// use cellar_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(450, 0).minor(), 45_000);
    /// assert_eq!(Money::from_major_minor(-5, 50).minor(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Line amount for `units` sold at this unit price.
    ///
    /// ## User Workflow
    /// ```text
    /// House Red @ 450.00, scan × 3
    ///      │
    ///      ▼
    /// times_units(3) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// EarningsEntry.amount = 1350.00
    /// ```
    #[inline]
    pub const fn times_units(&self, units: i64) -> Self {
        Money(self.0 * units)
    }

    /// Like [`Money::times_units`] but `None` on overflow.
    pub fn checked_times_units(&self, units: i64) -> Option<Self> {
        self.0.checked_mul(units).map(Money)
    }

    /// Formats with a currency code prefix, e.g. `INR 1350.00`.
    pub fn format_with(&self, currency: &str) -> String {
        format!("{} {}", currency, self)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering with two fraction digits, no symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(1099).to_string(), "10.99");
        assert_eq!(Money::from_minor(500).to_string(), "5.00");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_format_with_currency() {
        assert_eq!(Money::from_minor(135_000).format_with("INR"), "INR 1350.00");
    }

    #[test]
    fn test_times_units() {
        let price = Money::from_minor(299);
        assert_eq!(price.times_units(3).minor(), 897);
        assert_eq!(price.times_units(0), Money::zero());
    }

    #[test]
    fn test_checked_times_units_overflow() {
        assert!(Money::from_minor(i64::MAX).checked_times_units(2).is_none());
        assert_eq!(
            Money::from_minor(10).checked_times_units(4),
            Some(Money::from_minor(40))
        );
    }

    #[test]
    fn test_sum() {
        let amounts = vec![Money::from_minor(100), Money::from_minor(250), Money::from_minor(-50)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.minor(), 300);

        let empty: Vec<Money> = Vec::new();
        assert!(empty.into_iter().sum::<Money>().is_zero());
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&Money::from_minor(45_000)).unwrap();
        assert_eq!(json, "45000");
        let back: Money = serde_json::from_str("45000").unwrap();
        assert_eq!(back.minor(), 45_000);
    }
}
