//! # Quantity Module
//!
//! Stock quantities in integer milliunits (thousandths of the item's
//! stocking unit). A recipe that consumes 0.150 kg of beef per portion is
//! stored as 150 milliunits — the same integer-arithmetic discipline the
//! [`crate::money`] module applies to currency, applied to stock.
//!
//! Batch balances, recipe requirements, shortfalls and movement deltas all
//! use this type, so FIFO allocation never touches a float.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// =============================================================================
// Quantity Type
// =============================================================================

/// A stock quantity in integer milliunits.
///
/// Signed so that stock movements can carry negative deltas (deductions),
/// but batch balances are guarded to never go below zero (the guard is the
/// conditional UPDATE in the batch ledger, see fogon-db).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from milliunits.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Creates a quantity from whole units.
    ///
    /// ```rust
    /// use fogon_core::quantity::Quantity;
    ///
    /// assert_eq!(Quantity::from_units(3).milli(), 3000);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * 1000)
    }

    /// Returns the value in milliunits.
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    /// Zero quantity.
    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies a per-unit requirement by the number of units sold.
    ///
    /// This is how a recipe entry (quantity per portion) becomes a total
    /// requirement for a sale line.
    #[inline]
    pub const fn multiply_units(&self, units: i64) -> Self {
        Quantity(self.0 * units)
    }

    /// Returns the smaller of two quantities (greedy FIFO take).
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Quantity(self.0.min(other.0))
    }

    /// Subtraction clamped at zero, used for shortfall math:
    /// `required.saturating_sub(available)` is zero when stock suffices.
    #[inline]
    pub const fn saturating_sub(&self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 {
            Quantity(0)
        } else {
            Quantity(diff)
        }
    }

    /// Negated value, for deduction movement deltas.
    #[inline]
    pub const fn negated(&self) -> Self {
        Quantity(-self.0)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display in units with three decimals: `2.500`.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:03}", sign, (self.0 / 1000).abs(), (self.0 % 1000).abs())
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
