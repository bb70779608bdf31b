//! # Tax Rule Engine
//!
//! Per-line tax computation against the active tax rule set.
//!
//! ## Availability Over Correctness
//! Settlement must never be blocked by missing tax configuration: when no
//! active rule matches a line's code, the standard code falls back to
//! [`crate::DEFAULT_STANDARD_RATE_BPS`] and exempt codes to zero. The
//! fallback is reported in the result (`used_fallback`) so the orchestrator
//! can log it as the explicit policy branch it is — this module stays pure
//! and does no logging itself.

use crate::money::Money;
use crate::types::{TaxRate, TaxRule};
use crate::{DEFAULT_STANDARD_RATE_BPS, TAX_CODE_EXEMPT, TAX_CODE_STANDARD};

// =============================================================================
// Tax Bracket
// =============================================================================

/// Document-level bracket a line's taxable base accumulates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxBracket {
    /// Rate is zero: base accumulates into the zero-rated subtotal.
    ZeroRated,
    /// Non-zero rate: base accumulates into the standard subtotal.
    Standard,
}

// =============================================================================
// Line Tax
// =============================================================================

/// Result of computing one sale line's tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTax {
    /// `unit_price × quantity − discount`, clamped at zero.
    pub taxable_base: Money,
    /// `taxable_base × rate / 100`, half-up integer rounding.
    pub tax_amount: Money,
    pub rate: TaxRate,
    pub bracket: TaxBracket,
    /// True when no active rule matched and the built-in default was used.
    pub used_fallback: bool,
}

// =============================================================================
// Tax Engine
// =============================================================================

/// Holds the active tax rules and computes per-line taxes.
///
/// Built fresh per settlement from the `tax_rules` table so a configuration
/// change between settlements is always picked up.
#[derive(Debug, Clone)]
pub struct TaxEngine {
    rules: Vec<TaxRule>,
}

impl TaxEngine {
    /// Creates an engine over the given rule set. Inactive rules are
    /// ignored at lookup time.
    pub fn new(rules: Vec<TaxRule>) -> Self {
        TaxEngine { rules }
    }

    /// An engine with no configured rules; every lookup uses the fallback.
    pub fn empty() -> Self {
        TaxEngine { rules: Vec::new() }
    }

    /// Resolves the rate for a tax code.
    ///
    /// A blank code is resolved as [`TAX_CODE_STANDARD`]. Returns
    /// `(rate, used_fallback)`. Missing configuration maps exempt codes to
    /// zero and anything else to the default standard rate.
    pub fn rate_for(&self, tax_code: &str) -> (TaxRate, bool) {
        let tax_code = if tax_code.is_empty() {
            TAX_CODE_STANDARD
        } else {
            tax_code
        };

        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| r.is_active && r.code == tax_code)
        {
            return (rule.rate(), false);
        }

        if tax_code == TAX_CODE_EXEMPT {
            (TaxRate::zero(), true)
        } else {
            (TaxRate::from_bps(DEFAULT_STANDARD_RATE_BPS), true)
        }
    }

    /// Computes the taxable base and tax amount for one line.
    ///
    /// ```rust
    /// use fogon_core::money::Money;
    /// use fogon_core::tax::TaxEngine;
    ///
    /// let engine = TaxEngine::empty();
    /// let line = engine.compute_line(Money::from_cents(1000), 2, Money::zero(), "standard");
    /// assert_eq!(line.taxable_base.cents(), 2000);
    /// assert_eq!(line.tax_amount.cents(), 300); // 15% fallback
    /// ```
    pub fn compute_line(
        &self,
        unit_price: Money,
        quantity: i64,
        discount: Money,
        tax_code: &str,
    ) -> LineTax {
        let (rate, used_fallback) = self.rate_for(tax_code);

        let taxable_base = (unit_price.multiply_quantity(quantity) - discount).max_zero();
        let tax_amount = taxable_base.calculate_tax(rate);

        let bracket = if rate.is_zero() {
            TaxBracket::ZeroRated
        } else {
            TaxBracket::Standard
        };

        LineTax {
            taxable_base,
            tax_amount,
            rate,
            bracket,
            used_fallback,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
