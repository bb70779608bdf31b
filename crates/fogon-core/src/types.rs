//! # Domain Types
//!
//! Core domain types used throughout the Fogón settlement pipeline.
//!
//! ## Lifecycle Covered Here
//! ```text
//! Sale (created by the order flow, out of scope)
//!   pending → ready → served ──────────────► closed
//!                        │   settlement pipeline:
//!                        │   validate stock → allocate FIFO →
//!                        │   sequential + access key → compose →
//!                        │   submit to authority → commit
//!                        └── aborted back to `served` on any
//!                            failure before the terminal commit
//! ```
//!
//! ## Storage Convention
//! Monetary fields are raw `*_cents` (i64) and stock fields raw `*_milli`
//! (i64) so the structs derive `sqlx::FromRow` directly; accessor methods
//! return the [`Money`]/[`Quantity`] wrappers for arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (bps).
///
/// 1 basis point = 0.01%; 1500 bps = 15.00%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// Lifecycle status of a sale (comanda).
///
/// The kitchen flow moves `pending → ready → served` (out of scope here);
/// the settlement pipeline owns the only transition to `closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Order taken, kitchen not done.
    Pending,
    /// Kitchen finished, awaiting delivery to the table.
    Ready,
    /// Delivered; eligible for settlement.
    Served,
    /// Settled: paid, stock deducted, fiscal document authorized.
    Closed,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Ready => "ready",
            SaleStatus::Served => "served",
            SaleStatus::Closed => "closed",
        }
    }
}

// =============================================================================
// Kitchen Status
// =============================================================================

/// Per-line kitchen status, independent of the sale's own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum KitchenStatus {
    Queued,
    Preparing,
    Ready,
    Delivered,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a settled sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Check,
}

impl PaymentMethod {
    /// Authority-defined payment code carried on the fiscal document.
    pub fn authority_code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "01",
            PaymentMethod::Check => "02",
            PaymentMethod::Card => "19",
            PaymentMethod::Transfer => "20",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Check => "check",
        }
    }
}

// =============================================================================
// Authority Status
// =============================================================================

/// Outcome of submitting a fiscal document to the tax authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum AuthorityStatus {
    /// Submitted (or about to be); no final verdict yet. Safe to re-query.
    Pending,
    /// Accepted. The document is immutable from this point.
    Authorized,
    /// Declined. The sale stays open; a retry issues a fresh sequential.
    Rejected,
}

impl AuthorityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityStatus::Pending => "pending",
            AuthorityStatus::Authorized => "authorized",
            AuthorityStatus::Rejected => "rejected",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A table order (comanda).
///
/// Invariant: a `closed` sale has exactly one fiscal document and an
/// immutable total. Nothing in this pipeline deletes a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Table the order belongs to.
    pub table_number: i64,
    /// Staff member who opened the order.
    pub staff_id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Set at settlement.
    pub payment_method: Option<PaymentMethod>,
    /// Staff member who settled the sale (nullable in the settlement input).
    pub settled_by: Option<String>,
    /// Ticket number = the fiscal document's sequential, set at close.
    pub ticket_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Whether the settlement pipeline may pick this sale up.
    #[inline]
    pub fn is_settleable(&self) -> bool {
        self.status == SaleStatus::Served
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item on a sale. Dish data is snapshotted at order time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub dish_id: String,
    /// Chosen dish variant, when the menu defines them.
    pub variant_id: Option<String>,
    /// Description at time of order (frozen).
    pub description: String,
    /// Units sold (whole portions).
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub line_total_cents: i64,
    /// Tax code resolved against the tax rule table at settlement.
    pub tax_code: String,
    pub kitchen_status: KitchenStatus,
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }
}

// =============================================================================
// Recipe Entry
// =============================================================================

/// Bill-of-materials row: what one unit of a dish consumes.
///
/// Read-only input to allocation. A `batch_override` pins consumption to a
/// specific lot; pinned allocations never fall back to FIFO.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RecipeEntry {
    pub id: String,
    pub dish_id: String,
    pub variant_id: Option<String>,
    pub item_id: String,
    /// Consumption per unit sold, in milliunits.
    pub quantity_per_unit_milli: i64,
    pub batch_override: Option<String>,
}

impl RecipeEntry {
    #[inline]
    pub fn quantity_per_unit(&self) -> Quantity {
        Quantity::from_milli(self.quantity_per_unit_milli)
    }
}

// =============================================================================
// Batch
// =============================================================================

/// A dated, costed quantity of one inventory item received together.
///
/// Invariant: `quantity_milli` never negative. A drained batch (zero
/// quantity) stays visible for audit but is excluded from allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Batch {
    pub id: String,
    pub item_id: String,
    pub batch_code: String,
    pub quantity_milli: i64,
    pub unit_cost_cents: i64,
    /// FIFO ordering key: oldest batch drains first.
    pub received_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Batch {
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Append-only audit record: one row per batch touched by a deduction.
/// Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub item_id: String,
    pub batch_id: String,
    /// Signed delta in milliunits; deductions are negative.
    pub delta_milli: i64,
    pub reason: String,
    pub sale_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    #[inline]
    pub fn delta(&self) -> Quantity {
        Quantity::from_milli(self.delta_milli)
    }
}

// =============================================================================
// Invoice Sequence
// =============================================================================

/// Gapless sequential counter per (doc type, establishment, emission point).
///
/// `current` is monotonically non-decreasing and never issued twice for the
/// same key. The increment itself is a single conditional UPDATE in
/// fogon-db, never a read-then-write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceSequence {
    pub doc_type: String,
    pub establishment: String,
    pub emission_point: String,
    pub current: i64,
    pub max: i64,
}

// =============================================================================
// Fiscal Document
// =============================================================================

/// The canonical fiscal document created for a settled sale.
///
/// Created once per closed sale; immutable once authorized. `document_text`
/// is the canonical serialized form submitted to the authority;
/// `ticket_text` is the printable representation handed to the cashier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FiscalDocument {
    pub id: String,
    pub sale_id: String,
    pub doc_type: String,
    /// Zero-padded 9-digit sequential.
    pub sequential: String,
    /// 49-character checksum-protected access key.
    pub access_key: String,
    pub status: AuthorityStatus,
    pub authorization_code: Option<String>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub buyer_tax_id: String,
    pub buyer_name: String,
    /// Zero-rated subtotal (exempt lines).
    pub subtotal_zero_cents: i64,
    /// Standard-rated subtotal.
    pub subtotal_standard_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Authority payment-method code (01 cash, 02 check, 19 card, 20 transfer).
    pub payment_code: String,
    pub document_text: String,
    pub ticket_text: String,
    pub emitted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl FiscalDocument {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Authority Log Entry
// =============================================================================

/// Immutable audit trail of every submission/consultation attempt against
/// the tax authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuthorityLogEntry {
    pub id: String,
    pub access_key: String,
    /// "submit" or "query".
    pub request_kind: String,
    /// "pending", "authorized", "rejected" or "error".
    pub outcome: String,
    pub message: Option<String>,
    pub raw_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Tax Rule
// =============================================================================

/// An active tax code/rate row from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TaxRule {
    pub id: String,
    pub code: String,
    pub rate_bps: i64,
    pub description: Option<String>,
    pub is_active: bool,
}

impl TaxRule {
    #[inline]
    pub fn rate(&self) -> TaxRate {
        TaxRate::from_bps(self.rate_bps as u32)
    }
}

// =============================================================================
// Buyer Identity
// =============================================================================

/// Buyer data supplied with a settlement request.
///
/// When omitted, the reserved "final consumer" identity is substituted so a
/// walk-in table never blocks settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerIdentity {
    pub tax_id: String,
    pub legal_name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl BuyerIdentity {
    /// The reserved anonymous retail identity.
    pub fn final_consumer() -> Self {
        BuyerIdentity {
            tax_id: crate::FINAL_CONSUMER_TAX_ID.to_string(),
            legal_name: crate::FINAL_CONSUMER_NAME.to_string(),
            address: None,
            phone: None,
            email: None,
        }
    }

    #[inline]
    pub fn is_final_consumer(&self) -> bool {
        self.tax_id == crate::FINAL_CONSUMER_TAX_ID
    }
}

// =============================================================================
// Company Profile
// =============================================================================

/// Issuer data stamped on every fiscal document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    /// Issuer tax id (RUC), 13 digits.
    pub tax_id: String,
    pub legal_name: String,
    pub trade_name: String,
    pub address: String,
    /// Establishment code, 3 digits.
    pub establishment: String,
    /// Emission point code, 3 digits.
    pub emission_point: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_authority_codes() {
        assert_eq!(PaymentMethod::Cash.authority_code(), "01");
        assert_eq!(PaymentMethod::Check.authority_code(), "02");
        assert_eq!(PaymentMethod::Card.authority_code(), "19");
        assert_eq!(PaymentMethod::Transfer.authority_code(), "20");
    }

    #[test]
    fn test_final_consumer_identity() {
        let buyer = BuyerIdentity::final_consumer();
        assert_eq!(buyer.tax_id, "9999999999999");
        assert!(buyer.is_final_consumer());
    }

    #[test]
    fn test_sale_settleable_only_when_served() {
        let mut sale = Sale {
            id: "s1".into(),
            table_number: 4,
            staff_id: "staff-1".into(),
            status: SaleStatus::Pending,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            payment_method: None,
            settled_by: None,
            ticket_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
        };
        assert!(!sale.is_settleable());
        sale.status = SaleStatus::Served;
        assert!(sale.is_settleable());
        sale.status = SaleStatus::Closed;
        assert!(!sale.is_settleable());
    }

    #[test]
    fn test_tax_rate_percentage() {
        let rate = TaxRate::from_bps(1500);
        assert_eq!(rate.bps(), 1500);
        assert!((rate.percentage() - 15.0).abs() < 0.001);
    }
}
