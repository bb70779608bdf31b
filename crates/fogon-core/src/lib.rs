//! # fogon-core: Pure Settlement Logic for Fogón
//!
//! This crate is the **heart** of the Fogón settlement pipeline. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Fogón Settlement Pipeline                       │
//! │                                                                     │
//! │  fogon-fiscal (orchestrator, authority gateway, signer)             │
//! │        │                                                            │
//! │        ▼                                                            │
//! │  ★ fogon-core (THIS CRATE) ★                                        │
//! │                                                                     │
//! │   ┌─────────┐ ┌──────────┐ ┌────────────┐ ┌──────────┐ ┌────────┐  │
//! │   │  money  │ │   tax    │ │ access_key │ │ document │ │ ticket │  │
//! │   │quantity │ │  engine  │ │  modulo-11 │ │ composer │ │ render │  │
//! │   └─────────┘ └──────────┘ └────────────┘ └──────────┘ └────────┘  │
//! │                                                                     │
//! │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS                │
//! │        │                                                            │
//! │        ▼                                                            │
//! │  fogon-db (SQLite repositories: batches, sequences, sales)          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, Batch, FiscalDocument, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`quantity`] - Stock quantities in integer milliunits
//! - [`tax`] - Tax rule engine with per-line computation
//! - [`access_key`] - 49-digit access key with modulo-11 check digit
//! - [`document`] - Canonical fiscal document composition
//! - [`ticket`] - Printable ticket rendering
//! - [`validation`] - Buyer identity validation and field truncation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, always
//! 2. **No I/O**: database, network, clocks are FORBIDDEN here
//! 3. **Integer Arithmetic**: money in cents (i64), stock in milliunits (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access_key;
pub mod document;
pub mod error;
pub mod money;
pub mod quantity;
pub mod tax;
pub mod ticket;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tax id substituted when a sale has no buyer data ("final consumer").
///
/// The authority reserves this identity for anonymous retail sales; documents
/// issued against it are valid without any buyer contact data.
pub const FINAL_CONSUMER_TAX_ID: &str = "9999999999999";

/// Legal name paired with [`FINAL_CONSUMER_TAX_ID`].
pub const FINAL_CONSUMER_NAME: &str = "CONSUMIDOR FINAL";

/// Fallback standard tax rate in basis points (15.00%).
///
/// Used when no active rule matches a line's standard tax code. Settlement is
/// never blocked by missing tax configuration; the fallback is logged by the
/// orchestrator.
pub const DEFAULT_STANDARD_RATE_BPS: u32 = 1500;

/// Tax code for standard-rated lines.
pub const TAX_CODE_STANDARD: &str = "standard";

/// Tax code for exempt/zero-rated lines.
pub const TAX_CODE_EXEMPT: &str = "exempt";

/// Document type code for a sales invoice (factura).
pub const DOC_TYPE_INVOICE: &str = "01";

/// Highest sequential a single (doc type, establishment, emission point)
/// series can issue; beyond it the series is exhausted and an operator
/// must provision a new emission point.
pub const SEQUENCE_CEILING: i64 = 999_999_999;
