//! # fogon-fiscal: Settlement Orchestration for Fogón
//!
//! Drives a served sale through payment, stock deduction, fiscal document
//! emission and authority submission.
//!
//! ## Architecture Position
//! ```text
//! cashier / back-office surface
//!      │  settle(sale, payment, buyer?)   reprint(sale)
//!      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   fogon-fiscal (THIS CRATE)                     │
//! │                                                                 │
//! │  SettlementService ──► AuthorityClient (simulated reception)    │
//! │        │           ──► DocumentSigner  (passthrough stub)       │
//! │        ▼                                                        │
//! │  fogon-core (tax, access key, composer, ticket)                 │
//! │  fogon-db   (sales, batches, sequences, fiscal documents)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`settlement`] - The orchestrator and its request/receipt types
//! - [`authority`] - Authority gateway trait and simulated reception
//! - [`signer`] - Document signing seam (passthrough stub)
//! - [`config`] - Service configuration
//! - [`error`] - Pipeline error types
//! - [`telemetry`] - Tracing initialization for embedding surfaces

// =============================================================================
// Module Declarations
// =============================================================================

pub mod authority;
pub mod config;
pub mod error;
pub mod settlement;
pub mod signer;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use authority::{AuthorityClient, AuthorityVerdict, SimulatedAuthority};
pub use config::SettlementConfig;
pub use error::{FiscalResult, SettlementError, Shortage};
pub use settlement::{SettlementReceipt, SettlementRequest, SettlementService};
pub use signer::{DocumentSigner, PassthroughSigner};
pub use telemetry::init_tracing;
