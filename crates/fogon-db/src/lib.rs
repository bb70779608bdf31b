//! # fogon-db: Database Layer for Fogón
//!
//! SQLite persistence for the settlement pipeline, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! fogon-fiscal (settlement orchestrator)
//!      │
//!      │  db.batches().allocate(...), db.sequences().next_sequential(...)
//!      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     fogon-db (THIS CRATE)                       │
//! │                                                                 │
//! │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │
//! │   │   Database    │    │  Repositories  │    │  Migrations  │  │
//! │   │   (pool.rs)   │◄───│ sale, batch,   │    │  (embedded)  │  │
//! │   │   SqlitePool  │    │ recipe, seq,   │    │  001_init    │  │
//! │   │               │    │ fiscal, tax    │    │  002_seed    │  │
//! │   └───────────────┘    └────────────────┘    └──────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fogon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/fogon.db")).await?;
//! let available = db.batches().available_quantity("beef-loin").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::batch::{AllocationTake, BatchRepository, ItemRequirement};
pub use repository::fiscal::FiscalRepository;
pub use repository::recipe::RecipeRepository;
pub use repository::sale::{SaleClose, SaleRepository};
pub use repository::sequence::SequenceRepository;
pub use repository::tax_rule::TaxRuleRepository;
