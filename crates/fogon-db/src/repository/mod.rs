//! # Repository Module
//!
//! Database repository implementations for the settlement pipeline.
//!
//! ## Available Repositories
//!
//! - [`sale::SaleRepository`] - Sales and their lines; the `served → closed`
//!   status transition with its guard
//! - [`recipe::RecipeRepository`] - Recipe Resolver (pure reads)
//! - [`batch::BatchRepository`] - Batch Ledger: availability queries and
//!   FIFO deduction as conditional updates
//! - [`sequence::SequenceRepository`] - Gapless sequential issuing
//! - [`fiscal::FiscalRepository`] - Fiscal documents and the authority
//!   audit log
//! - [`tax_rule::TaxRuleRepository`] - Active tax rules

pub mod batch;
pub mod fiscal;
pub mod recipe;
pub mod sale;
pub mod sequence;
pub mod tax_rule;
