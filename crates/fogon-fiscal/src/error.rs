//! # Settlement Error Types
//!
//! What callers of the settlement pipeline see. Database and domain errors
//! are wrapped; pipeline-level outcomes (stock shortfall, authority
//! rejection, indeterminate submission) get their own variants because
//! each one demands a different operator reaction.

use thiserror::Error;

use fogon_core::{CoreError, Quantity, SaleStatus, ValidationError};
use fogon_db::DbError;

/// One item's missing quantity, reported by the pre-allocation check.
#[derive(Debug, Clone)]
pub struct Shortage {
    pub item_id: String,
    pub shortfall: Quantity,
}

/// Errors surfaced by the settlement pipeline.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The sale is already closed. Use reprint for its ticket.
    #[error("Sale {sale_id} is already settled")]
    AlreadySettled {
        sale_id: String,
        ticket_number: Option<String>,
    },

    /// The sale is not in `served`; settlement refuses to touch it.
    #[error("Sale {sale_id} is {status:?}, not served")]
    NotSettleable {
        sale_id: String,
        status: SaleStatus,
    },

    /// A sale with no lines cannot produce a fiscal document.
    #[error("Sale {sale_id} has no lines")]
    EmptySale { sale_id: String },

    /// The pre-allocation check found shortfalls. Every short item is
    /// reported, not just the first, so the operator restocks once.
    #[error("Insufficient stock for {} item(s)", shortages.len())]
    InsufficientStock { shortages: Vec<Shortage> },

    /// The sequential series for this emission point is spent.
    #[error("Sequence exhausted for {series}")]
    SequenceExhausted { series: String },

    /// The authority refused the document. The sale stays open; retrying
    /// issues a fresh document.
    #[error("Authority rejected document {access_key}: {reason}")]
    AuthorityRejected { access_key: String, reason: String },

    /// No verdict could be obtained (timeout, transport failure). The
    /// document stays pending; the next settlement attempt re-queries it
    /// instead of re-submitting.
    #[error("Authority verdict indeterminate for {access_key}: {reason}")]
    AuthorityIndeterminate { access_key: String, reason: String },

    /// Reprint requested for a sale with no authorized document.
    #[error("Sale {sale_id} has no authorized document to reprint")]
    NoAuthorizedDocument { sale_id: String },

    /// Buyer or line validation failed before any mutation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Domain computation failed (access key construction, composition).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Persistence failure.
    #[error(transparent)]
    Db(DbError),
}

/// Map database errors, promoting the two pipeline-meaningful ones.
impl From<DbError> for SettlementError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InsufficientStock { item_id, shortfall } => {
                SettlementError::InsufficientStock {
                    shortages: vec![Shortage { item_id, shortfall }],
                }
            }
            DbError::SequenceExhausted { series } => SettlementError::SequenceExhausted { series },
            other => SettlementError::Db(other),
        }
    }
}

/// Result type for settlement operations.
pub type FiscalResult<T> = Result<T, SettlementError>;
