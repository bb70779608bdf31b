//! # Batch Repository (Batch Ledger)
//!
//! Owns per-item, per-batch quantities: availability queries and FIFO
//! deduction.
//!
//! ## FIFO Allocation
//! ```text
//! allocate("beef-loin", 8.000)
//!      │
//!      ▼
//! SELECT active batches, quantity > 0, ORDER BY received_at ASC
//!      │
//!      ▼
//! B1 (oldest, 5.000) ── take 5.000 ──┐   each take is one conditional
//! B2 (newer, 10.000) ── take 3.000 ──┤   UPDATE ... SET quantity = quantity - ?
//!                                    │   WHERE id = ? AND quantity >= ?
//!      ┌─────────────────────────────┘
//!      ▼
//! one StockMovement per batch touched (delta negative)
//! ```
//!
//! ## Concurrency
//! The deduction is never a read-then-write: the `quantity_milli >= take`
//! guard inside the UPDATE is what keeps two concurrent settlements from
//! driving a batch negative. A take that affects zero rows means another
//! settlement drained the batch between our SELECT and UPDATE; the
//! allocation re-reads fresh rows once before surfacing
//! `InsufficientStock`.
//!
//! A multi-item allocation runs inside one transaction, so a failure on the
//! third item rolls back the takes already applied to the first two —
//! no partial deduction is ever left committed.
//!
//! ## Pinned Batches
//! A recipe entry may pin a specific batch. Pinned allocation is restricted
//! to that batch and fails outright when it is short: pinned-batch recipes
//! must not silently draw from other lots.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use fogon_core::{Batch, Quantity, StockMovement};

/// Movement reason recorded for settlement deductions.
const REASON_SALE_SETTLEMENT: &str = "sale_settlement";

// =============================================================================
// Allocation Types
// =============================================================================

/// One item's total requirement for a settlement, aggregated over the
/// sale's recipe entries.
#[derive(Debug, Clone)]
pub struct ItemRequirement {
    pub item_id: String,
    pub required: Quantity,
    /// Restricts allocation to a single lot (no FIFO fallback).
    pub pinned_batch: Option<String>,
}

/// One partial take applied to a batch during allocation.
#[derive(Debug, Clone)]
pub struct AllocationTake {
    pub item_id: String,
    pub batch_id: String,
    pub taken: Quantity,
}

// =============================================================================
// Batch Repository
// =============================================================================

/// Repository for batch ledger operations.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    /// Creates a new BatchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Inserts a batch row (receiving flow / test seeding).
    pub async fn insert_batch(&self, batch: &Batch) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO batches (
                id, item_id, batch_code, quantity_milli,
                unit_cost_cents, received_at, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.item_id)
        .bind(&batch.batch_code)
        .bind(batch.quantity_milli)
        .bind(batch.unit_cost_cents)
        .bind(batch.received_at)
        .bind(batch.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a batch by ID.
    pub async fn get_batch(&self, id: &str) -> DbResult<Option<Batch>> {
        let batch = sqlx::query_as::<_, Batch>(
            r#"
            SELECT id, item_id, batch_code, quantity_milli,
                   unit_cost_cents, received_at, is_active
            FROM batches
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }

    /// Total available quantity for an item: sum over active batches with
    /// quantity > 0. Drained batches stay in the table for audit but do
    /// not count.
    pub async fn available_quantity(&self, item_id: &str) -> DbResult<Quantity> {
        let milli: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity_milli), 0)
            FROM batches
            WHERE item_id = ?1 AND is_active = 1 AND quantity_milli > 0
            "#,
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Quantity::from_milli(milli))
    }

    /// Returns the shortfall for a requirement (zero when stock suffices).
    ///
    /// With a pinned batch, the requirement is compared against that single
    /// batch's remaining quantity; otherwise against the item's total.
    pub async fn check_availability(
        &self,
        item_id: &str,
        required: Quantity,
        pinned_batch: Option<&str>,
    ) -> DbResult<Quantity> {
        let available = match pinned_batch {
            Some(batch_id) => {
                let milli: Option<i64> = sqlx::query_scalar(
                    r#"
                    SELECT quantity_milli
                    FROM batches
                    WHERE id = ?1 AND item_id = ?2 AND is_active = 1
                    "#,
                )
                .bind(batch_id)
                .bind(item_id)
                .fetch_optional(&self.pool)
                .await?;
                Quantity::from_milli(milli.unwrap_or(0))
            }
            None => self.available_quantity(item_id).await?,
        };

        Ok(required.saturating_sub(available))
    }

    /// Allocates every requirement FIFO inside one transaction, recording
    /// one StockMovement per batch touched.
    ///
    /// Fails with [`DbError::InsufficientStock`] on the first item that
    /// cannot be satisfied; the transaction rolls back, leaving no partial
    /// deduction committed.
    pub async fn allocate(
        &self,
        requirements: &[ItemRequirement],
        sale_id: &str,
    ) -> DbResult<Vec<AllocationTake>> {
        let mut tx = self.pool.begin().await?;
        let mut takes = Vec::new();

        for req in requirements {
            if !req.required.is_positive() {
                continue;
            }
            let item_takes = match req.pinned_batch.as_deref() {
                Some(batch_id) => {
                    allocate_pinned(&mut tx, &req.item_id, batch_id, req.required).await?
                }
                None => allocate_fifo(&mut tx, &req.item_id, req.required).await?,
            };
            takes.extend(item_takes);
        }

        for take in &takes {
            insert_movement(&mut tx, take, sale_id).await?;
        }

        tx.commit().await?;

        debug!(
            sale_id = %sale_id,
            batches = takes.len(),
            "Stock allocated"
        );

        Ok(takes)
    }

    /// Gets the movements recorded for a sale (audit view).
    pub async fn movements_for_sale(&self, sale_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, item_id, batch_id, delta_milli, reason, sale_id, created_at
            FROM stock_movements
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

// =============================================================================
// Allocation Internals
// =============================================================================

/// Candidate row for FIFO draining.
#[derive(Debug, sqlx::FromRow)]
struct CandidateBatch {
    id: String,
    quantity_milli: i64,
}

/// Fetches allocation candidates oldest-first. Always a fresh read; batch
/// rows are never cached across calls.
async fn fetch_candidates(
    tx: &mut Transaction<'_, Sqlite>,
    item_id: &str,
) -> DbResult<Vec<CandidateBatch>> {
    let rows = sqlx::query_as::<_, CandidateBatch>(
        r#"
        SELECT id, quantity_milli
        FROM batches
        WHERE item_id = ?1 AND is_active = 1 AND quantity_milli > 0
        ORDER BY received_at ASC, id ASC
        "#,
    )
    .bind(item_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// Applies one conditional take to a batch. Returns true when the guard
/// held and the row was updated.
async fn try_take(
    tx: &mut Transaction<'_, Sqlite>,
    batch_id: &str,
    take_milli: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE batches
        SET quantity_milli = quantity_milli - ?1
        WHERE id = ?2 AND quantity_milli >= ?1
        "#,
    )
    .bind(take_milli)
    .bind(batch_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Greedy FIFO drain for one item. A raced batch (guard failed) triggers a
/// single re-read of fresh candidates before the shortfall is surfaced.
async fn allocate_fifo(
    tx: &mut Transaction<'_, Sqlite>,
    item_id: &str,
    required: Quantity,
) -> DbResult<Vec<AllocationTake>> {
    let mut takes = Vec::new();
    let mut remaining = required;
    let mut retried = false;

    loop {
        let candidates = fetch_candidates(tx, item_id).await?;

        for candidate in &candidates {
            if !remaining.is_positive() {
                break;
            }
            let take = remaining.min(Quantity::from_milli(candidate.quantity_milli));
            if !take.is_positive() {
                continue;
            }
            if try_take(tx, &candidate.id, take.milli()).await? {
                remaining -= take;
                takes.push(AllocationTake {
                    item_id: item_id.to_string(),
                    batch_id: candidate.id.clone(),
                    taken: take,
                });
            }
            // Guard failed: another settlement drained this batch after our
            // SELECT. The retry pass below re-reads fresh rows.
        }

        if !remaining.is_positive() {
            return Ok(takes);
        }

        if retried {
            warn!(
                item_id = %item_id,
                shortfall = %remaining,
                "FIFO allocation short after retry"
            );
            return Err(DbError::InsufficientStock {
                item_id: item_id.to_string(),
                shortfall: remaining,
            });
        }
        retried = true;
    }
}

/// Pinned-lot allocation: the requirement must be satisfied by the pinned
/// batch alone. No fallback to FIFO when it is short.
async fn allocate_pinned(
    tx: &mut Transaction<'_, Sqlite>,
    item_id: &str,
    batch_id: &str,
    required: Quantity,
) -> DbResult<Vec<AllocationTake>> {
    // One retry, same policy as the FIFO path.
    for _ in 0..2 {
        if try_take(tx, batch_id, required.milli()).await? {
            return Ok(vec![AllocationTake {
                item_id: item_id.to_string(),
                batch_id: batch_id.to_string(),
                taken: required,
            }]);
        }
    }

    let available: Option<i64> = sqlx::query_scalar(
        r#"SELECT quantity_milli FROM batches WHERE id = ?1 AND is_active = 1"#,
    )
    .bind(batch_id)
    .fetch_optional(&mut **tx)
    .await?;

    let shortfall = required.saturating_sub(Quantity::from_milli(available.unwrap_or(0)));
    warn!(
        item_id = %item_id,
        batch_id = %batch_id,
        shortfall = %shortfall,
        "Pinned batch cannot satisfy requirement"
    );
    Err(DbError::InsufficientStock {
        item_id: item_id.to_string(),
        shortfall,
    })
}

/// Records the audit movement for one take. Deduction deltas are negative.
async fn insert_movement(
    tx: &mut Transaction<'_, Sqlite>,
    take: &AllocationTake,
    sale_id: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, item_id, batch_id, delta_milli, reason, sale_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&take.item_id)
    .bind(&take.batch_id)
    .bind(take.taken.negated().milli())
    .bind(REASON_SALE_SETTLEMENT)
    .bind(sale_id)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
