//! # Sale Repository
//!
//! Sales (comandas) and their lines. The settlement pipeline only ever
//! reads a sale, then performs the single `served → closed` transition;
//! order taking and the kitchen flow live elsewhere.
//!
//! ## The Close Guard
//! `close_sale` is a conditional UPDATE (`WHERE status = 'served'`), not a
//! read-then-write. Two concurrent settlements of the same sale race on
//! that guard; exactly one wins and the loser sees zero rows affected.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use fogon_core::{PaymentMethod, Sale, SaleLine, SaleStatus};

// =============================================================================
// Close Input
// =============================================================================

/// Fields written onto the sale at settlement commit.
#[derive(Debug, Clone)]
pub struct SaleClose<'a> {
    pub payment_method: PaymentMethod,
    pub settled_by: Option<&'a str>,
    /// The fiscal document's sequential, stamped as the ticket number.
    pub ticket_number: &'a str,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub closed_at: DateTime<Utc>,
}

// =============================================================================
// Sale Repository
// =============================================================================

/// Repository for sale operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts a sale row (order flow / test seeding).
    pub async fn insert_sale(&self, sale: &Sale) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, table_number, staff_id, status,
                subtotal_cents, tax_cents, total_cents,
                payment_method, settled_by, ticket_number,
                created_at, updated_at, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&sale.id)
        .bind(sale.table_number)
        .bind(&sale.staff_id)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(&sale.settled_by)
        .bind(&sale.ticket_number)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.closed_at)
        .execute(&self.pool)
        .await?;

        debug!(sale_id = %sale.id, "Sale inserted");
        Ok(())
    }

    /// Inserts a sale line.
    pub async fn insert_line(&self, line: &SaleLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, dish_id, variant_id, description,
                quantity, unit_price_cents, discount_cents, line_total_cents,
                tax_code, kitchen_status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.dish_id)
        .bind(&line.variant_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.discount_cents)
        .bind(line.line_total_cents)
        .bind(&line.tax_code)
        .bind(line.kitchen_status)
        .bind(line.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a sale by ID.
    pub async fn get_sale(&self, id: &str) -> DbResult<Sale> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, table_number, staff_id, status,
                   subtotal_cents, tax_cents, total_cents,
                   payment_method, settled_by, ticket_number,
                   created_at, updated_at, closed_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))?;

        Ok(sale)
    }

    /// Gets the lines of a sale, in insertion order.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT id, sale_id, dish_id, variant_id, description,
                   quantity, unit_price_cents, discount_cents, line_total_cents,
                   tax_code, kitchen_status, created_at
            FROM sale_lines
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Lists sales eligible for settlement (status `served`), oldest first.
    pub async fn list_settleable(&self) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, table_number, staff_id, status,
                   subtotal_cents, tax_cents, total_cents,
                   payment_method, settled_by, ticket_number,
                   created_at, updated_at, closed_at
            FROM sales
            WHERE status = ?1
            ORDER BY created_at
            "#,
        )
        .bind(SaleStatus::Served)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Transitions a sale `served → closed`, stamping the settlement fields.
    ///
    /// Returns `true` when the transition happened. `false` means the sale
    /// was not in `served` at that instant (already closed, or never
    /// delivered); nothing is written in that case.
    pub async fn close_sale(&self, sale_id: &str, close: &SaleClose<'_>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sales
            SET status = ?1,
                payment_method = ?2,
                settled_by = ?3,
                ticket_number = ?4,
                subtotal_cents = ?5,
                tax_cents = ?6,
                total_cents = ?7,
                closed_at = ?8,
                updated_at = ?8
            WHERE id = ?9 AND status = ?10
            "#,
        )
        .bind(SaleStatus::Closed)
        .bind(close.payment_method)
        .bind(close.settled_by)
        .bind(close.ticket_number)
        .bind(close.subtotal_cents)
        .bind(close.tax_cents)
        .bind(close.total_cents)
        .bind(close.closed_at)
        .bind(sale_id)
        .bind(SaleStatus::Served)
        .execute(&self.pool)
        .await?;

        let closed = result.rows_affected() == 1;
        if closed {
            info!(sale_id = %sale_id, ticket = %close.ticket_number, "Sale closed");
        } else {
            debug!(sale_id = %sale_id, "Close guard rejected transition");
        }
        Ok(closed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
