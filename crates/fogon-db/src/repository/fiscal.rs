//! # Fiscal Repository
//!
//! Fiscal documents and the authority audit log.
//!
//! ## Immutability
//! A document's identity and text never change after insert. The only
//! mutable columns are the verdict triple (`status`, `authorization_code`,
//! `authorized_at`), and the UPDATE that writes them is guarded by
//! `status = 'pending'` - an authorized or rejected document can never be
//! re-verdicted.
//!
//! A rejected document stays on file; a retry of the sale inserts a fresh
//! document under a fresh sequential, so `latest_for_sale` orders by
//! creation time.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use fogon_core::{AuthorityLogEntry, AuthorityStatus, FiscalDocument};

/// Repository for fiscal document operations.
#[derive(Debug, Clone)]
pub struct FiscalRepository {
    pool: SqlitePool,
}

impl FiscalRepository {
    /// Creates a new FiscalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FiscalRepository { pool }
    }

    /// Inserts a fiscal document. The access key is UNIQUE at the schema
    /// level; a collision surfaces as [`DbError::UniqueViolation`].
    pub async fn insert_document(&self, doc: &FiscalDocument) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fiscal_documents (
                id, sale_id, doc_type, sequential, access_key,
                status, authorization_code, authorized_at,
                buyer_tax_id, buyer_name,
                subtotal_zero_cents, subtotal_standard_cents,
                tax_cents, total_cents, payment_code,
                document_text, ticket_text, emitted_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                      ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.sale_id)
        .bind(&doc.doc_type)
        .bind(&doc.sequential)
        .bind(&doc.access_key)
        .bind(doc.status)
        .bind(&doc.authorization_code)
        .bind(doc.authorized_at)
        .bind(&doc.buyer_tax_id)
        .bind(&doc.buyer_name)
        .bind(doc.subtotal_zero_cents)
        .bind(doc.subtotal_standard_cents)
        .bind(doc.tax_cents)
        .bind(doc.total_cents)
        .bind(&doc.payment_code)
        .bind(&doc.document_text)
        .bind(&doc.ticket_text)
        .bind(doc.emitted_at)
        .bind(doc.created_at)
        .execute(&self.pool)
        .await?;

        info!(
            document_id = %doc.id,
            sale_id = %doc.sale_id,
            sequential = %doc.sequential,
            "Fiscal document recorded"
        );
        Ok(())
    }

    /// Records the authority's verdict on a pending document.
    ///
    /// Returns `false` when the document already carries a final verdict;
    /// nothing is written in that case.
    pub async fn set_verdict(
        &self,
        document_id: &str,
        status: AuthorityStatus,
        authorization_code: Option<&str>,
        authorized_at: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fiscal_documents
            SET status = ?1, authorization_code = ?2, authorized_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(status)
        .bind(authorization_code)
        .bind(authorized_at)
        .bind(document_id)
        .bind(AuthorityStatus::Pending)
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() == 1;
        debug!(
            document_id = %document_id,
            status = %status.as_str(),
            applied,
            "Verdict update"
        );
        Ok(applied)
    }

    /// Gets a document by ID.
    pub async fn get_document(&self, id: &str) -> DbResult<FiscalDocument> {
        let doc = sqlx::query_as::<_, FiscalDocument>(&select_query("WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("FiscalDocument", id))?;

        Ok(doc)
    }

    /// Gets a document by access key.
    pub async fn get_by_access_key(&self, access_key: &str) -> DbResult<Option<FiscalDocument>> {
        let doc = sqlx::query_as::<_, FiscalDocument>(&select_query("WHERE access_key = ?1"))
            .bind(access_key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(doc)
    }

    /// Gets the most recently created document for a sale, if any.
    ///
    /// After a rejection-and-retry a sale has several documents; the latest
    /// one reflects its current fiscal state.
    pub async fn latest_for_sale(&self, sale_id: &str) -> DbResult<Option<FiscalDocument>> {
        let doc = sqlx::query_as::<_, FiscalDocument>(&select_query(
            "WHERE sale_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(doc)
    }

    /// Gets the authorized document for a sale (reprint source), if any.
    pub async fn authorized_for_sale(&self, sale_id: &str) -> DbResult<Option<FiscalDocument>> {
        let doc = sqlx::query_as::<_, FiscalDocument>(&select_query(
            "WHERE sale_id = ?1 AND status = 'authorized' LIMIT 1",
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(doc)
    }

    /// Appends an authority log entry. The log is append-only.
    pub async fn insert_log(&self, entry: &AuthorityLogEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO authority_log (
                id, access_key, request_kind, outcome,
                message, raw_response, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.access_key)
        .bind(&entry.request_kind)
        .bind(&entry.outcome)
        .bind(&entry.message)
        .bind(&entry.raw_response)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists the authority interactions recorded for an access key,
    /// oldest first.
    pub async fn logs_for_key(&self, access_key: &str) -> DbResult<Vec<AuthorityLogEntry>> {
        let entries = sqlx::query_as::<_, AuthorityLogEntry>(
            r#"
            SELECT id, access_key, request_kind, outcome,
                   message, raw_response, created_at
            FROM authority_log
            WHERE access_key = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(access_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

/// Shared column list for document selects.
fn select_query(suffix: &str) -> String {
    format!(
        r#"
        SELECT id, sale_id, doc_type, sequential, access_key,
               status, authorization_code, authorized_at,
               buyer_tax_id, buyer_name,
               subtotal_zero_cents, subtotal_standard_cents,
               tax_cents, total_cents, payment_code,
               document_text, ticket_text, emitted_at, created_at
        FROM fiscal_documents
        {suffix}
        "#
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
