//! # Sequence Repository
//!
//! Gapless sequential issuing per (doc type, establishment, emission point).
//!
//! ## The Atomic Increment
//! ```text
//! INSERT OR IGNORE the counter row (first use of a series)
//!      │
//!      ▼
//! UPDATE invoice_sequences
//! SET current = current + 1
//! WHERE doc_type = ? AND establishment = ? AND emission_point = ?
//!   AND current < max
//! RETURNING current
//! ```
//! The increment and the read of the new value are one statement, so two
//! concurrent settlements can never observe the same number. A NULL return
//! means the series hit its ceiling.
//!
//! Issuing is deliberately outside the settlement commit transaction: an
//! abandoned number (authority rejection after issue) is acceptable, a
//! duplicated number is not.

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use fogon_core::{InvoiceSequence, SEQUENCE_CEILING};

/// Width of the zero-padded sequential on documents and access keys.
const SEQUENTIAL_WIDTH: usize = 9;

/// Repository for invoice sequence operations.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    /// Creates a new SequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Issues the next sequential for a series, zero-padded to 9 digits.
    ///
    /// The counter row is created lazily on first use. Fails with
    /// [`DbError::SequenceExhausted`] once `current` reaches `max`.
    pub async fn next_sequential(
        &self,
        doc_type: &str,
        establishment: &str,
        emission_point: &str,
    ) -> DbResult<String> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO invoice_sequences
                (doc_type, establishment, emission_point, current, max)
            VALUES (?1, ?2, ?3, 0, ?4)
            "#,
        )
        .bind(doc_type)
        .bind(establishment)
        .bind(emission_point)
        .bind(SEQUENCE_CEILING)
        .execute(&self.pool)
        .await?;

        let issued: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE invoice_sequences
            SET current = current + 1
            WHERE doc_type = ?1 AND establishment = ?2 AND emission_point = ?3
              AND current < max
            RETURNING current
            "#,
        )
        .bind(doc_type)
        .bind(establishment)
        .bind(emission_point)
        .fetch_optional(&self.pool)
        .await?;

        match issued {
            Some(n) => {
                debug!(
                    doc_type = %doc_type,
                    series = %format!("{establishment}-{emission_point}"),
                    sequential = n,
                    "Sequential issued"
                );
                Ok(format!("{n:0width$}", width = SEQUENTIAL_WIDTH))
            }
            None => {
                warn!(
                    doc_type = %doc_type,
                    series = %format!("{establishment}-{emission_point}"),
                    "Sequence ceiling reached"
                );
                Err(DbError::SequenceExhausted {
                    series: format!("{doc_type}/{establishment}-{emission_point}"),
                })
            }
        }
    }

    /// Gets the current state of a series, if it has ever issued.
    pub async fn get_sequence(
        &self,
        doc_type: &str,
        establishment: &str,
        emission_point: &str,
    ) -> DbResult<Option<InvoiceSequence>> {
        let seq = sqlx::query_as::<_, InvoiceSequence>(
            r#"
            SELECT doc_type, establishment, emission_point, current, max
            FROM invoice_sequences
            WHERE doc_type = ?1 AND establishment = ?2 AND emission_point = ?3
            "#,
        )
        .bind(doc_type)
        .bind(establishment)
        .bind(emission_point)
        .fetch_optional(&self.pool)
        .await?;

        Ok(seq)
    }

    /// Overrides a series' state (administrative repositioning, tests).
    pub async fn set_sequence(&self, seq: &InvoiceSequence) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoice_sequences
                (doc_type, establishment, emission_point, current, max)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (doc_type, establishment, emission_point)
            DO UPDATE SET current = excluded.current, max = excluded.max
            "#,
        )
        .bind(&seq.doc_type)
        .bind(&seq.establishment)
        .bind(&seq.emission_point)
        .bind(seq.current)
        .bind(seq.max)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use uuid::Uuid;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_sequentials_are_contiguous_and_padded() {
        let db = db().await;
        let repo = db.sequences();

        for expected in 1..=5i64 {
            let seq = repo.next_sequential("01", "001", "001").await.unwrap();
            assert_eq!(seq.len(), 9);
            assert_eq!(seq, format!("{expected:09}"));
        }

        let state = repo.get_sequence("01", "001", "001").await.unwrap().unwrap();
        assert_eq!(state.current, 5);
    }

    #[tokio::test]
    async fn test_series_are_independent() {
        let db = db().await;
        let repo = db.sequences();

        assert_eq!(repo.next_sequential("01", "001", "001").await.unwrap(), "000000001");
        assert_eq!(repo.next_sequential("01", "001", "002").await.unwrap(), "000000001");
        assert_eq!(repo.next_sequential("01", "002", "001").await.unwrap(), "000000001");
        assert_eq!(repo.next_sequential("01", "001", "001").await.unwrap(), "000000002");
    }

    #[tokio::test]
    async fn test_exhausted_sequence() {
        let db = db().await;
        let repo = db.sequences();
        repo.set_sequence(&InvoiceSequence {
            doc_type: "01".to_string(),
            establishment: "001".to_string(),
            emission_point: "001".to_string(),
            current: 999_999_998,
            max: 999_999_999,
        })
        .await
        .unwrap();

        // One number left, then the series is spent.
        assert_eq!(
            repo.next_sequential("01", "001", "001").await.unwrap(),
            "999999999"
        );
        let err = repo.next_sequential("01", "001", "001").await.unwrap_err();
        assert!(matches!(err, DbError::SequenceExhausted { .. }));

        // The counter never moves past max.
        let state = repo.get_sequence("01", "001", "001").await.unwrap().unwrap();
        assert_eq!(state.current, 999_999_999);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_get_unique_contiguous_sequentials() {
        // A file-backed pool with several connections, so the callers
        // actually contend instead of queueing on a single connection.
        let path = std::env::temp_dir().join(format!("fogon-seq-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(8))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = db.sequences();
            handles.push(tokio::spawn(async move {
                repo.next_sequential("01", "001", "001").await
            }));
        }

        let mut issued = Vec::new();
        for handle in handles {
            issued.push(handle.await.unwrap().unwrap());
        }

        // 20 callers, 20 distinct values, no gap: exactly 1..=20.
        issued.sort();
        let expected: Vec<String> = (1..=20i64).map(|n| format!("{n:09}")).collect();
        assert_eq!(issued, expected);

        let state = db.sequences().get_sequence("01", "001", "001").await.unwrap().unwrap();
        assert_eq!(state.current, 20);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
