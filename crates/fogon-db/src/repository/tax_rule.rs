//! # Tax Rule Repository
//!
//! Reads the tax code/rate table the settlement loads into its tax engine.
//! Seeded by migration with the `standard` and `exempt` codes; operators
//! may add or deactivate rules without touching code.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use fogon_core::TaxRule;

/// Repository for tax rule lookups.
#[derive(Debug, Clone)]
pub struct TaxRuleRepository {
    pool: SqlitePool,
}

impl TaxRuleRepository {
    /// Creates a new TaxRuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TaxRuleRepository { pool }
    }

    /// Lists the active tax rules.
    pub async fn active_rules(&self) -> DbResult<Vec<TaxRule>> {
        let rules = sqlx::query_as::<_, TaxRule>(
            r#"
            SELECT id, code, rate_bps, description, is_active
            FROM tax_rules
            WHERE is_active = 1
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(rules = rules.len(), "Active tax rules loaded");
        Ok(rules)
    }

    /// Inserts or replaces a tax rule (configuration / test seeding).
    pub async fn upsert_rule(&self, rule: &TaxRule) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tax_rules (id, code, rate_bps, description, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (code)
            DO UPDATE SET rate_bps = excluded.rate_bps,
                          description = excluded.description,
                          is_active = excluded.is_active
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.code)
        .bind(rule.rate_bps)
        .bind(&rule.description)
        .bind(rule.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
