//! # Recipe Repository (Recipe Resolver)
//!
//! Pure reads over the bill-of-materials table. Resolution is
//! variant-aware: when a sale line names a variant that has its own recipe
//! rows, those replace the dish's generic rows entirely; otherwise the
//! generic (NULL-variant) rows apply.
//!
//! A dish with no recipe at all is a valid answer (empty vec): the
//! settlement pipeline skips stock impact for such lines and logs a
//! warning rather than blocking the cashier.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use fogon_core::RecipeEntry;

/// Repository for recipe lookups.
#[derive(Debug, Clone)]
pub struct RecipeRepository {
    pool: SqlitePool,
}

impl RecipeRepository {
    /// Creates a new RecipeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RecipeRepository { pool }
    }

    /// Inserts a recipe entry (menu management / test seeding).
    pub async fn insert_entry(&self, entry: &RecipeEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recipe_entries (
                id, dish_id, variant_id, item_id,
                quantity_per_unit_milli, batch_override
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.dish_id)
        .bind(&entry.variant_id)
        .bind(&entry.item_id)
        .bind(entry.quantity_per_unit_milli)
        .bind(&entry.batch_override)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Resolves the recipe for a dish, honoring variant precedence.
    pub async fn resolve(
        &self,
        dish_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<Vec<RecipeEntry>> {
        let all = sqlx::query_as::<_, RecipeEntry>(
            r#"
            SELECT id, dish_id, variant_id, item_id,
                   quantity_per_unit_milli, batch_override
            FROM recipe_entries
            WHERE dish_id = ?1
            ORDER BY id
            "#,
        )
        .bind(dish_id)
        .fetch_all(&self.pool)
        .await?;

        let entries = match variant_id {
            Some(variant) if all.iter().any(|e| e.variant_id.as_deref() == Some(variant)) => all
                .into_iter()
                .filter(|e| e.variant_id.as_deref() == Some(variant))
                .collect(),
            _ => all
                .into_iter()
                .filter(|e| e.variant_id.is_none())
                .collect::<Vec<_>>(),
        };

        debug!(
            dish_id = %dish_id,
            variant = variant_id.unwrap_or("-"),
            entries = entries.len(),
            "Recipe resolved"
        );
        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
