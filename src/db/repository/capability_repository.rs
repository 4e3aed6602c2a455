use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{classify_db_error, AppResult};

/// Bulk capability lookups backing the availability filter. One IN-query per
/// entity kind replaces the per-appointment lookups the filter would
/// otherwise issue.
pub struct CapabilityRepository;

impl CapabilityRepository {
    /// Personal-agenda flags for the given professional ids. Ids not present
    /// in the result were not found.
    pub async fn agenda_flags(
        pool: &SqlitePool,
        professional_ids: &[String],
    ) -> AppResult<HashMap<String, bool>> {
        if professional_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, agenda_enabled FROM profiles WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in professional_ids {
            separated.push_bind(id);
        }
        qb.push(")");

        let rows: Vec<(String, bool)> = qb
            .build_query_as()
            .fetch_all(pool)
            .await
            .map_err(classify_db_error)?;

        Ok(rows.into_iter().collect())
    }

    /// Owner profile ids for the given salon ids.
    pub async fn salon_owners(
        pool: &SqlitePool,
        salon_ids: &[String],
    ) -> AppResult<HashMap<String, String>> {
        if salon_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, owner_id FROM salons WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in salon_ids {
            separated.push_bind(id);
        }
        qb.push(")");

        let rows: Vec<(String, String)> = qb
            .build_query_as()
            .fetch_all(pool)
            .await
            .map_err(classify_db_error)?;

        Ok(rows.into_iter().collect())
    }
}
