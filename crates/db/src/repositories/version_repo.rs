//! Repository for `version_histories` and `versions`.

use sqlx::PgConnection;
use strata_core::types::{DbId, Timestamp};
use strata_core::version::NewVersion;

use crate::models::version::{VersionHistoryRow, VersionRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, history_id, version_number, item_id, creator_id, created_at, summary";

const HISTORY_COLUMNS: &str = "id, last_version_number, created_at";

/// Provides persistence for version histories and their records.
pub struct VersionRepo;

impl VersionRepo {
    // ── Histories ────────────────────────────────────────────────────

    pub async fn create_history(
        conn: &mut PgConnection,
        created_at: Timestamp,
    ) -> Result<VersionHistoryRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO version_histories (created_at) VALUES ($1) RETURNING {HISTORY_COLUMNS}"
        );
        sqlx::query_as::<_, VersionHistoryRow>(&query)
            .bind(created_at)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn find_history(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<VersionHistoryRow>, sqlx::Error> {
        let query = format!("SELECT {HISTORY_COLUMNS} FROM version_histories WHERE id = $1");
        sqlx::query_as::<_, VersionHistoryRow>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Bump the history counter and return the new value.
    ///
    /// The row lock taken by the update serializes concurrent allocations
    /// on the same history until the surrounding transaction ends.
    pub async fn allocate_number(
        conn: &mut PgConnection,
        history_id: DbId,
    ) -> Result<Option<i32>, sqlx::Error> {
        let row: Option<(i32,)> = sqlx::query_as(
            "UPDATE version_histories SET last_version_number = last_version_number + 1
             WHERE id = $1
             RETURNING last_version_number",
        )
        .bind(history_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(|(number,)| number))
    }

    /// Permanently delete a history. Its records go with it.
    pub async fn delete_history(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM version_histories WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Records ──────────────────────────────────────────────────────

    pub async fn insert(
        conn: &mut PgConnection,
        input: &NewVersion,
    ) -> Result<VersionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO versions
                (history_id, version_number, item_id, creator_id, created_at, summary)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VersionRow>(&query)
            .bind(input.history_id)
            .bind(input.version_number)
            .bind(input.item_id)
            .bind(input.creator_id)
            .bind(input.created_at)
            .bind(&input.summary)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<VersionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM versions WHERE id = $1");
        sqlx::query_as::<_, VersionRow>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    pub async fn list_by_item(
        conn: &mut PgConnection,
        item_id: DbId,
    ) -> Result<Vec<VersionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM versions WHERE item_id = $1 ORDER BY id");
        sqlx::query_as::<_, VersionRow>(&query)
            .bind(item_id)
            .fetch_all(&mut *conn)
            .await
    }

    /// All records of a history, ordered by version number descending.
    pub async fn list_by_history(
        conn: &mut PgConnection,
        history_id: DbId,
    ) -> Result<Vec<VersionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM versions WHERE history_id = $1 ORDER BY version_number DESC"
        );
        sqlx::query_as::<_, VersionRow>(&query)
            .bind(history_id)
            .fetch_all(&mut *conn)
            .await
    }

    /// Returns `true` if a row was updated.
    pub async fn set_summary(
        conn: &mut PgConnection,
        id: DbId,
        summary: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE versions SET summary = $2 WHERE id = $1")
            .bind(id)
            .bind(summary)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Permanently delete a record. The history counter is left alone.
    pub async fn hard_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM versions WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
