//! Repository for `relationship_types` and `relationships`.

use sqlx::PgConnection;
use strata_core::relationship::{NewRelationship, NewRelationshipType, Side};
use strata_core::types::DbId;

use crate::models::relationship::{RelationshipRow, RelationshipTypeRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, type_id, left_item_id, right_item_id, left_place, right_place, \
    left_is_latest, right_is_latest";

const TYPE_COLUMNS: &str = "id, left_entity_type, right_entity_type, left_label, right_label";

pub struct RelationshipRepo;

impl RelationshipRepo {
    // ── Types ────────────────────────────────────────────────────────

    pub async fn create_type(
        conn: &mut PgConnection,
        input: &NewRelationshipType,
    ) -> Result<RelationshipTypeRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO relationship_types
                (left_entity_type, right_entity_type, left_label, right_label)
             VALUES ($1, $2, $3, $4)
             RETURNING {TYPE_COLUMNS}"
        );
        sqlx::query_as::<_, RelationshipTypeRow>(&query)
            .bind(&input.left_entity_type)
            .bind(&input.right_entity_type)
            .bind(&input.left_label)
            .bind(&input.right_label)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn list_types(
        conn: &mut PgConnection,
    ) -> Result<Vec<RelationshipTypeRow>, sqlx::Error> {
        let query = format!("SELECT {TYPE_COLUMNS} FROM relationship_types ORDER BY id");
        sqlx::query_as::<_, RelationshipTypeRow>(&query)
            .fetch_all(&mut *conn)
            .await
    }

    pub async fn find_type_by_left_label(
        conn: &mut PgConnection,
        left_label: &str,
    ) -> Result<Option<RelationshipTypeRow>, sqlx::Error> {
        let query = format!("SELECT {TYPE_COLUMNS} FROM relationship_types WHERE left_label = $1");
        sqlx::query_as::<_, RelationshipTypeRow>(&query)
            .bind(left_label)
            .fetch_optional(&mut *conn)
            .await
    }

    pub async fn type_exists(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM relationship_types WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(row.0)
    }

    // ── Edges ────────────────────────────────────────────────────────

    pub async fn create(
        conn: &mut PgConnection,
        input: &NewRelationship,
    ) -> Result<RelationshipRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO relationships
                (type_id, left_item_id, right_item_id, left_place, right_place,
                 left_is_latest, right_is_latest)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RelationshipRow>(&query)
            .bind(input.type_id)
            .bind(input.left_item_id)
            .bind(input.right_item_id)
            .bind(input.left_place)
            .bind(input.right_place)
            .bind(input.left_is_latest)
            .bind(input.right_is_latest)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<RelationshipRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM relationships WHERE id = $1");
        sqlx::query_as::<_, RelationshipRow>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Edges with `item_id` on either side, optionally restricted to one
    /// type, ordered by id.
    pub async fn list_for_item(
        conn: &mut PgConnection,
        item_id: DbId,
        type_id: Option<DbId>,
    ) -> Result<Vec<RelationshipRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM relationships
             WHERE (left_item_id = $1 OR right_item_id = $1)
               AND ($2::BIGINT IS NULL OR type_id = $2)
             ORDER BY id"
        );
        sqlx::query_as::<_, RelationshipRow>(&query)
            .bind(item_id)
            .bind(type_id)
            .fetch_all(&mut *conn)
            .await
    }

    /// Returns `true` if a row was updated.
    pub async fn set_latest(
        conn: &mut PgConnection,
        id: DbId,
        side: Side,
        value: bool,
    ) -> Result<bool, sqlx::Error> {
        let column = match side {
            Side::Left => "left_is_latest",
            Side::Right => "right_is_latest",
        };
        let query = format!("UPDATE relationships SET {column} = $2 WHERE id = $1");
        let result = sqlx::query(&query)
            .bind(id)
            .bind(value)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Permanently delete an edge. Returns `true` if a row was removed.
    pub async fn hard_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM relationships WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
