//! Repository for `collections` and `collection_items`.

use sqlx::PgConnection;
use strata_core::types::DbId;

use crate::models::item::CollectionRow;

pub struct CollectionRepo;

impl CollectionRepo {
    pub async fn create(conn: &mut PgConnection, name: &str) -> Result<CollectionRow, sqlx::Error> {
        sqlx::query_as::<_, CollectionRow>(
            "INSERT INTO collections (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<CollectionRow>, sqlx::Error> {
        sqlx::query_as::<_, CollectionRow>("SELECT id, name FROM collections WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Map an item into a collection. An existing mapping is left alone.
    pub async fn add_item(
        conn: &mut PgConnection,
        collection_id: DbId,
        item_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO collection_items (collection_id, item_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(collection_id)
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Returns `true` if a mapping was removed.
    pub async fn remove_item(
        conn: &mut PgConnection,
        collection_id: DbId,
        item_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM collection_items WHERE collection_id = $1 AND item_id = $2")
                .bind(collection_id)
                .bind(item_id)
                .execute(&mut *conn)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_item(
        conn: &mut PgConnection,
        item_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT collection_id FROM collection_items WHERE item_id = $1 ORDER BY collection_id",
        )
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
