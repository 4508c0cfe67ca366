//! Repository for `items`, `item_metadata` and `bundles`.

use sqlx::PgConnection;
use strata_core::item::{BundleDraft, ItemDraft};
use strata_core::metadata::MetadataValue;
use strata_core::types::{DbId, Timestamp};

use crate::models::item::{BitstreamRow, BundleRow, ItemRow, ItemRows, MetadataRow};
use crate::repositories::bitstream_repo::{BitstreamRepo, BITSTREAM_COLUMNS};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, handle, in_archive, withdrawn, discoverable, \
    owning_collection_id, submitter_id, last_modified";

const BUNDLE_COLUMNS: &str = "id, item_id, name, primary_bitstream_id";

const FIELD_COLUMNS: &str =
    "schema_name, element, qualifier, language, value, authority, confidence, place";

/// The two tables holding metadata values.
#[derive(Debug, Clone, Copy)]
pub enum FieldTable {
    Item,
    Bitstream,
}

impl FieldTable {
    fn table(self) -> &'static str {
        match self {
            Self::Item => "item_metadata",
            Self::Bitstream => "bitstream_metadata",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            Self::Item => "item_id",
            Self::Bitstream => "bitstream_id",
        }
    }
}

/// Insert `values` for one owner, in the given order.
pub async fn insert_fields(
    conn: &mut PgConnection,
    table: FieldTable,
    owner_id: DbId,
    values: &[MetadataValue],
) -> Result<(), sqlx::Error> {
    let query = format!(
        "INSERT INTO {} ({}, {FIELD_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        table.table(),
        table.owner_column()
    );
    for value in values {
        sqlx::query(&query)
            .bind(owner_id)
            .bind(&value.schema)
            .bind(&value.element)
            .bind(&value.qualifier)
            .bind(&value.language)
            .bind(&value.value)
            .bind(&value.authority)
            .bind(value.confidence)
            .bind(value.place)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Delete every value of one owner.
pub async fn delete_fields(
    conn: &mut PgConnection,
    table: FieldTable,
    owner_id: DbId,
) -> Result<(), sqlx::Error> {
    let query = format!(
        "DELETE FROM {} WHERE {} = $1",
        table.table(),
        table.owner_column()
    );
    sqlx::query(&query).bind(owner_id).execute(&mut *conn).await?;
    Ok(())
}

/// Provides persistence for items and their bundles.
pub struct ItemRepo;

impl ItemRepo {
    /// Load an item with its fields, bundles and bitstreams.
    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<ItemRows>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM items WHERE id = $1");
        let Some(item) = sqlx::query_as::<_, ItemRow>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let query = format!(
            "SELECT item_id AS owner_id, {FIELD_COLUMNS} FROM item_metadata
             WHERE item_id = $1
             ORDER BY id"
        );
        let metadata = sqlx::query_as::<_, MetadataRow>(&query)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

        let query = format!("SELECT {BUNDLE_COLUMNS} FROM bundles WHERE item_id = $1 ORDER BY id");
        let bundles = sqlx::query_as::<_, BundleRow>(&query)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

        let query = format!(
            "SELECT {} FROM bitstreams b
             JOIN bundles u ON u.id = b.bundle_id
             WHERE u.item_id = $1
             ORDER BY b.bundle_id, b.sequence",
            qualified(BITSTREAM_COLUMNS, "b")
        );
        let bitstreams = sqlx::query_as::<_, BitstreamRow>(&query)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

        let query = format!(
            "SELECT m.bitstream_id AS owner_id, {} FROM bitstream_metadata m
             JOIN bitstreams b ON b.id = m.bitstream_id
             JOIN bundles u ON u.id = b.bundle_id
             WHERE u.item_id = $1
             ORDER BY m.bitstream_id, m.id",
            qualified(FIELD_COLUMNS, "m")
        );
        let bitstream_metadata = sqlx::query_as::<_, MetadataRow>(&query)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(Some(ItemRows {
            item,
            metadata,
            bundles,
            bitstreams,
            bitstream_metadata,
        }))
    }

    pub async fn exists(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM items WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }

    /// Insert a draft with its fields, bundles and bitstreams. Returns the
    /// new item id.
    pub async fn create(conn: &mut PgConnection, draft: &ItemDraft) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO items
                (in_archive, withdrawn, discoverable, owning_collection_id, submitter_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(draft.in_archive)
        .bind(draft.withdrawn)
        .bind(draft.discoverable)
        .bind(draft.owning_collection_id)
        .bind(draft.submitter_id)
        .fetch_one(&mut *conn)
        .await?;
        let item_id = row.0;

        insert_fields(conn, FieldTable::Item, item_id, &draft.metadata).await?;
        for bundle in &draft.bundles {
            Self::create_bundle(conn, item_id, bundle).await?;
        }
        Ok(item_id)
    }

    /// Insert a bundle and its bitstreams, numbering them from 0.
    async fn create_bundle(
        conn: &mut PgConnection,
        item_id: DbId,
        draft: &BundleDraft,
    ) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) =
            sqlx::query_as("INSERT INTO bundles (item_id, name) VALUES ($1, $2) RETURNING id")
                .bind(item_id)
                .bind(&draft.name)
                .fetch_one(&mut *conn)
                .await?;
        let bundle_id = row.0;

        let mut primary = None;
        for (index, bitstream) in draft.bitstreams.iter().enumerate() {
            let created = BitstreamRepo::insert(conn, bundle_id, index as i32, bitstream).await?;
            if draft.primary_index == Some(index) {
                primary = Some(created.id);
            }
        }
        if primary.is_some() {
            BitstreamRepo::set_primary(conn, bundle_id, primary).await?;
        }
        Ok(bundle_id)
    }

    /// Returns `true` if a row was updated.
    pub async fn set_in_archive(
        conn: &mut PgConnection,
        id: DbId,
        in_archive: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE items SET in_archive = $2 WHERE id = $1")
            .bind(id)
            .bind(in_archive)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `true` if a row was updated.
    pub async fn set_handle(
        conn: &mut PgConnection,
        id: DbId,
        handle: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE items SET handle = $2 WHERE id = $1")
            .bind(id)
            .bind(handle)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `true` if a row was updated.
    pub async fn touch(
        conn: &mut PgConnection,
        id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE items SET last_modified = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Swap every item-level field for `values`.
    pub async fn replace_metadata(
        conn: &mut PgConnection,
        id: DbId,
        values: &[MetadataValue],
    ) -> Result<(), sqlx::Error> {
        delete_fields(conn, FieldTable::Item, id).await?;
        insert_fields(conn, FieldTable::Item, id, values).await
    }

    /// Permanently delete an item. Fields, bundles, bitstreams, edges and
    /// collection mappings go with it through `ON DELETE CASCADE`.
    pub async fn hard_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Prefix every column of a comma-separated list with a table alias.
fn qualified(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|column| format!("{alias}.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
