//! Repository for `bitstreams`, `bitstream_metadata` and bundle primary
//! markers.

use sqlx::PgConnection;
use strata_core::item::BitstreamDraft;
use strata_core::metadata::MetadataValue;
use strata_core::types::DbId;

use crate::models::item::BitstreamRow;
use crate::repositories::item_repo::{delete_fields, insert_fields, FieldTable};

/// Column list shared across queries to avoid repetition.
pub const BITSTREAM_COLUMNS: &str = "id, bundle_id, name, storage_key, checksum, \
    checksum_algorithm, size_bytes, format, sequence";

pub struct BitstreamRepo;

impl BitstreamRepo {
    /// Insert a bitstream at an explicit position, with its fields.
    pub async fn insert(
        conn: &mut PgConnection,
        bundle_id: DbId,
        sequence: i32,
        draft: &BitstreamDraft,
    ) -> Result<BitstreamRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO bitstreams
                (bundle_id, name, storage_key, checksum, checksum_algorithm, size_bytes, format, sequence)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {BITSTREAM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BitstreamRow>(&query)
            .bind(bundle_id)
            .bind(&draft.name)
            .bind(&draft.storage_key)
            .bind(&draft.checksum)
            .bind(&draft.checksum_algorithm)
            .bind(draft.size_bytes)
            .bind(&draft.format)
            .bind(sequence)
            .fetch_one(&mut *conn)
            .await?;
        insert_fields(conn, FieldTable::Bitstream, row.id, &draft.metadata).await?;
        Ok(row)
    }

    /// Insert a bitstream after the last one of the bundle.
    pub async fn append(
        conn: &mut PgConnection,
        bundle_id: DbId,
        draft: &BitstreamDraft,
    ) -> Result<BitstreamRow, sqlx::Error> {
        let row: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sequence) + 1, 0) FROM bitstreams WHERE bundle_id = $1",
        )
        .bind(bundle_id)
        .fetch_one(&mut *conn)
        .await?;
        Self::insert(conn, bundle_id, row.0, draft).await
    }

    pub async fn exists(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM bitstreams WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(row.0)
    }

    pub async fn bundle_exists(conn: &mut PgConnection, bundle_id: DbId) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM bundles WHERE id = $1)")
            .bind(bundle_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }

    /// Swap every field of one bitstream for `values`.
    pub async fn replace_metadata(
        conn: &mut PgConnection,
        id: DbId,
        values: &[MetadataValue],
    ) -> Result<(), sqlx::Error> {
        delete_fields(conn, FieldTable::Bitstream, id).await?;
        insert_fields(conn, FieldTable::Bitstream, id, values).await
    }

    /// Point the bundle's primary marker at `bitstream_id`, or clear it.
    ///
    /// Returns `false` if the bundle does not exist or the bitstream is not
    /// part of it.
    pub async fn set_primary(
        conn: &mut PgConnection,
        bundle_id: DbId,
        bitstream_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bundles SET primary_bitstream_id = $2
             WHERE id = $1
               AND ($2::BIGINT IS NULL
                    OR EXISTS (SELECT 1 FROM bitstreams WHERE id = $2 AND bundle_id = $1))",
        )
        .bind(bundle_id)
        .bind(bitstream_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
