//! Version history and version record rows.

use serde::Serialize;
use sqlx::FromRow;
use strata_core::types::{DbId, Timestamp};
use strata_core::version::{VersionHistory, VersionRecord};

/// A row from the `version_histories` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VersionHistoryRow {
    pub id: DbId,
    pub last_version_number: i32,
    pub created_at: Timestamp,
}

impl From<VersionHistoryRow> for VersionHistory {
    fn from(row: VersionHistoryRow) -> Self {
        Self {
            id: row.id,
            last_version_number: row.last_version_number,
            created_at: row.created_at,
        }
    }
}

/// A row from the `versions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VersionRow {
    pub id: DbId,
    pub history_id: DbId,
    pub version_number: i32,
    pub item_id: DbId,
    pub creator_id: Option<DbId>,
    pub created_at: Timestamp,
    pub summary: String,
}

impl From<VersionRow> for VersionRecord {
    fn from(row: VersionRow) -> Self {
        Self {
            id: row.id,
            history_id: row.history_id,
            version_number: row.version_number,
            item_id: row.item_id,
            creator_id: row.creator_id,
            created_at: row.created_at,
            summary: row.summary,
        }
    }
}
