//! Relationship type and relationship rows.

use serde::Serialize;
use sqlx::FromRow;
use strata_core::relationship::{Relationship, RelationshipType};
use strata_core::types::DbId;

/// A row from the `relationship_types` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RelationshipTypeRow {
    pub id: DbId,
    pub left_entity_type: Option<String>,
    pub right_entity_type: Option<String>,
    pub left_label: String,
    pub right_label: String,
}

impl From<RelationshipTypeRow> for RelationshipType {
    fn from(row: RelationshipTypeRow) -> Self {
        Self {
            id: row.id,
            left_entity_type: row.left_entity_type,
            right_entity_type: row.right_entity_type,
            left_label: row.left_label,
            right_label: row.right_label,
        }
    }
}

/// A row from the `relationships` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RelationshipRow {
    pub id: DbId,
    pub type_id: DbId,
    pub left_item_id: DbId,
    pub right_item_id: DbId,
    pub left_place: i32,
    pub right_place: i32,
    pub left_is_latest: bool,
    pub right_is_latest: bool,
}

impl From<RelationshipRow> for Relationship {
    fn from(row: RelationshipRow) -> Self {
        Self {
            id: row.id,
            type_id: row.type_id,
            left_item_id: row.left_item_id,
            right_item_id: row.right_item_id,
            left_place: row.left_place,
            right_place: row.right_place,
            left_is_latest: row.left_is_latest,
            right_is_latest: row.right_is_latest,
        }
    }
}
