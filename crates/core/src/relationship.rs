//! Typed edges between items and the latest-flag propagation rules.
//!
//! Every edge carries one latest flag per side. When a new snapshot of an
//! item is published, [`plan_latest_flags`] works out which flags have to
//! move from the previous snapshot's edges to the new snapshot's edges.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Default label of the edge linking a correction working copy to the item
/// it corrects.
pub const CORRECTION_RELATIONSHIP_TYPE: &str = "isCorrectionOfItem";

/// Reverse label of [`CORRECTION_RELATIONSHIP_TYPE`].
pub const CORRECTED_BY_LABEL: &str = "isCorrectedByItem";

// ---------------------------------------------------------------------------
// Types and edges
// ---------------------------------------------------------------------------

/// Schema of an edge: which entity types it connects and how each direction
/// is labelled. `None` as entity type accepts items of any type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipType {
    pub id: DbId,
    pub left_entity_type: Option<String>,
    pub right_entity_type: Option<String>,
    pub left_label: String,
    pub right_label: String,
}

impl RelationshipType {
    /// `true` when either side expects the given entity type.
    pub fn involves_entity_type(&self, entity_type: &str) -> bool {
        self.left_entity_type.as_deref() == Some(entity_type)
            || self.right_entity_type.as_deref() == Some(entity_type)
    }
}

/// Insert payload for a relationship type.
#[derive(Debug, Clone)]
pub struct NewRelationshipType {
    pub left_entity_type: Option<String>,
    pub right_entity_type: Option<String>,
    pub left_label: String,
    pub right_label: String,
}

/// The two ends of a directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Directed typed edge `(left, type, right)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: DbId,
    pub type_id: DbId,
    pub left_item_id: DbId,
    pub right_item_id: DbId,
    pub left_place: i32,
    pub right_place: i32,
    pub left_is_latest: bool,
    pub right_is_latest: bool,
}

impl Relationship {
    /// Which side `item_id` occupies.
    ///
    /// An item on neither side, or on both, makes the side ambiguous and is
    /// reported as [`CoreError::IllegalState`].
    pub fn side_of(&self, item_id: DbId) -> Result<Side, CoreError> {
        match (self.left_item_id == item_id, self.right_item_id == item_id) {
            (true, false) => Ok(Side::Left),
            (false, true) => Ok(Side::Right),
            (true, true) => Err(CoreError::IllegalState(format!(
                "Item {item_id} is on both sides of relationship {}",
                self.id
            ))),
            (false, false) => Err(CoreError::IllegalState(format!(
                "Item {item_id} is not part of relationship {}",
                self.id
            ))),
        }
    }

    pub fn item_on(&self, side: Side) -> DbId {
        match side {
            Side::Left => self.left_item_id,
            Side::Right => self.right_item_id,
        }
    }

    pub fn place_on(&self, side: Side) -> i32 {
        match side {
            Side::Left => self.left_place,
            Side::Right => self.right_place,
        }
    }

    pub fn is_latest(&self, side: Side) -> bool {
        match side {
            Side::Left => self.left_is_latest,
            Side::Right => self.right_is_latest,
        }
    }

    pub fn set_latest(&mut self, side: Side, value: bool) {
        match side {
            Side::Left => self.left_is_latest = value,
            Side::Right => self.right_is_latest = value,
        }
    }

    /// Copy of this edge with `side` moved to `item_id`. The moved side is
    /// not latest; the other side keeps its flag.
    pub fn copy_onto(&self, side: Side, item_id: DbId) -> NewRelationship {
        let mut copy = NewRelationship {
            type_id: self.type_id,
            left_item_id: self.left_item_id,
            right_item_id: self.right_item_id,
            left_place: self.left_place,
            right_place: self.right_place,
            left_is_latest: self.left_is_latest,
            right_is_latest: self.right_is_latest,
        };
        match side {
            Side::Left => {
                copy.left_item_id = item_id;
                copy.left_is_latest = false;
            }
            Side::Right => {
                copy.right_item_id = item_id;
                copy.right_is_latest = false;
            }
        }
        copy
    }
}

/// Insert payload for an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelationship {
    pub type_id: DbId,
    pub left_item_id: DbId,
    pub right_item_id: DbId,
    pub left_place: i32,
    pub right_place: i32,
    pub left_is_latest: bool,
    pub right_is_latest: bool,
}

impl NewRelationship {
    /// An edge with both sides latest at place 0.
    pub fn between(type_id: DbId, left_item_id: DbId, right_item_id: DbId) -> Self {
        Self {
            type_id,
            left_item_id,
            right_item_id,
            left_place: 0,
            right_place: 0,
            left_is_latest: true,
            right_is_latest: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Latest-flag propagation
// ---------------------------------------------------------------------------

/// Find the edge of `latest_id` that mirrors `edge` of the previous snapshot:
/// same type, same endpoint on the opposite side, `latest_id` on `side`.
///
/// More than one candidate is [`CoreError::IllegalState`].
pub fn find_counterpart<'a>(
    edge: &Relationship,
    side: Side,
    latest_id: DbId,
    latest_edges: &'a [Relationship],
) -> Result<Option<&'a Relationship>, CoreError> {
    let other = side.opposite();
    let mut matches = latest_edges.iter().filter(|candidate| {
        candidate.type_id == edge.type_id
            && candidate.item_on(side) == latest_id
            && candidate.item_on(other) == edge.item_on(other)
    });
    let first = matches.next();
    if let Some(extra) = matches.next() {
        return Err(CoreError::IllegalState(format!(
            "Item {latest_id} has more than one relationship matching {} (found {} and {})",
            edge.id,
            first.map(|r| r.id).unwrap_or_default(),
            extra.id
        )));
    }
    Ok(first)
}

/// One latest-flag assignment on one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagChange {
    pub relationship_id: DbId,
    pub side: Side,
    pub value: bool,
    /// Both endpoints of the edge; each needs reindexing.
    pub endpoints: [DbId; 2],
}

/// Compute the flag changes that hand latest status from `previous_id` to
/// `latest_id` for the given edges of one relationship type.
///
/// For every edge of the previous snapshot:
/// - when the opposite side is latest, the previous snapshot's side is
///   cleared;
/// - the mirrored edge of the new snapshot, if any, gets its side set.
///
/// Flags that already hold their target value produce no change.
pub fn plan_latest_flags(
    previous_id: DbId,
    latest_id: DbId,
    previous_edges: &[Relationship],
    latest_edges: &[Relationship],
) -> Result<Vec<FlagChange>, CoreError> {
    let mut changes = Vec::new();
    for edge in previous_edges {
        let side = edge.side_of(previous_id)?;
        let endpoints = [edge.left_item_id, edge.right_item_id];

        if edge.is_latest(side.opposite()) && edge.is_latest(side) {
            changes.push(FlagChange {
                relationship_id: edge.id,
                side,
                value: false,
                endpoints,
            });
        }

        let mirror = find_counterpart(edge, side, latest_id, latest_edges)?;
        if let Some(mirror) = mirror.filter(|m| !m.is_latest(side)) {
            changes.push(FlagChange {
                relationship_id: mirror.id,
                side,
                value: true,
                endpoints: [mirror.left_item_id, mirror.right_item_id],
            });
        }
    }
    Ok(changes)
}
