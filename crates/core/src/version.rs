//! Version histories and the records that make up a chain.
//!
//! A [`VersionChain`] is an index-addressed view over the records of one
//! history, ordered newest first. Navigation is plain index arithmetic; no
//! record points at another.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Persisted header of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHistory {
    pub id: DbId,
    /// Highest sequence ever allocated in this history. Never decreases.
    pub last_version_number: i32,
    pub created_at: Timestamp,
}

/// One entry of a chain: a numbered pointer to a content snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: DbId,
    pub history_id: DbId,
    pub version_number: i32,
    pub item_id: DbId,
    pub creator_id: Option<DbId>,
    pub created_at: Timestamp,
    /// Free text, empty when none was given.
    pub summary: String,
}

/// Insert payload for a version record. The number has already been
/// allocated from the history counter.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub history_id: DbId,
    pub version_number: i32,
    pub item_id: DbId,
    pub creator_id: Option<DbId>,
    pub created_at: Timestamp,
    pub summary: String,
}

/// Records of one history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionChain {
    history_id: DbId,
    records: Vec<VersionRecord>,
}

impl VersionChain {
    /// Build a chain from records in any order.
    ///
    /// Fails with [`CoreError::IllegalState`] when a record belongs to a
    /// different history or two records share a sequence number.
    pub fn new(history_id: DbId, mut records: Vec<VersionRecord>) -> Result<Self, CoreError> {
        if let Some(stray) = records.iter().find(|r| r.history_id != history_id) {
            return Err(CoreError::IllegalState(format!(
                "Version {} belongs to history {}, not {history_id}",
                stray.id, stray.history_id
            )));
        }
        records.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        if let Some(pair) = records
            .windows(2)
            .find(|w| w[0].version_number == w[1].version_number)
        {
            return Err(CoreError::IllegalState(format!(
                "History {history_id} has two records numbered {}",
                pair[0].version_number
            )));
        }
        Ok(Self {
            history_id,
            records,
        })
    }

    pub fn history_id(&self) -> DbId {
        self.history_id
    }

    /// Records ordered by descending sequence number.
    pub fn records(&self) -> &[VersionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record with the highest sequence number.
    pub fn latest(&self) -> Option<&VersionRecord> {
        self.records.first()
    }

    /// Record with the lowest remaining sequence number.
    pub fn first(&self) -> Option<&VersionRecord> {
        self.records.last()
    }

    /// The record immediately older than `record`.
    pub fn previous(&self, record: &VersionRecord) -> Option<&VersionRecord> {
        let index = self.index_of(record)?;
        self.records.get(index + 1)
    }

    /// The record immediately newer than `record`.
    pub fn next(&self, record: &VersionRecord) -> Option<&VersionRecord> {
        let index = self.index_of(record)?;
        index.checked_sub(1).and_then(|i| self.records.get(i))
    }

    pub fn is_latest(&self, record: &VersionRecord) -> bool {
        self.latest().is_some_and(|latest| latest.id == record.id)
    }

    pub fn is_first(&self, record: &VersionRecord) -> bool {
        self.first().is_some_and(|first| first.id == record.id)
    }

    pub fn contains(&self, record: &VersionRecord) -> bool {
        self.index_of(record).is_some()
    }

    pub fn contains_item(&self, item_id: DbId) -> bool {
        self.find_by_item(item_id).is_some()
    }

    pub fn find_by_item(&self, item_id: DbId) -> Option<&VersionRecord> {
        self.records.iter().find(|r| r.item_id == item_id)
    }

    pub fn find_by_number(&self, version_number: i32) -> Option<&VersionRecord> {
        self.records
            .iter()
            .find(|r| r.version_number == version_number)
    }

    fn index_of(&self, record: &VersionRecord) -> Option<usize> {
        self.records.iter().position(|r| r.id == record.id)
    }
}
