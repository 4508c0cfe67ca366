//! In-memory implementation of the persistence traits.
//!
//! Not durable. Each transaction works on a private copy of the state and
//! publishes it on commit when nobody else committed in between; otherwise
//! the commit fails with [`CoreError::Conflict`]. Used by tests and local
//! tooling.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::error::CoreError;
use crate::item::{Bitstream, BitstreamDraft, Bundle, Collection, Item, ItemDraft};
use crate::metadata::MetadataValue;
use crate::relationship::{
    NewRelationship, NewRelationshipType, Relationship, RelationshipType, Side,
};
use crate::store::{
    CollectionStore, ItemStore, RelationshipStore, Store, Transaction, VersionStore,
};
use crate::types::{DbId, Timestamp};
use crate::version::{NewVersion, VersionHistory, VersionRecord};

#[derive(Debug, Clone, Default)]
struct State {
    revision: u64,
    last_id: DbId,
    items: BTreeMap<DbId, Item>,
    collections: BTreeMap<DbId, Collection>,
    /// `(collection_id, item_id)` pairs.
    mappings: BTreeSet<(DbId, DbId)>,
    histories: BTreeMap<DbId, VersionHistory>,
    versions: BTreeMap<DbId, VersionRecord>,
    relationship_types: BTreeMap<DbId, RelationshipType>,
    relationships: BTreeMap<DbId, Relationship>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }

    fn item_mut(&mut self, id: DbId) -> Result<&mut Item, CoreError> {
        self.items
            .get_mut(&id)
            .ok_or(CoreError::not_found("item", id))
    }

    fn bundle_mut(&mut self, bundle_id: DbId) -> Result<&mut Bundle, CoreError> {
        self.items
            .values_mut()
            .flat_map(|item| item.bundles.iter_mut())
            .find(|bundle| bundle.id == bundle_id)
            .ok_or(CoreError::not_found("bundle", bundle_id))
    }

    fn bitstream_mut(&mut self, bitstream_id: DbId) -> Result<&mut Bitstream, CoreError> {
        self.items
            .values_mut()
            .flat_map(|item| item.bundles.iter_mut())
            .flat_map(|bundle| bundle.bitstreams.iter_mut())
            .find(|bitstream| bitstream.id == bitstream_id)
            .ok_or(CoreError::not_found("bitstream", bitstream_id))
    }
}

/// Shared in-memory store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, CoreError> {
        lock_state(&self.shared)
    }
}

fn lock_state(shared: &Mutex<State>) -> Result<MutexGuard<'_, State>, CoreError> {
    shared
        .lock()
        .map_err(|e| CoreError::storage(format!("memory store mutex poisoned: {e}")))
}

impl Store for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, CoreError> {
        let state = self.lock()?.clone();
        Ok(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            base_revision: state.revision,
            state,
        })
    }
}

/// A private working copy of the store state.
#[derive(Debug)]
pub struct MemoryTransaction {
    shared: Arc<Mutex<State>>,
    base_revision: u64,
    state: State,
}

impl Transaction for MemoryTransaction {
    async fn commit(mut self) -> Result<(), CoreError> {
        let mut shared = lock_state(&self.shared)?;
        if shared.revision != self.base_revision {
            return Err(CoreError::Conflict(format!(
                "store changed since revision {} (now {})",
                self.base_revision, shared.revision
            )));
        }
        self.state.revision = self.base_revision + 1;
        *shared = std::mem::take(&mut self.state);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

impl ItemStore for MemoryTransaction {
    async fn get_item(&mut self, id: DbId) -> Result<Option<Item>, CoreError> {
        Ok(self.state.items.get(&id).cloned())
    }

    async fn create_item(&mut self, draft: ItemDraft) -> Result<Item, CoreError> {
        let state = &mut self.state;
        let item_id = state.next_id();
        let mut bundles = Vec::with_capacity(draft.bundles.len());
        for bundle_draft in draft.bundles {
            let bundle_id = state.next_id();
            let mut bitstreams = Vec::with_capacity(bundle_draft.bitstreams.len());
            for (sequence, bitstream) in bundle_draft.bitstreams.into_iter().enumerate() {
                let id = state.next_id();
                bitstreams.push(materialize(id, bundle_id, sequence as i32, bitstream));
            }
            let primary_bitstream_id = bundle_draft
                .primary_index
                .and_then(|index| bitstreams.get(index))
                .map(|b: &Bitstream| b.id);
            bundles.push(Bundle {
                id: bundle_id,
                item_id,
                name: bundle_draft.name,
                primary_bitstream_id,
                bitstreams,
            });
        }
        let item = Item {
            id: item_id,
            handle: None,
            in_archive: draft.in_archive,
            withdrawn: draft.withdrawn,
            discoverable: draft.discoverable,
            owning_collection_id: draft.owning_collection_id,
            submitter_id: draft.submitter_id,
            last_modified: Utc::now(),
            metadata: draft.metadata,
            bundles,
        };
        state.items.insert(item_id, item.clone());
        Ok(item)
    }

    async fn set_in_archive(&mut self, id: DbId, in_archive: bool) -> Result<(), CoreError> {
        self.state.item_mut(id)?.in_archive = in_archive;
        Ok(())
    }

    async fn set_handle(&mut self, id: DbId, handle: &str) -> Result<(), CoreError> {
        self.state.item_mut(id)?.handle = Some(handle.to_string());
        Ok(())
    }

    async fn replace_metadata(
        &mut self,
        id: DbId,
        metadata: Vec<MetadataValue>,
    ) -> Result<(), CoreError> {
        self.state.item_mut(id)?.metadata = metadata;
        Ok(())
    }

    async fn touch_item(&mut self, id: DbId, at: Timestamp) -> Result<(), CoreError> {
        self.state.item_mut(id)?.last_modified = at;
        Ok(())
    }

    async fn delete_item(&mut self, id: DbId) -> Result<(), CoreError> {
        let state = &mut self.state;
        if state.items.remove(&id).is_none() {
            return Err(CoreError::not_found("item", id));
        }
        state.mappings.retain(|(_, item_id)| *item_id != id);
        state
            .relationships
            .retain(|_, r| r.left_item_id != id && r.right_item_id != id);
        Ok(())
    }

    async fn add_bitstream(
        &mut self,
        bundle_id: DbId,
        draft: BitstreamDraft,
    ) -> Result<Bitstream, CoreError> {
        let id = self.state.next_id();
        let bundle = self.state.bundle_mut(bundle_id)?;
        let sequence = bundle
            .bitstreams
            .iter()
            .map(|b| b.sequence + 1)
            .max()
            .unwrap_or(0);
        let bitstream = materialize(id, bundle_id, sequence, draft);
        bundle.bitstreams.push(bitstream.clone());
        Ok(bitstream)
    }

    async fn replace_bitstream_metadata(
        &mut self,
        bitstream_id: DbId,
        metadata: Vec<MetadataValue>,
    ) -> Result<(), CoreError> {
        self.state.bitstream_mut(bitstream_id)?.metadata = metadata;
        Ok(())
    }

    async fn set_primary_bitstream(
        &mut self,
        bundle_id: DbId,
        bitstream_id: Option<DbId>,
    ) -> Result<(), CoreError> {
        let bundle = self.state.bundle_mut(bundle_id)?;
        if let Some(id) = bitstream_id {
            if !bundle.bitstreams.iter().any(|b| b.id == id) {
                return Err(CoreError::Validation(format!(
                    "Bitstream {id} is not part of bundle {bundle_id}"
                )));
            }
        }
        bundle.primary_bitstream_id = bitstream_id;
        Ok(())
    }
}

fn materialize(id: DbId, bundle_id: DbId, sequence: i32, draft: BitstreamDraft) -> Bitstream {
    Bitstream {
        id,
        bundle_id,
        name: draft.name,
        storage_key: draft.storage_key,
        checksum: draft.checksum,
        checksum_algorithm: draft.checksum_algorithm,
        size_bytes: draft.size_bytes,
        format: draft.format,
        sequence,
        metadata: draft.metadata,
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

impl CollectionStore for MemoryTransaction {
    async fn create_collection(&mut self, name: &str) -> Result<Collection, CoreError> {
        let collection = Collection {
            id: self.state.next_id(),
            name: name.to_string(),
        };
        self.state
            .collections
            .insert(collection.id, collection.clone());
        Ok(collection)
    }

    async fn get_collection(&mut self, id: DbId) -> Result<Option<Collection>, CoreError> {
        Ok(self.state.collections.get(&id).cloned())
    }

    async fn add_to_collection(
        &mut self,
        collection_id: DbId,
        item_id: DbId,
    ) -> Result<(), CoreError> {
        if !self.state.collections.contains_key(&collection_id) {
            return Err(CoreError::not_found("collection", collection_id));
        }
        if !self.state.items.contains_key(&item_id) {
            return Err(CoreError::not_found("item", item_id));
        }
        self.state.mappings.insert((collection_id, item_id));
        Ok(())
    }

    async fn remove_from_collection(
        &mut self,
        collection_id: DbId,
        item_id: DbId,
    ) -> Result<bool, CoreError> {
        Ok(self.state.mappings.remove(&(collection_id, item_id)))
    }

    async fn collections_of_item(&mut self, item_id: DbId) -> Result<Vec<DbId>, CoreError> {
        Ok(self
            .state
            .mappings
            .iter()
            .filter(|(_, item)| *item == item_id)
            .map(|(collection, _)| *collection)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

impl VersionStore for MemoryTransaction {
    async fn create_history(&mut self, created_at: Timestamp) -> Result<VersionHistory, CoreError> {
        let history = VersionHistory {
            id: self.state.next_id(),
            last_version_number: 0,
            created_at,
        };
        self.state.histories.insert(history.id, history.clone());
        Ok(history)
    }

    async fn get_history(&mut self, id: DbId) -> Result<Option<VersionHistory>, CoreError> {
        Ok(self.state.histories.get(&id).cloned())
    }

    async fn allocate_version_number(&mut self, history_id: DbId) -> Result<i32, CoreError> {
        let history = self
            .state
            .histories
            .get_mut(&history_id)
            .ok_or(CoreError::not_found("version_history", history_id))?;
        history.last_version_number += 1;
        Ok(history.last_version_number)
    }

    async fn insert_version(&mut self, version: NewVersion) -> Result<VersionRecord, CoreError> {
        if !self.state.histories.contains_key(&version.history_id) {
            return Err(CoreError::not_found("version_history", version.history_id));
        }
        let clash = self.state.versions.values().any(|r| {
            r.history_id == version.history_id && r.version_number == version.version_number
        });
        if clash {
            return Err(CoreError::Conflict(format!(
                "version {} already exists in history {}",
                version.version_number, version.history_id
            )));
        }
        let record = VersionRecord {
            id: self.state.next_id(),
            history_id: version.history_id,
            version_number: version.version_number,
            item_id: version.item_id,
            creator_id: version.creator_id,
            created_at: version.created_at,
            summary: version.summary,
        };
        self.state.versions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_version(&mut self, id: DbId) -> Result<Option<VersionRecord>, CoreError> {
        Ok(self.state.versions.get(&id).cloned())
    }

    async fn versions_by_item(&mut self, item_id: DbId) -> Result<Vec<VersionRecord>, CoreError> {
        Ok(self
            .state
            .versions
            .values()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn versions_by_history(
        &mut self,
        history_id: DbId,
    ) -> Result<Vec<VersionRecord>, CoreError> {
        let mut records: Vec<VersionRecord> = self
            .state
            .versions
            .values()
            .filter(|r| r.history_id == history_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(records)
    }

    async fn set_version_summary(&mut self, id: DbId, summary: &str) -> Result<(), CoreError> {
        let record = self
            .state
            .versions
            .get_mut(&id)
            .ok_or(CoreError::not_found("version", id))?;
        record.summary = summary.to_string();
        Ok(())
    }

    async fn delete_version(&mut self, id: DbId) -> Result<(), CoreError> {
        self.state
            .versions
            .remove(&id)
            .map(|_| ())
            .ok_or(CoreError::not_found("version", id))
    }

    async fn delete_history(&mut self, id: DbId) -> Result<(), CoreError> {
        if self.state.histories.remove(&id).is_none() {
            return Err(CoreError::not_found("version_history", id));
        }
        self.state.versions.retain(|_, r| r.history_id != id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

impl RelationshipStore for MemoryTransaction {
    async fn create_relationship_type(
        &mut self,
        new: NewRelationshipType,
    ) -> Result<RelationshipType, CoreError> {
        let relationship_type = RelationshipType {
            id: self.state.next_id(),
            left_entity_type: new.left_entity_type,
            right_entity_type: new.right_entity_type,
            left_label: new.left_label,
            right_label: new.right_label,
        };
        self.state
            .relationship_types
            .insert(relationship_type.id, relationship_type.clone());
        Ok(relationship_type)
    }

    async fn relationship_types(&mut self) -> Result<Vec<RelationshipType>, CoreError> {
        Ok(self.state.relationship_types.values().cloned().collect())
    }

    async fn find_relationship_type(
        &mut self,
        left_label: &str,
    ) -> Result<Option<RelationshipType>, CoreError> {
        Ok(self
            .state
            .relationship_types
            .values()
            .find(|t| t.left_label == left_label)
            .cloned())
    }

    async fn create_relationship(
        &mut self,
        new: NewRelationship,
    ) -> Result<Relationship, CoreError> {
        if !self.state.relationship_types.contains_key(&new.type_id) {
            return Err(CoreError::not_found("relationship_type", new.type_id));
        }
        for item_id in [new.left_item_id, new.right_item_id] {
            if !self.state.items.contains_key(&item_id) {
                return Err(CoreError::not_found("item", item_id));
            }
        }
        let relationship = Relationship {
            id: self.state.next_id(),
            type_id: new.type_id,
            left_item_id: new.left_item_id,
            right_item_id: new.right_item_id,
            left_place: new.left_place,
            right_place: new.right_place,
            left_is_latest: new.left_is_latest,
            right_is_latest: new.right_is_latest,
        };
        self.state
            .relationships
            .insert(relationship.id, relationship.clone());
        Ok(relationship)
    }

    async fn get_relationship(&mut self, id: DbId) -> Result<Option<Relationship>, CoreError> {
        Ok(self.state.relationships.get(&id).cloned())
    }

    async fn relationships_of_item(
        &mut self,
        item_id: DbId,
        type_id: Option<DbId>,
    ) -> Result<Vec<Relationship>, CoreError> {
        Ok(self
            .state
            .relationships
            .values()
            .filter(|r| r.left_item_id == item_id || r.right_item_id == item_id)
            .filter(|r| type_id.map_or(true, |t| r.type_id == t))
            .cloned()
            .collect())
    }

    async fn set_latest(
        &mut self,
        relationship_id: DbId,
        side: Side,
        value: bool,
    ) -> Result<(), CoreError> {
        self.state
            .relationships
            .get_mut(&relationship_id)
            .ok_or(CoreError::not_found("relationship", relationship_id))?
            .set_latest(side, value);
        Ok(())
    }

    async fn delete_relationship(&mut self, id: DbId) -> Result<(), CoreError> {
        self.state
            .relationships
            .remove(&id)
            .map(|_| ())
            .ok_or(CoreError::not_found("relationship", id))
    }
}
