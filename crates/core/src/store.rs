//! Persistence traits.
//!
//! Every mutation happens inside a [`Transaction`]. Dropping a transaction
//! without calling [`Transaction::commit`] discards all of its writes.
//! Lookups return `Ok(None)` for missing rows; mutations of missing rows
//! return [`CoreError::NotFound`].

use std::future::Future;

use crate::error::CoreError;
use crate::item::{Bitstream, BitstreamDraft, Collection, Item, ItemDraft};
use crate::metadata::MetadataValue;
use crate::relationship::{
    NewRelationship, NewRelationshipType, Relationship, RelationshipType, Side,
};
use crate::types::{DbId, Timestamp};
use crate::version::{NewVersion, VersionHistory, VersionRecord};

/// Items together with their fields, bundles and bitstreams.
pub trait ItemStore {
    /// Load an item with its fields and containers.
    fn get_item(
        &mut self,
        id: DbId,
    ) -> impl Future<Output = Result<Option<Item>, CoreError>> + Send;

    /// Store a draft and everything it contains.
    fn create_item(
        &mut self,
        draft: ItemDraft,
    ) -> impl Future<Output = Result<Item, CoreError>> + Send;

    fn set_in_archive(
        &mut self,
        id: DbId,
        in_archive: bool,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn set_handle(
        &mut self,
        id: DbId,
        handle: &str,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Replace every item-level field.
    fn replace_metadata(
        &mut self,
        id: DbId,
        metadata: Vec<MetadataValue>,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Set `last_modified`.
    fn touch_item(
        &mut self,
        id: DbId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Delete an item together with its containers, bitstreams, edges and
    /// collection mappings.
    fn delete_item(&mut self, id: DbId) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Append a bitstream at the end of a bundle.
    fn add_bitstream(
        &mut self,
        bundle_id: DbId,
        draft: BitstreamDraft,
    ) -> impl Future<Output = Result<Bitstream, CoreError>> + Send;

    fn replace_bitstream_metadata(
        &mut self,
        bitstream_id: DbId,
        metadata: Vec<MetadataValue>,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn set_primary_bitstream(
        &mut self,
        bundle_id: DbId,
        bitstream_id: Option<DbId>,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Collections and the item mappings inside them.
pub trait CollectionStore {
    fn create_collection(
        &mut self,
        name: &str,
    ) -> impl Future<Output = Result<Collection, CoreError>> + Send;

    fn get_collection(
        &mut self,
        id: DbId,
    ) -> impl Future<Output = Result<Option<Collection>, CoreError>> + Send;

    /// Map an item into a collection. Mapping twice is a no-op.
    fn add_to_collection(
        &mut self,
        collection_id: DbId,
        item_id: DbId,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Returns `false` when the item was not mapped there.
    fn remove_from_collection(
        &mut self,
        collection_id: DbId,
        item_id: DbId,
    ) -> impl Future<Output = Result<bool, CoreError>> + Send;

    fn collections_of_item(
        &mut self,
        item_id: DbId,
    ) -> impl Future<Output = Result<Vec<DbId>, CoreError>> + Send;
}

/// Version histories and records.
pub trait VersionStore {
    fn create_history(
        &mut self,
        created_at: Timestamp,
    ) -> impl Future<Output = Result<VersionHistory, CoreError>> + Send;

    fn get_history(
        &mut self,
        id: DbId,
    ) -> impl Future<Output = Result<Option<VersionHistory>, CoreError>> + Send;

    /// Increment the history counter and return the new value.
    fn allocate_version_number(
        &mut self,
        history_id: DbId,
    ) -> impl Future<Output = Result<i32, CoreError>> + Send;

    fn insert_version(
        &mut self,
        version: NewVersion,
    ) -> impl Future<Output = Result<VersionRecord, CoreError>> + Send;

    fn get_version(
        &mut self,
        id: DbId,
    ) -> impl Future<Output = Result<Option<VersionRecord>, CoreError>> + Send;

    fn versions_by_item(
        &mut self,
        item_id: DbId,
    ) -> impl Future<Output = Result<Vec<VersionRecord>, CoreError>> + Send;

    fn versions_by_history(
        &mut self,
        history_id: DbId,
    ) -> impl Future<Output = Result<Vec<VersionRecord>, CoreError>> + Send;

    fn set_version_summary(
        &mut self,
        id: DbId,
        summary: &str,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn delete_version(&mut self, id: DbId) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn delete_history(&mut self, id: DbId) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Relationship types and edges.
pub trait RelationshipStore {
    fn create_relationship_type(
        &mut self,
        new: NewRelationshipType,
    ) -> impl Future<Output = Result<RelationshipType, CoreError>> + Send;

    fn relationship_types(
        &mut self,
    ) -> impl Future<Output = Result<Vec<RelationshipType>, CoreError>> + Send;

    /// Look a type up by its left-to-right label.
    fn find_relationship_type(
        &mut self,
        left_label: &str,
    ) -> impl Future<Output = Result<Option<RelationshipType>, CoreError>> + Send;

    fn create_relationship(
        &mut self,
        new: NewRelationship,
    ) -> impl Future<Output = Result<Relationship, CoreError>> + Send;

    fn get_relationship(
        &mut self,
        id: DbId,
    ) -> impl Future<Output = Result<Option<Relationship>, CoreError>> + Send;

    /// Edges touching `item_id` on either side, optionally of one type.
    fn relationships_of_item(
        &mut self,
        item_id: DbId,
        type_id: Option<DbId>,
    ) -> impl Future<Output = Result<Vec<Relationship>, CoreError>> + Send;

    fn set_latest(
        &mut self,
        relationship_id: DbId,
        side: Side,
        value: bool,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn delete_relationship(
        &mut self,
        id: DbId,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// One atomic unit of persistence work.
pub trait Transaction:
    ItemStore + CollectionStore + VersionStore + RelationshipStore + Send
{
    /// Make every write of this transaction visible.
    ///
    /// Fails with [`CoreError::Conflict`] when a concurrent writer got there
    /// first; the whole operation can then be retried.
    fn commit(self) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Entry point to a persistence backend.
pub trait Store: Send + Sync {
    type Tx: Transaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, CoreError>> + Send;
}
