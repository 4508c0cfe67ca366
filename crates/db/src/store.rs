//! PostgreSQL implementation of the persistence traits.
//!
//! A [`PgTransaction`] wraps one database transaction; dropping it without
//! committing rolls everything back.

use sqlx::{PgConnection, Postgres};
use strata_core::error::CoreError;
use strata_core::item::{Bitstream, BitstreamDraft, Collection, Item, ItemDraft};
use strata_core::metadata::MetadataValue;
use strata_core::relationship::{
    NewRelationship, NewRelationshipType, Relationship, RelationshipType, Side,
};
use strata_core::store::{
    CollectionStore, ItemStore, RelationshipStore, Store, Transaction, VersionStore,
};
use strata_core::types::{DbId, Timestamp};
use strata_core::version::{NewVersion, VersionHistory, VersionRecord};

use crate::error::classify;
use crate::repositories::{
    BitstreamRepo, CollectionRepo, ItemRepo, RelationshipRepo, VersionRepo,
};
use crate::DbPool;

/// Store backed by a connection pool. Clones share the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Store for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction, CoreError> {
        let tx = self.pool.begin().await.map_err(classify)?;
        Ok(PgTransaction { tx })
    }
}

pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

impl Transaction for PgTransaction {
    async fn commit(self) -> Result<(), CoreError> {
        self.tx.commit().await.map_err(classify)
    }
}

/// Turn a "rows affected" flag into `NotFound` for mutations of missing rows.
fn affected(updated: bool, entity: &'static str, id: DbId) -> Result<(), CoreError> {
    if updated {
        Ok(())
    } else {
        Err(CoreError::not_found(entity, id))
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

impl ItemStore for PgTransaction {
    async fn get_item(&mut self, id: DbId) -> Result<Option<Item>, CoreError> {
        let rows = ItemRepo::find_by_id(self.conn(), id)
            .await
            .map_err(classify)?;
        Ok(rows.map(|rows| rows.into_item()))
    }

    async fn create_item(&mut self, draft: ItemDraft) -> Result<Item, CoreError> {
        let id = ItemRepo::create(self.conn(), &draft)
            .await
            .map_err(classify)?;
        self.get_item(id)
            .await?
            .ok_or(CoreError::not_found("item", id))
    }

    async fn set_in_archive(&mut self, id: DbId, in_archive: bool) -> Result<(), CoreError> {
        let updated = ItemRepo::set_in_archive(self.conn(), id, in_archive)
            .await
            .map_err(classify)?;
        affected(updated, "item", id)
    }

    async fn set_handle(&mut self, id: DbId, handle: &str) -> Result<(), CoreError> {
        let updated = ItemRepo::set_handle(self.conn(), id, handle)
            .await
            .map_err(classify)?;
        affected(updated, "item", id)
    }

    async fn replace_metadata(
        &mut self,
        id: DbId,
        metadata: Vec<MetadataValue>,
    ) -> Result<(), CoreError> {
        let exists = ItemRepo::exists(self.conn(), id).await.map_err(classify)?;
        affected(exists, "item", id)?;
        ItemRepo::replace_metadata(self.conn(), id, &metadata)
            .await
            .map_err(classify)
    }

    async fn touch_item(&mut self, id: DbId, at: Timestamp) -> Result<(), CoreError> {
        let updated = ItemRepo::touch(self.conn(), id, at)
            .await
            .map_err(classify)?;
        affected(updated, "item", id)
    }

    async fn delete_item(&mut self, id: DbId) -> Result<(), CoreError> {
        let deleted = ItemRepo::hard_delete(self.conn(), id)
            .await
            .map_err(classify)?;
        affected(deleted, "item", id)
    }

    async fn add_bitstream(
        &mut self,
        bundle_id: DbId,
        draft: BitstreamDraft,
    ) -> Result<Bitstream, CoreError> {
        let exists = BitstreamRepo::bundle_exists(self.conn(), bundle_id)
            .await
            .map_err(classify)?;
        affected(exists, "bundle", bundle_id)?;
        let row = BitstreamRepo::append(self.conn(), bundle_id, &draft)
            .await
            .map_err(classify)?;
        Ok(row.into_bitstream(draft.metadata))
    }

    async fn replace_bitstream_metadata(
        &mut self,
        bitstream_id: DbId,
        metadata: Vec<MetadataValue>,
    ) -> Result<(), CoreError> {
        let exists = BitstreamRepo::exists(self.conn(), bitstream_id)
            .await
            .map_err(classify)?;
        affected(exists, "bitstream", bitstream_id)?;
        BitstreamRepo::replace_metadata(self.conn(), bitstream_id, &metadata)
            .await
            .map_err(classify)
    }

    async fn set_primary_bitstream(
        &mut self,
        bundle_id: DbId,
        bitstream_id: Option<DbId>,
    ) -> Result<(), CoreError> {
        let updated = BitstreamRepo::set_primary(self.conn(), bundle_id, bitstream_id)
            .await
            .map_err(classify)?;
        if updated {
            return Ok(());
        }
        let exists = BitstreamRepo::bundle_exists(self.conn(), bundle_id)
            .await
            .map_err(classify)?;
        affected(exists, "bundle", bundle_id)?;
        Err(CoreError::Validation(format!(
            "Bitstream {} is not part of bundle {bundle_id}",
            bitstream_id.unwrap_or_default()
        )))
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

impl CollectionStore for PgTransaction {
    async fn create_collection(&mut self, name: &str) -> Result<Collection, CoreError> {
        let row = CollectionRepo::create(self.conn(), name)
            .await
            .map_err(classify)?;
        Ok(row.into())
    }

    async fn get_collection(&mut self, id: DbId) -> Result<Option<Collection>, CoreError> {
        let row = CollectionRepo::find_by_id(self.conn(), id)
            .await
            .map_err(classify)?;
        Ok(row.map(Collection::from))
    }

    async fn add_to_collection(
        &mut self,
        collection_id: DbId,
        item_id: DbId,
    ) -> Result<(), CoreError> {
        if self.get_collection(collection_id).await?.is_none() {
            return Err(CoreError::not_found("collection", collection_id));
        }
        let exists = ItemRepo::exists(self.conn(), item_id)
            .await
            .map_err(classify)?;
        affected(exists, "item", item_id)?;
        CollectionRepo::add_item(self.conn(), collection_id, item_id)
            .await
            .map_err(classify)
    }

    async fn remove_from_collection(
        &mut self,
        collection_id: DbId,
        item_id: DbId,
    ) -> Result<bool, CoreError> {
        CollectionRepo::remove_item(self.conn(), collection_id, item_id)
            .await
            .map_err(classify)
    }

    async fn collections_of_item(&mut self, item_id: DbId) -> Result<Vec<DbId>, CoreError> {
        CollectionRepo::list_for_item(self.conn(), item_id)
            .await
            .map_err(classify)
    }
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

impl VersionStore for PgTransaction {
    async fn create_history(&mut self, created_at: Timestamp) -> Result<VersionHistory, CoreError> {
        let row = VersionRepo::create_history(self.conn(), created_at)
            .await
            .map_err(classify)?;
        Ok(row.into())
    }

    async fn get_history(&mut self, id: DbId) -> Result<Option<VersionHistory>, CoreError> {
        let row = VersionRepo::find_history(self.conn(), id)
            .await
            .map_err(classify)?;
        Ok(row.map(VersionHistory::from))
    }

    async fn allocate_version_number(&mut self, history_id: DbId) -> Result<i32, CoreError> {
        VersionRepo::allocate_number(self.conn(), history_id)
            .await
            .map_err(classify)?
            .ok_or(CoreError::not_found("version_history", history_id))
    }

    async fn insert_version(&mut self, version: NewVersion) -> Result<VersionRecord, CoreError> {
        if self.get_history(version.history_id).await?.is_none() {
            return Err(CoreError::not_found("version_history", version.history_id));
        }
        let row = VersionRepo::insert(self.conn(), &version)
            .await
            .map_err(classify)?;
        Ok(row.into())
    }

    async fn get_version(&mut self, id: DbId) -> Result<Option<VersionRecord>, CoreError> {
        let row = VersionRepo::find_by_id(self.conn(), id)
            .await
            .map_err(classify)?;
        Ok(row.map(VersionRecord::from))
    }

    async fn versions_by_item(&mut self, item_id: DbId) -> Result<Vec<VersionRecord>, CoreError> {
        let rows = VersionRepo::list_by_item(self.conn(), item_id)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(VersionRecord::from).collect())
    }

    async fn versions_by_history(
        &mut self,
        history_id: DbId,
    ) -> Result<Vec<VersionRecord>, CoreError> {
        let rows = VersionRepo::list_by_history(self.conn(), history_id)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(VersionRecord::from).collect())
    }

    async fn set_version_summary(&mut self, id: DbId, summary: &str) -> Result<(), CoreError> {
        let updated = VersionRepo::set_summary(self.conn(), id, summary)
            .await
            .map_err(classify)?;
        affected(updated, "version", id)
    }

    async fn delete_version(&mut self, id: DbId) -> Result<(), CoreError> {
        let deleted = VersionRepo::hard_delete(self.conn(), id)
            .await
            .map_err(classify)?;
        affected(deleted, "version", id)
    }

    async fn delete_history(&mut self, id: DbId) -> Result<(), CoreError> {
        let deleted = VersionRepo::delete_history(self.conn(), id)
            .await
            .map_err(classify)?;
        affected(deleted, "version_history", id)
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

impl RelationshipStore for PgTransaction {
    async fn create_relationship_type(
        &mut self,
        new: NewRelationshipType,
    ) -> Result<RelationshipType, CoreError> {
        let row = RelationshipRepo::create_type(self.conn(), &new)
            .await
            .map_err(classify)?;
        Ok(row.into())
    }

    async fn relationship_types(&mut self) -> Result<Vec<RelationshipType>, CoreError> {
        let rows = RelationshipRepo::list_types(self.conn())
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(RelationshipType::from).collect())
    }

    async fn find_relationship_type(
        &mut self,
        left_label: &str,
    ) -> Result<Option<RelationshipType>, CoreError> {
        let row = RelationshipRepo::find_type_by_left_label(self.conn(), left_label)
            .await
            .map_err(classify)?;
        Ok(row.map(RelationshipType::from))
    }

    async fn create_relationship(
        &mut self,
        new: NewRelationship,
    ) -> Result<Relationship, CoreError> {
        let type_exists = RelationshipRepo::type_exists(self.conn(), new.type_id)
            .await
            .map_err(classify)?;
        affected(type_exists, "relationship_type", new.type_id)?;
        for item_id in [new.left_item_id, new.right_item_id] {
            let exists = ItemRepo::exists(self.conn(), item_id)
                .await
                .map_err(classify)?;
            affected(exists, "item", item_id)?;
        }
        let row = RelationshipRepo::create(self.conn(), &new)
            .await
            .map_err(classify)?;
        Ok(row.into())
    }

    async fn get_relationship(&mut self, id: DbId) -> Result<Option<Relationship>, CoreError> {
        let row = RelationshipRepo::find_by_id(self.conn(), id)
            .await
            .map_err(classify)?;
        Ok(row.map(Relationship::from))
    }

    async fn relationships_of_item(
        &mut self,
        item_id: DbId,
        type_id: Option<DbId>,
    ) -> Result<Vec<Relationship>, CoreError> {
        let rows = RelationshipRepo::list_for_item(self.conn(), item_id, type_id)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Relationship::from).collect())
    }

    async fn set_latest(
        &mut self,
        relationship_id: DbId,
        side: Side,
        value: bool,
    ) -> Result<(), CoreError> {
        let updated = RelationshipRepo::set_latest(self.conn(), relationship_id, side, value)
            .await
            .map_err(classify)?;
        affected(updated, "relationship", relationship_id)
    }

    async fn delete_relationship(&mut self, id: DbId) -> Result<(), CoreError> {
        let deleted = RelationshipRepo::hard_delete(self.conn(), id)
            .await
            .map_err(classify)?;
        affected(deleted, "relationship", id)
    }
}
