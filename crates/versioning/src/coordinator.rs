//! Multi-step version operations, each in a single store transaction.
//!
//! Infrastructure failures surface as [`CoreError::OperationFailed`] naming
//! the operation; domain errors (`NotFound`, `IllegalState`, `Validation`,
//! `Conflict`) pass through unchanged. A failed operation never commits.

use std::sync::Arc;

use chrono::Utc;
use strata_core::cloner::ContentCloner;
use strata_core::error::CoreError;
use strata_core::services::IdentifierService;
use strata_core::store::{
    CollectionStore, ItemStore, RelationshipStore, Store, Transaction, VersionStore,
};
use strata_core::types::DbId;
use strata_core::version::{VersionChain, VersionRecord};

use crate::config::VersioningConfig;
use crate::registry::VersionRegistry;

/// Outcome of [`VersioningCoordinator::remove_version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// No record with that id exists.
    NothingToDo,
    Removed {
        chain_deleted: bool,
        /// Item of the predecessor that was made live again, when the
        /// removed record was the latest one.
        reinstated: Option<DbId>,
    },
}

/// Outcome of [`VersioningCoordinator::restore_version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Restoring a version is not supported; nothing was changed.
    Unsupported,
}

pub struct VersioningCoordinator<S> {
    store: S,
    cloner: ContentCloner,
    identifiers: Arc<dyn IdentifierService>,
    correction_type: String,
}

impl<S: Store> VersioningCoordinator<S> {
    pub fn new(
        store: S,
        config: &VersioningConfig,
        identifiers: Arc<dyn IdentifierService>,
    ) -> Self {
        Self {
            store,
            cloner: ContentCloner::new(config.ignored_metadata.clone()),
            identifiers,
            correction_type: config.correction_relationship_type.clone(),
        }
    }

    /// Create a new, not yet live version of `item_id`.
    ///
    /// The first call for an unversioned item also creates its history,
    /// seeded with a record for the item itself. Fails with
    /// [`CoreError::PreconditionFailed`] while the newest version of the
    /// history is still an uninstalled draft.
    pub async fn create_new_version(
        &self,
        item_id: DbId,
        summary: Option<&str>,
        actor_id: Option<DbId>,
    ) -> Result<VersionRecord, CoreError> {
        const OP: &str = "create_new_version";
        let mut tx = self.store.begin().await.map_err(|e| e.within(OP))?;
        let record = self
            .create_in(&mut tx, item_id, summary.unwrap_or_default(), actor_id)
            .await
            .map_err(|e| e.within(OP))?;
        tx.commit().await.map_err(|e| e.within(OP))?;
        tracing::info!(
            item_id,
            new_item_id = record.item_id,
            version_id = record.id,
            history_id = record.history_id,
            version_number = record.version_number,
            "New version created"
        );
        Ok(record)
    }

    async fn create_in(
        &self,
        tx: &mut S::Tx,
        item_id: DbId,
        summary: &str,
        actor_id: Option<DbId>,
    ) -> Result<VersionRecord, CoreError> {
        let item = tx
            .get_item(item_id)
            .await?
            .ok_or(CoreError::not_found("item", item_id))?;
        let now = Utc::now();

        let history_id = match VersionRegistry::find_by_item(tx, item_id).await? {
            Some(record) => {
                let chain = VersionRegistry::list_by_chain(tx, record.history_id).await?;
                if let Some(draft) = self.draft_of(tx, &chain).await? {
                    return Err(CoreError::PreconditionFailed(format!(
                        "History {} already has an uninstalled version {} (item {})",
                        chain.history_id(),
                        draft.version_number,
                        draft.item_id
                    )));
                }
                record.history_id
            }
            None => {
                let seeded_at = item.accession_date().unwrap_or(now);
                let seed = VersionRegistry::create(
                    tx,
                    None,
                    item_id,
                    "",
                    item.submitter_id,
                    seeded_at,
                )
                .await?;
                tracing::debug!(item_id, history_id = seed.history_id, "History seeded");
                seed.history_id
            }
        };

        let mut draft = self.cloner.clone_item(&item);
        if actor_id.is_some() {
            draft.submitter_id = actor_id;
        }
        let new_item = tx.create_item(draft).await?;

        let correction_type = tx
            .find_relationship_type(&self.correction_type)
            .await?
            .map(|t| t.id);
        for edge in tx.relationships_of_item(item_id, None).await? {
            if Some(edge.type_id) == correction_type {
                continue;
            }
            let side = edge.side_of(item_id)?;
            let copy = tx.create_relationship(edge.copy_onto(side, new_item.id)).await?;
            tracing::debug!(
                relationship_id = edge.id,
                copy_id = copy.id,
                new_item_id = new_item.id,
                "Relationship copied to new version"
            );
        }

        let record =
            VersionRegistry::create(tx, Some(history_id), new_item.id, summary, actor_id, now)
                .await?;

        let handle = self.identifiers.reserve(new_item.id).await?;
        tx.set_handle(new_item.id, &handle).await?;
        Ok(record)
    }

    /// The newest record of `chain` when its item has not been installed.
    async fn draft_of<'c>(
        &self,
        tx: &mut S::Tx,
        chain: &'c VersionChain,
    ) -> Result<Option<&'c VersionRecord>, CoreError> {
        let Some(latest) = chain.latest() else {
            return Ok(None);
        };
        let item = tx.get_item(latest.item_id).await?.ok_or_else(|| {
            CoreError::IllegalState(format!(
                "Version {} points at missing item {}",
                latest.id, latest.item_id
            ))
        })?;
        Ok((!item.in_archive).then_some(latest))
    }

    /// Remove a version record together with its item.
    ///
    /// Removing the latest of several records makes the predecessor's item
    /// live again. A record that does not exist is not an error.
    pub async fn remove_version(&self, record_id: DbId) -> Result<Removal, CoreError> {
        const OP: &str = "remove_version";
        let mut tx = self.store.begin().await.map_err(|e| e.within(OP))?;
        let removal = self
            .remove_in(&mut tx, record_id)
            .await
            .map_err(|e| e.within(OP))?;
        match removal {
            Removal::NothingToDo => {
                tracing::info!(version_id = record_id, "No such version, nothing to remove");
            }
            Removal::Removed {
                chain_deleted,
                reinstated,
            } => {
                tx.commit().await.map_err(|e| e.within(OP))?;
                tracing::info!(
                    version_id = record_id,
                    chain_deleted,
                    reinstated = ?reinstated,
                    "Version removed"
                );
            }
        }
        Ok(removal)
    }

    async fn remove_in(&self, tx: &mut S::Tx, record_id: DbId) -> Result<Removal, CoreError> {
        let Some(record) = tx.get_version(record_id).await? else {
            return Ok(Removal::NothingToDo);
        };
        let chain = VersionRegistry::list_by_chain(tx, record.history_id).await?;

        let mut reinstated = None;
        if chain.is_latest(&record) && chain.len() > 1 {
            if let Some(previous) = chain.previous(&record) {
                tx.set_in_archive(previous.item_id, true).await?;
                tx.touch_item(previous.item_id, Utc::now()).await?;
                reinstated = Some(previous.item_id);
            }
        }

        self.identifiers.delete(record.item_id).await?;
        let deletion = VersionRegistry::delete(tx, record_id).await?;

        if tx.get_item(record.item_id).await?.is_some() {
            for collection_id in tx.collections_of_item(record.item_id).await? {
                tx.remove_from_collection(collection_id, record.item_id)
                    .await?;
            }
            tx.delete_item(record.item_id).await?;
        }

        Ok(Removal::Removed {
            chain_deleted: deletion.chain_deleted,
            reinstated,
        })
    }

    /// Restoring an older version is not supported. Reports so without
    /// touching any state.
    pub async fn restore_version(
        &self,
        record_id: DbId,
        summary: Option<&str>,
    ) -> Result<RestoreOutcome, CoreError> {
        tracing::warn!(
            version_id = record_id,
            summary = summary.unwrap_or_default(),
            "Restoring a version is not supported"
        );
        Ok(RestoreOutcome::Unsupported)
    }

    /// Replace the summary of a version record.
    pub async fn update_summary(
        &self,
        record_id: DbId,
        summary: &str,
    ) -> Result<VersionRecord, CoreError> {
        const OP: &str = "update_summary";
        let mut tx = self.store.begin().await.map_err(|e| e.within(OP))?;
        let record = VersionRegistry::update_summary(&mut tx, record_id, summary)
            .await
            .map_err(|e| e.within(OP))?;
        tx.commit().await.map_err(|e| e.within(OP))?;
        Ok(record)
    }

    /// The chain `item_id` belongs to, if any.
    pub async fn history_for_item(&self, item_id: DbId) -> Result<Option<VersionChain>, CoreError> {
        let mut tx = self.store.begin().await?;
        VersionRegistry::find_chain_by_item(&mut tx, item_id).await
    }

    pub async fn find_version(&self, record_id: DbId) -> Result<Option<VersionRecord>, CoreError> {
        let mut tx = self.store.begin().await?;
        tx.get_version(record_id).await
    }
}
