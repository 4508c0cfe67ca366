//! Default collaborator implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexSet;
use strata_core::error::CoreError;
use strata_core::services::{AccessPolicyService, IdentifierService};
use strata_core::types::DbId;

/// Mints `<prefix>/<item id>` handles and remembers retired ones.
#[derive(Debug)]
pub struct LocalHandleService {
    prefix: String,
    tombstones: Mutex<IndexSet<DbId>>,
}

impl LocalHandleService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            tombstones: Mutex::new(IndexSet::new()),
        }
    }

    /// The handle this service assigns to `item_id`.
    pub fn handle_for(&self, item_id: DbId) -> String {
        format!("{}/{item_id}", self.prefix)
    }

    /// Whether the identifiers of `item_id` have been retired.
    pub fn is_tombstoned(&self, item_id: DbId) -> bool {
        self.tombstones
            .lock()
            .map(|set| set.contains(&item_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl IdentifierService for LocalHandleService {
    async fn reserve(&self, item_id: DbId) -> Result<String, CoreError> {
        let handle = self.handle_for(item_id);
        tracing::debug!(item_id, handle = %handle, "Handle reserved");
        Ok(handle)
    }

    async fn delete(&self, item_id: DbId) -> Result<(), CoreError> {
        self.tombstones
            .lock()
            .map_err(|e| CoreError::External {
                service: "handle",
                message: format!("tombstone registry poisoned: {e}"),
            })?
            .insert(item_id);
        tracing::debug!(item_id, handle = %self.handle_for(item_id), "Handle tombstoned");
        Ok(())
    }
}

/// Lets every submitter deposit into an item's owning collection and has
/// no custom bitstream policies to copy.
#[derive(Debug, Clone, Default)]
pub struct OwningCollectionPolicy;

#[async_trait]
impl AccessPolicyService for OwningCollectionPolicy {
    async fn can_submit(
        &self,
        _submitter_id: Option<DbId>,
        _collection_id: DbId,
    ) -> Result<bool, CoreError> {
        Ok(true)
    }

    async fn submittable_collections(
        &self,
        _submitter_id: Option<DbId>,
    ) -> Result<Vec<DbId>, CoreError> {
        Ok(Vec::new())
    }

    async fn copy_custom_policies(
        &self,
        _from_bitstream: DbId,
        _to_bitstream: DbId,
    ) -> Result<(), CoreError> {
        Ok(())
    }
}
