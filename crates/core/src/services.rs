//! Interfaces of collaborators that live outside this workspace.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::DbId;

/// Assigns and retires persistent identifiers.
#[async_trait]
pub trait IdentifierService: Send + Sync {
    /// Reserve an identifier for a new item and return it.
    async fn reserve(&self, item_id: DbId) -> Result<String, CoreError>;

    /// Retire the identifiers of an item that is being removed.
    async fn delete(&self, item_id: DbId) -> Result<(), CoreError>;
}

/// Answers submission-permission questions and copies bitstream policies.
#[async_trait]
pub trait AccessPolicyService: Send + Sync {
    async fn can_submit(
        &self,
        submitter_id: Option<DbId>,
        collection_id: DbId,
    ) -> Result<bool, CoreError>;

    /// Collections the submitter may deposit into, in preference order.
    async fn submittable_collections(
        &self,
        submitter_id: Option<DbId>,
    ) -> Result<Vec<DbId>, CoreError>;

    /// Copy the non-inherited policies of one bitstream onto another.
    async fn copy_custom_policies(
        &self,
        from_bitstream: DbId,
        to_bitstream: DbId,
    ) -> Result<(), CoreError>;
}

/// Receives the items whose search documents are stale.
///
/// Called once per committed unit of work, never before the commit.
pub trait ReindexSink: Send + Sync {
    fn reindex(&self, item_ids: &[DbId]);
}
