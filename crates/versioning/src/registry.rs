//! Create, find and delete version records and their histories.
//!
//! Sequence numbers come from the history's counter, so a number is never
//! handed out twice even after the newest record has been deleted.

use strata_core::error::CoreError;
use strata_core::store::VersionStore;
use strata_core::types::{DbId, Timestamp};
use strata_core::version::{NewVersion, VersionChain, VersionRecord};

/// Outcome of [`VersionRegistry::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordDeletion {
    pub history_id: DbId,
    /// `true` when the deleted record was the last one and the history went
    /// with it.
    pub chain_deleted: bool,
}

/// Registry operations over a [`VersionStore`].
pub struct VersionRegistry;

impl VersionRegistry {
    /// Append a record for `item_id`, creating a new history when
    /// `history_id` is `None`.
    pub async fn create<T: VersionStore + Send>(
        tx: &mut T,
        history_id: Option<DbId>,
        item_id: DbId,
        summary: &str,
        creator_id: Option<DbId>,
        created_at: Timestamp,
    ) -> Result<VersionRecord, CoreError> {
        let history_id = match history_id {
            Some(id) => id,
            None => tx.create_history(created_at).await?.id,
        };
        let version_number = tx.allocate_version_number(history_id).await?;
        let record = tx
            .insert_version(NewVersion {
                history_id,
                version_number,
                item_id,
                creator_id,
                created_at,
                summary: summary.to_string(),
            })
            .await?;
        tracing::debug!(
            history_id,
            version_id = record.id,
            version_number,
            item_id,
            "Version record created"
        );
        Ok(record)
    }

    /// The record pointing at `item_id`, if any.
    pub async fn find_by_item<T: VersionStore + Send>(
        tx: &mut T,
        item_id: DbId,
    ) -> Result<Option<VersionRecord>, CoreError> {
        let mut records = tx.versions_by_item(item_id).await?;
        if records.len() > 1 {
            return Err(CoreError::IllegalState(format!(
                "Item {item_id} is referenced by {} version records",
                records.len()
            )));
        }
        Ok(records.pop())
    }

    /// The whole chain containing `item_id`, if the item is versioned.
    pub async fn find_chain_by_item<T: VersionStore + Send>(
        tx: &mut T,
        item_id: DbId,
    ) -> Result<Option<VersionChain>, CoreError> {
        match Self::find_by_item(tx, item_id).await? {
            Some(record) => Ok(Some(Self::list_by_chain(tx, record.history_id).await?)),
            None => Ok(None),
        }
    }

    /// Every record of a history, newest first.
    pub async fn list_by_chain<T: VersionStore + Send>(
        tx: &mut T,
        history_id: DbId,
    ) -> Result<VersionChain, CoreError> {
        if tx.get_history(history_id).await?.is_none() {
            return Err(CoreError::not_found("version_history", history_id));
        }
        let records = tx.versions_by_history(history_id).await?;
        VersionChain::new(history_id, records)
    }

    /// Delete a record, and its history when nothing else is left in it.
    pub async fn delete<T: VersionStore + Send>(
        tx: &mut T,
        record_id: DbId,
    ) -> Result<RecordDeletion, CoreError> {
        let record = tx
            .get_version(record_id)
            .await?
            .ok_or(CoreError::not_found("version", record_id))?;
        tx.delete_version(record_id).await?;

        let remaining = tx.versions_by_history(record.history_id).await?;
        let chain_deleted = remaining.is_empty();
        if chain_deleted {
            tx.delete_history(record.history_id).await?;
        }
        tracing::debug!(
            history_id = record.history_id,
            version_id = record_id,
            chain_deleted,
            "Version record deleted"
        );
        Ok(RecordDeletion {
            history_id: record.history_id,
            chain_deleted,
        })
    }

    /// Replace the free-text summary of a record.
    pub async fn update_summary<T: VersionStore + Send>(
        tx: &mut T,
        record_id: DbId,
        summary: &str,
    ) -> Result<VersionRecord, CoreError> {
        tx.set_version_summary(record_id, summary).await?;
        tx.get_version(record_id)
            .await?
            .ok_or(CoreError::not_found("version", record_id))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use strata_core::memory::MemoryStore;
    use strata_core::store::Store;

    use super::*;

    #[tokio::test]
    async fn numbers_are_never_reused() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let now = Utc::now();

        let first = VersionRegistry::create(&mut tx, None, 100, "", None, now).await.unwrap();
        let history = Some(first.history_id);
        let second = VersionRegistry::create(&mut tx, history, 101, "", None, now).await.unwrap();
        assert_eq!((first.version_number, second.version_number), (1, 2));

        VersionRegistry::delete(&mut tx, second.id).await.unwrap();
        let third = VersionRegistry::create(&mut tx, history, 102, "", None, now).await.unwrap();
        assert_eq!(third.version_number, 3);
    }

    #[tokio::test]
    async fn deleting_the_last_record_deletes_the_chain() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = VersionRegistry::create(&mut tx, None, 100, "", None, Utc::now())
            .await
            .unwrap();

        let deletion = VersionRegistry::delete(&mut tx, record.id).await.unwrap();
        assert!(deletion.chain_deleted);
        assert_matches!(
            VersionRegistry::list_by_chain(&mut tx, record.history_id).await,
            Err(CoreError::NotFound { .. })
        );
        assert_eq!(VersionRegistry::find_chain_by_item(&mut tx, 100).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_record_cannot_be_deleted() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert_matches!(
            VersionRegistry::delete(&mut tx, 404).await,
            Err(CoreError::NotFound { entity: "version", id: 404 })
        );
    }

    #[tokio::test]
    async fn two_records_for_one_item_are_illegal() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let now = Utc::now();
        let first = VersionRegistry::create(&mut tx, None, 100, "", None, now).await.unwrap();
        VersionRegistry::create(&mut tx, Some(first.history_id), 100, "", None, now)
            .await
            .unwrap();

        assert_matches!(
            VersionRegistry::find_by_item(&mut tx, 100).await,
            Err(CoreError::IllegalState(_))
        );
    }

    #[tokio::test]
    async fn summary_can_be_replaced() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = VersionRegistry::create(&mut tx, None, 100, "draft", Some(5), Utc::now())
            .await
            .unwrap();
        let updated = VersionRegistry::update_summary(&mut tx, record.id, "final").await.unwrap();
        assert_eq!(updated.summary, "final");
        assert_eq!(updated.creator_id, Some(5));
    }
}
