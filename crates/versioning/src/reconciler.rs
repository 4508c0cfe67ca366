//! Keeps the archive flag and relationship latest flags consistent when a
//! new version is installed.
//!
//! Runs as a [`Consumer`] of `item.installed`. Every item whose state
//! changes is scheduled on the unit of work's reindex batch; the batch is
//! touched in [`Consumer::finish`] and sent after commit, so each item gets
//! exactly one reindex signal per unit of work.

use async_trait::async_trait;
use chrono::Utc;
use strata_core::error::CoreError;
use strata_core::item::Item;
use strata_core::relationship::plan_latest_flags;
use strata_core::store::{ItemStore, RelationshipStore, Transaction};
use strata_core::types::DbId;
use strata_events::bus::ITEM_INSTALLED;
use strata_events::{Consumer, PlatformEvent, UnitOfWork};

use crate::registry::VersionRegistry;

#[derive(Debug, Clone, Copy, Default)]
pub struct RelationshipReconciler;

impl RelationshipReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Hand latest status from the previous version of `item_id`'s chain to
    /// the newest one.
    pub async fn reconcile<T: Transaction>(
        &self,
        uow: &mut UnitOfWork<T>,
        item_id: DbId,
    ) -> Result<(), CoreError> {
        let uow_id = uow.id();
        let tx = uow.tx();

        match tx.get_item(item_id).await? {
            Some(item) if item.in_archive => {}
            Some(_) => {
                tracing::debug!(item_id, "Installed item is not archived, skipping");
                return Ok(());
            }
            None => {
                tracing::debug!(item_id, "Installed item no longer exists, skipping");
                return Ok(());
            }
        }

        let Some(chain) = VersionRegistry::find_chain_by_item(tx, item_id).await? else {
            return Ok(());
        };
        let Some(latest) = chain.latest() else {
            return Ok(());
        };
        if latest.item_id != item_id {
            tracing::warn!(
                unit_of_work = %uow_id,
                item_id,
                latest_item_id = latest.item_id,
                history_id = chain.history_id(),
                "Installed item is not the newest version, relationships left as they are"
            );
            return Ok(());
        }
        let Some(previous) = chain.previous(latest) else {
            return Ok(());
        };
        let (latest_id, previous_id) = (latest.item_id, previous.item_id);

        let latest_item = load_version_item(tx, latest_id).await?;
        let previous_item = load_version_item(tx, previous_id).await?;

        if previous_item.in_archive {
            tx.set_in_archive(previous_id, false).await?;
            uow.schedule_reindex(previous_id);
            tracing::info!(
                unit_of_work = %uow_id,
                item_id = latest_id,
                previous_item_id = previous_id,
                "Previous version unarchived"
            );
        }

        let entity_type = match (latest_item.entity_type(), previous_item.entity_type()) {
            (Some(latest_type), Some(previous_type)) if latest_type == previous_type => {
                latest_type.to_string()
            }
            (latest_type, previous_type) => {
                tracing::warn!(
                    item_id = latest_id,
                    previous_item_id = previous_id,
                    latest_type = latest_type.unwrap_or_default(),
                    previous_type = previous_type.unwrap_or_default(),
                    "Entity types of consecutive versions differ, relationships left as they are"
                );
                return Ok(());
            }
        };

        let tx = uow.tx();
        let types: Vec<_> = tx
            .relationship_types()
            .await?
            .into_iter()
            .filter(|t| t.involves_entity_type(&entity_type))
            .collect();

        let mut scheduled = Vec::new();
        for relationship_type in types {
            let previous_edges = tx
                .relationships_of_item(previous_id, Some(relationship_type.id))
                .await?;
            let latest_edges = tx
                .relationships_of_item(latest_id, Some(relationship_type.id))
                .await?;

            let changes =
                match plan_latest_flags(previous_id, latest_id, &previous_edges, &latest_edges) {
                    Ok(changes) => changes,
                    Err(e) => {
                        tracing::error!(
                            unit_of_work = %uow_id,
                            item_id = latest_id,
                            previous_item_id = previous_id,
                            relationship_type = %relationship_type.left_label,
                            error = %e,
                            "Relationship graph is inconsistent"
                        );
                        return Err(e);
                    }
                };

            for change in changes {
                tx.set_latest(change.relationship_id, change.side, change.value)
                    .await?;
                tracing::debug!(
                    relationship_id = change.relationship_id,
                    side = ?change.side,
                    latest = change.value,
                    "Latest flag updated"
                );
                scheduled.extend(change.endpoints);
            }
        }

        for id in scheduled {
            uow.schedule_reindex(id);
        }
        Ok(())
    }
}

async fn load_version_item<T: ItemStore + Send>(
    tx: &mut T,
    item_id: DbId,
) -> Result<Item, CoreError> {
    tx.get_item(item_id).await?.ok_or_else(|| {
        CoreError::IllegalState(format!("Version record points at missing item {item_id}"))
    })
}

#[async_trait]
impl<T: Transaction + 'static> Consumer<T> for RelationshipReconciler {
    fn name(&self) -> &'static str {
        "relationship_reconciler"
    }

    fn accepts(&self, event: &PlatformEvent) -> bool {
        event.event_type == ITEM_INSTALLED && event.source_item().is_some()
    }

    async fn consume(
        &self,
        uow: &mut UnitOfWork<T>,
        event: &PlatformEvent,
    ) -> Result<(), CoreError> {
        match event.source_item() {
            Some(item_id) => self.reconcile(uow, item_id).await,
            None => Ok(()),
        }
    }

    /// Touch every scheduled item so its modification date reflects the
    /// change.
    async fn finish(&self, uow: &mut UnitOfWork<T>) -> Result<(), CoreError> {
        let scheduled: Vec<DbId> = uow
            .reindex_batch()
            .map(|batch| batch.iter().collect())
            .unwrap_or_default();
        let now = Utc::now();
        let tx = uow.tx();
        for item_id in scheduled {
            match tx.touch_item(item_id, now).await {
                Err(e) if e.is_not_found() => {
                    tracing::debug!(item_id, "Scheduled item vanished before touch");
                }
                other => other?,
            }
        }
        Ok(())
    }
}
