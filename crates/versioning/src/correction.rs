//! Correction workflow: edit a working copy of an item, then fold it back
//! into the original.

use std::sync::Arc;

use chrono::Utc;
use strata_core::cloner::ContentCloner;
use strata_core::correction::{plan_bundle_merge, PrimaryTarget};
use strata_core::error::CoreError;
use strata_core::item::{Item, DEFAULT_BUNDLE};
use strata_core::relationship::{NewRelationship, RelationshipType};
use strata_core::services::AccessPolicyService;
use strata_core::store::{ItemStore, RelationshipStore, Store, Transaction};
use strata_core::types::DbId;

use crate::config::VersioningConfig;

/// A submission-workflow entry wrapping the working copy under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowEntry {
    pub id: DbId,
    pub item_id: DbId,
}

/// What [`CorrectionCoordinator::merge`] changed on the native item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub native_item_id: DbId,
    /// Native bitstreams whose fields were replaced.
    pub updated_bitstreams: Vec<DbId>,
    /// Bitstreams newly added to the native default bundle.
    pub added_bitstreams: Vec<DbId>,
}

pub struct CorrectionCoordinator<S> {
    store: S,
    cloner: ContentCloner,
    policies: Arc<dyn AccessPolicyService>,
    correction_type: String,
}

impl<S: Store> CorrectionCoordinator<S> {
    pub fn new(
        store: S,
        config: &VersioningConfig,
        policies: Arc<dyn AccessPolicyService>,
    ) -> Self {
        Self {
            store,
            cloner: ContentCloner::new(config.ignored_metadata.clone()),
            policies,
            correction_type: config.correction_relationship_type.clone(),
        }
    }

    /// Create a working copy of `item_id` linked to it by a correction
    /// relationship.
    pub async fn begin(
        &self,
        item_id: DbId,
        submitter_id: Option<DbId>,
    ) -> Result<Item, CoreError> {
        const OP: &str = "begin_correction";
        let mut tx = self.store.begin().await.map_err(|e| e.within(OP))?;
        let working = self
            .begin_in(&mut tx, item_id, submitter_id)
            .await
            .map_err(|e| e.within(OP))?;
        tx.commit().await.map_err(|e| e.within(OP))?;
        tracing::info!(
            item_id,
            working_item_id = working.id,
            collection_id = ?working.owning_collection_id,
            "Correction started"
        );
        Ok(working)
    }

    async fn begin_in(
        &self,
        tx: &mut S::Tx,
        item_id: DbId,
        submitter_id: Option<DbId>,
    ) -> Result<Item, CoreError> {
        let item = tx
            .get_item(item_id)
            .await?
            .ok_or(CoreError::not_found("item", item_id))?;
        let correction = self.correction_type(tx).await?;

        let open = tx
            .relationships_of_item(item_id, Some(correction.id))
            .await?
            .into_iter()
            .find(|r| r.right_item_id == item_id);
        if let Some(open) = open {
            return Err(CoreError::Conflict(format!(
                "Item {item_id} already has an open correction (working copy {})",
                open.left_item_id
            )));
        }

        let collection_id = self.choose_collection(&item, submitter_id).await?;
        let mut draft = self.cloner.clone_item(&item);
        draft.owning_collection_id = Some(collection_id);
        draft.submitter_id = submitter_id;
        let working = tx.create_item(draft).await?;

        tx.create_relationship(NewRelationship::between(correction.id, working.id, item_id))
            .await?;
        Ok(working)
    }

    async fn choose_collection(
        &self,
        item: &Item,
        submitter_id: Option<DbId>,
    ) -> Result<DbId, CoreError> {
        if let Some(owning) = item.owning_collection_id {
            if self.policies.can_submit(submitter_id, owning).await? {
                return Ok(owning);
            }
        }
        self.policies
            .submittable_collections(submitter_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "No collection accepts a correction of item {} from this submitter",
                    item.id
                ))
            })
    }

    async fn correction_type(&self, tx: &mut S::Tx) -> Result<RelationshipType, CoreError> {
        tx.find_relationship_type(&self.correction_type)
            .await?
            .ok_or_else(|| {
                CoreError::PreconditionFailed(format!(
                    "Relationship type `{}` is not configured",
                    self.correction_type
                ))
            })
    }

    /// Fold the reviewed working copy back into the native item and delete
    /// the working copy.
    ///
    /// Only the default bundle takes part; other bundles of the native item
    /// are untouched.
    pub async fn merge(
        &self,
        entry: WorkflowEntry,
        working_item_id: DbId,
        native_item_id: DbId,
    ) -> Result<MergeOutcome, CoreError> {
        const OP: &str = "merge_correction";
        if entry.item_id != working_item_id {
            return Err(CoreError::Validation(format!(
                "Workflow entry {} wraps item {}, not working copy {working_item_id}",
                entry.id, entry.item_id
            )));
        }
        let mut tx = self.store.begin().await.map_err(|e| e.within(OP))?;
        let outcome = self
            .merge_in(&mut tx, working_item_id, native_item_id)
            .await
            .map_err(|e| e.within(OP))?;
        tx.commit().await.map_err(|e| e.within(OP))?;
        tracing::info!(
            workflow_entry = entry.id,
            working_item_id,
            native_item_id,
            updated = outcome.updated_bitstreams.len(),
            added = outcome.added_bitstreams.len(),
            "Correction merged"
        );
        Ok(outcome)
    }

    async fn merge_in(
        &self,
        tx: &mut S::Tx,
        working_item_id: DbId,
        native_item_id: DbId,
    ) -> Result<MergeOutcome, CoreError> {
        let working = tx
            .get_item(working_item_id)
            .await?
            .ok_or(CoreError::not_found("item", working_item_id))?;
        let native = tx
            .get_item(native_item_id)
            .await?
            .ok_or(CoreError::not_found("item", native_item_id))?;
        let correction = self.correction_type(tx).await?;

        let links: Vec<_> = tx
            .relationships_of_item(working_item_id, Some(correction.id))
            .await?
            .into_iter()
            .filter(|r| r.left_item_id == working_item_id && r.right_item_id == native_item_id)
            .collect();
        if links.is_empty() {
            return Err(CoreError::Validation(format!(
                "Item {working_item_id} is not a correction of item {native_item_id}"
            )));
        }
        for link in &links {
            tx.delete_relationship(link.id).await?;
        }

        let (Some(native_bundle), Some(working_bundle)) =
            (native.default_bundle(), working.default_bundle())
        else {
            return Err(CoreError::PreconditionFailed(format!(
                "Both items need a {DEFAULT_BUNDLE} bundle to merge a correction"
            )));
        };

        let mut metadata = self.cloner.copy_metadata(&working.metadata);
        metadata.extend(
            native
                .metadata
                .iter()
                .filter(|v| self.cloner.exclusions().excludes(v))
                .cloned(),
        );
        tx.replace_metadata(native_item_id, metadata).await?;

        let plan = plan_bundle_merge(native_bundle, working_bundle);
        let mut updated_bitstreams = Vec::with_capacity(plan.updates.len());
        for update in plan.updates {
            tx.replace_bitstream_metadata(update.native_bitstream_id, update.metadata)
                .await?;
            updated_bitstreams.push(update.native_bitstream_id);
        }

        let mut added_bitstreams = Vec::with_capacity(plan.additions.len());
        for source in &plan.additions {
            let added = tx.add_bitstream(native_bundle.id, source.to_draft()).await?;
            self.policies
                .copy_custom_policies(source.id, added.id)
                .await?;
            added_bitstreams.push(added.id);
        }

        let primary = match plan.primary {
            PrimaryTarget::Unchanged => None,
            PrimaryTarget::Existing(id) => Some(id),
            PrimaryTarget::Added(index) => added_bitstreams.get(index).copied(),
        };
        if let Some(primary) = primary {
            tx.set_primary_bitstream(native_bundle.id, Some(primary))
                .await?;
        }

        tx.delete_item(working_item_id).await?;
        tx.touch_item(native_item_id, Utc::now()).await?;

        Ok(MergeOutcome {
            native_item_id,
            updated_bitstreams,
            added_bitstreams,
        })
    }
}
