//! Produces new snapshots from existing ones.

use crate::error::CoreError;
use crate::item::{Bundle, BundleDraft, Item, ItemDraft};
use crate::metadata::{FieldExclusions, MetadataValue};

/// Copies descriptive fields and duplicates attachments between snapshots.
///
/// Fields named in the exclusion set are never copied at item level.
/// Attachment-level fields are always copied.
#[derive(Debug, Clone, Default)]
pub struct ContentCloner {
    exclusions: FieldExclusions,
}

impl ContentCloner {
    pub fn new(exclusions: FieldExclusions) -> Self {
        Self { exclusions }
    }

    /// Build from a comma-separated exclusion list.
    pub fn from_list(list: &str) -> Result<Self, CoreError> {
        Ok(Self::new(FieldExclusions::parse(list)?))
    }

    pub fn exclusions(&self) -> &FieldExclusions {
        &self.exclusions
    }

    /// Item-level fields minus the excluded ones, order and places kept.
    pub fn copy_metadata(&self, fields: &[MetadataValue]) -> Vec<MetadataValue> {
        fields
            .iter()
            .filter(|value| !self.exclusions.excludes(value))
            .cloned()
            .collect()
    }

    /// Duplicate every container and attachment. Stored bytes are shared;
    /// the primary marker is carried over by position.
    pub fn clone_bundles(&self, bundles: &[Bundle]) -> Vec<BundleDraft> {
        bundles
            .iter()
            .map(|bundle| {
                let mut bitstreams: Vec<_> = bundle.bitstreams.iter().collect();
                bitstreams.sort_by_key(|b| b.sequence);
                BundleDraft {
                    name: bundle.name.clone(),
                    primary_index: bundle
                        .primary_bitstream_id
                        .and_then(|id| bitstreams.iter().position(|b| b.id == id)),
                    bitstreams: bitstreams.into_iter().map(|b| b.to_draft()).collect(),
                }
            })
            .collect()
    }

    /// A non-live, handle-less copy of `item` in the same owning collection.
    pub fn clone_item(&self, item: &Item) -> ItemDraft {
        ItemDraft {
            in_archive: false,
            withdrawn: false,
            discoverable: item.discoverable,
            owning_collection_id: item.owning_collection_id,
            submitter_id: item.submitter_id,
            metadata: self.copy_metadata(&item.metadata),
            bundles: self.clone_bundles(&item.bundles),
        }
    }
}
