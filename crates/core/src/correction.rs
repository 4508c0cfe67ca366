//! Merge planning for the correction workflow.
//!
//! Only the default container takes part in a merge. Attachments are matched
//! across the two containers by content checksum.

use crate::item::{Bitstream, Bundle};
use crate::metadata::MetadataValue;
use crate::types::DbId;

/// Where the primary marker of the native container ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryTarget {
    /// Leave the native marker as it is.
    Unchanged,
    /// Point at an existing native bitstream.
    Existing(DbId),
    /// Point at the n-th entry of [`BundleMergePlan::additions`].
    Added(usize),
}

/// Replace the fields of a native bitstream with the working copy's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub native_bitstream_id: DbId,
    pub working_bitstream_id: DbId,
    pub metadata: Vec<MetadataValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleMergePlan {
    pub updates: Vec<MetadataUpdate>,
    /// Working-copy bitstreams with no checksum match in the native
    /// container, in sequence order.
    pub additions: Vec<Bitstream>,
    pub primary: PrimaryTarget,
}

/// Plan how `working` is folded into `native`.
///
/// Each native bitstream matches at most one working bitstream. Native
/// bitstreams without a match are left alone.
pub fn plan_bundle_merge(native: &Bundle, working: &Bundle) -> BundleMergePlan {
    let mut working_bitstreams: Vec<&Bitstream> = working.bitstreams.iter().collect();
    working_bitstreams.sort_by_key(|b| b.sequence);

    let mut claimed: Vec<DbId> = Vec::new();
    let mut updates = Vec::new();
    let mut additions = Vec::new();
    let mut primary = PrimaryTarget::Unchanged;

    for candidate in working_bitstreams {
        let is_primary = working.primary_bitstream_id == Some(candidate.id);
        let matched = native
            .bitstreams
            .iter()
            .find(|b| !claimed.contains(&b.id) && b.same_content(candidate));

        match matched {
            Some(existing) => {
                claimed.push(existing.id);
                updates.push(MetadataUpdate {
                    native_bitstream_id: existing.id,
                    working_bitstream_id: candidate.id,
                    metadata: candidate.metadata.clone(),
                });
                if is_primary {
                    primary = PrimaryTarget::Existing(existing.id);
                }
            }
            None => {
                if is_primary {
                    primary = PrimaryTarget::Added(additions.len());
                }
                additions.push(candidate.clone());
            }
        }
    }

    BundleMergePlan {
        updates,
        additions,
        primary,
    }
}
