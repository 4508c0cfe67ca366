//! Content snapshots: items, their attachment containers (bundles) and
//! attachments (bitstreams).
//!
//! Persisted entities carry database ids; the `*Draft` types describe
//! content that has not been stored yet and are what the cloner produces.

use serde::{Deserialize, Serialize};

use crate::hashing::{sha256_hex, CHECKSUM_ALGORITHM};
use crate::metadata::{first_value, MetadataValue, ACCESSION_DATE_FIELD, ENTITY_TYPE_FIELD};
use crate::types::{DbId, Timestamp};

/// Name of the container holding an item's primary content files.
pub const DEFAULT_BUNDLE: &str = "ORIGINAL";

// ---------------------------------------------------------------------------
// Persisted entities
// ---------------------------------------------------------------------------

/// A content snapshot: descriptive fields plus attachment containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: DbId,
    /// Persistent identifier, assigned by the identifier service.
    pub handle: Option<String>,
    /// `true` while the item is the live, published representation.
    pub in_archive: bool,
    pub withdrawn: bool,
    pub discoverable: bool,
    pub owning_collection_id: Option<DbId>,
    pub submitter_id: Option<DbId>,
    pub last_modified: Timestamp,
    pub metadata: Vec<MetadataValue>,
    pub bundles: Vec<Bundle>,
}

impl Item {
    /// Declared entity-type label, if any (empty values count as absent).
    pub fn entity_type(&self) -> Option<&str> {
        first_value(&self.metadata, ENTITY_TYPE_FIELD).filter(|label| !label.trim().is_empty())
    }

    /// Recorded accession date, when present and parseable as RFC 3339.
    pub fn accession_date(&self) -> Option<Timestamp> {
        let raw = first_value(&self.metadata, ACCESSION_DATE_FIELD)?;
        chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|d| d.with_timezone(&chrono::Utc))
    }

    /// First value of a dotted field such as `dc.title`.
    pub fn first_value(&self, field: &str) -> Option<&str> {
        first_value(&self.metadata, field)
    }

    pub fn bundle(&self, name: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.name == name)
    }

    /// The [`DEFAULT_BUNDLE`] container, if the item has one.
    pub fn default_bundle(&self) -> Option<&Bundle> {
        self.bundle(DEFAULT_BUNDLE)
    }
}

/// A grouping of items. Items may be mapped into several collections; one
/// of them is the owning collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: DbId,
    pub name: String,
}

/// A named container of bitstreams belonging to one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: DbId,
    pub item_id: DbId,
    pub name: String,
    pub primary_bitstream_id: Option<DbId>,
    pub bitstreams: Vec<Bitstream>,
}

impl Bundle {
    pub fn primary(&self) -> Option<&Bitstream> {
        let primary = self.primary_bitstream_id?;
        self.bitstreams.iter().find(|b| b.id == primary)
    }
}

/// One file attachment. The bytes live in external storage under
/// `storage_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bitstream {
    pub id: DbId,
    pub bundle_id: DbId,
    pub name: Option<String>,
    pub storage_key: String,
    pub checksum: String,
    pub checksum_algorithm: String,
    pub size_bytes: i64,
    pub format: Option<String>,
    /// Position inside the bundle.
    pub sequence: i32,
    pub metadata: Vec<MetadataValue>,
}

impl Bitstream {
    /// Describe a duplicate of this bitstream sharing the same stored bytes.
    pub fn to_draft(&self) -> BitstreamDraft {
        BitstreamDraft {
            name: self.name.clone(),
            storage_key: self.storage_key.clone(),
            checksum: self.checksum.clone(),
            checksum_algorithm: self.checksum_algorithm.clone(),
            size_bytes: self.size_bytes,
            format: self.format.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// `true` when both bitstreams carry the same content digest.
    pub fn same_content(&self, other: &Bitstream) -> bool {
        self.checksum_algorithm == other.checksum_algorithm && self.checksum == other.checksum
    }
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// An item that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub in_archive: bool,
    pub withdrawn: bool,
    pub discoverable: bool,
    pub owning_collection_id: Option<DbId>,
    pub submitter_id: Option<DbId>,
    pub metadata: Vec<MetadataValue>,
    pub bundles: Vec<BundleDraft>,
}

impl ItemDraft {
    /// A discoverable, not yet archived item with no content.
    pub fn new() -> Self {
        Self {
            discoverable: true,
            ..Default::default()
        }
    }

    pub fn archived(mut self) -> Self {
        self.in_archive = true;
        self
    }

    pub fn in_collection(mut self, collection_id: DbId) -> Self {
        self.owning_collection_id = Some(collection_id);
        self
    }

    pub fn submitted_by(mut self, submitter_id: DbId) -> Self {
        self.submitter_id = Some(submitter_id);
        self
    }

    /// Append a value; its place is the count of earlier values of the same
    /// field.
    pub fn with_field(mut self, mut value: MetadataValue) -> Self {
        let field = value.field_name();
        value.place = self.metadata.iter().filter(|v| v.is_field(&field)).count() as i32;
        self.metadata.push(value);
        self
    }

    pub fn with_bundle(mut self, bundle: BundleDraft) -> Self {
        self.bundles.push(bundle);
        self
    }
}

/// A bundle that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleDraft {
    pub name: String,
    /// Index into `bitstreams` of the primary bitstream.
    pub primary_index: Option<usize>,
    pub bitstreams: Vec<BitstreamDraft>,
}

impl BundleDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_index: None,
            bitstreams: Vec::new(),
        }
    }

    pub fn with_bitstream(mut self, bitstream: BitstreamDraft) -> Self {
        self.bitstreams.push(bitstream);
        self
    }

    /// Append a bitstream and mark it as the primary one.
    pub fn with_primary(mut self, bitstream: BitstreamDraft) -> Self {
        self.primary_index = Some(self.bitstreams.len());
        self.bitstreams.push(bitstream);
        self
    }
}

/// A bitstream that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitstreamDraft {
    pub name: Option<String>,
    pub storage_key: String,
    pub checksum: String,
    pub checksum_algorithm: String,
    pub size_bytes: i64,
    pub format: Option<String>,
    pub metadata: Vec<MetadataValue>,
}

impl BitstreamDraft {
    /// Describe freshly uploaded content. The digest doubles as the storage
    /// key, so identical uploads share stored bytes.
    pub fn from_bytes(name: impl Into<String>, content: &[u8]) -> Self {
        let checksum = sha256_hex(content);
        Self {
            name: Some(name.into()),
            storage_key: checksum.clone(),
            checksum,
            checksum_algorithm: CHECKSUM_ALGORITHM.to_string(),
            size_bytes: content.len() as i64,
            format: None,
            metadata: Vec::new(),
        }
    }

    pub fn with_field(mut self, value: MetadataValue) -> Self {
        self.metadata.push(value);
        self
    }
}
