//! Item, collection, bundle and bitstream rows.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::FromRow;
use strata_core::item::{Bitstream, Bundle, Collection, Item};
use strata_core::metadata::MetadataValue;
use strata_core::types::{DbId, Timestamp};

/// A row from the `items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ItemRow {
    pub id: DbId,
    pub handle: Option<String>,
    pub in_archive: bool,
    pub withdrawn: bool,
    pub discoverable: bool,
    pub owning_collection_id: Option<DbId>,
    pub submitter_id: Option<DbId>,
    pub last_modified: Timestamp,
}

/// A row from `item_metadata` or `bitstream_metadata`. `owner_id` is the
/// item or bitstream the value belongs to.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MetadataRow {
    pub owner_id: DbId,
    pub schema_name: String,
    pub element: String,
    pub qualifier: Option<String>,
    pub language: Option<String>,
    pub value: String,
    pub authority: Option<String>,
    pub confidence: i32,
    pub place: i32,
}

impl From<MetadataRow> for MetadataValue {
    fn from(row: MetadataRow) -> Self {
        Self {
            schema: row.schema_name,
            element: row.element,
            qualifier: row.qualifier,
            language: row.language,
            value: row.value,
            authority: row.authority,
            confidence: row.confidence,
            place: row.place,
        }
    }
}

/// A row from the `collections` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CollectionRow {
    pub id: DbId,
    pub name: String,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

/// A row from the `bundles` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BundleRow {
    pub id: DbId,
    pub item_id: DbId,
    pub name: String,
    pub primary_bitstream_id: Option<DbId>,
}

/// A row from the `bitstreams` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BitstreamRow {
    pub id: DbId,
    pub bundle_id: DbId,
    pub name: Option<String>,
    pub storage_key: String,
    pub checksum: String,
    pub checksum_algorithm: String,
    pub size_bytes: i64,
    pub format: Option<String>,
    pub sequence: i32,
}

impl BitstreamRow {
    pub fn into_bitstream(self, metadata: Vec<MetadataValue>) -> Bitstream {
        Bitstream {
            id: self.id,
            bundle_id: self.bundle_id,
            name: self.name,
            storage_key: self.storage_key,
            checksum: self.checksum,
            checksum_algorithm: self.checksum_algorithm,
            size_bytes: self.size_bytes,
            format: self.format,
            sequence: self.sequence,
            metadata,
        }
    }
}

/// Every row that makes up one item.
#[derive(Debug, Clone)]
pub struct ItemRows {
    pub item: ItemRow,
    pub metadata: Vec<MetadataRow>,
    pub bundles: Vec<BundleRow>,
    pub bitstreams: Vec<BitstreamRow>,
    pub bitstream_metadata: Vec<MetadataRow>,
}

impl ItemRows {
    /// Assemble the domain item. Bitstreams are ordered by sequence inside
    /// their bundle; rows of unknown bundles or bitstreams are ignored.
    pub fn into_item(self) -> Item {
        let mut fields_by_bitstream: HashMap<DbId, Vec<MetadataValue>> = HashMap::new();
        for row in self.bitstream_metadata {
            fields_by_bitstream
                .entry(row.owner_id)
                .or_default()
                .push(row.into());
        }

        let mut bitstreams_by_bundle: HashMap<DbId, Vec<Bitstream>> = HashMap::new();
        for row in self.bitstreams {
            let metadata = fields_by_bitstream.remove(&row.id).unwrap_or_default();
            bitstreams_by_bundle
                .entry(row.bundle_id)
                .or_default()
                .push(row.into_bitstream(metadata));
        }

        let bundles = self
            .bundles
            .into_iter()
            .map(|row| {
                let mut bitstreams = bitstreams_by_bundle.remove(&row.id).unwrap_or_default();
                bitstreams.sort_by_key(|b| b.sequence);
                Bundle {
                    id: row.id,
                    item_id: row.item_id,
                    name: row.name,
                    primary_bitstream_id: row.primary_bitstream_id,
                    bitstreams,
                }
            })
            .collect();

        Item {
            id: self.item.id,
            handle: self.item.handle,
            in_archive: self.item.in_archive,
            withdrawn: self.item.withdrawn,
            discoverable: self.item.discoverable,
            owning_collection_id: self.item.owning_collection_id,
            submitter_id: self.item.submitter_id,
            last_modified: self.item.last_modified,
            metadata: self.metadata.into_iter().map(MetadataValue::from).collect(),
            bundles,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn field(owner_id: DbId, element: &str, value: &str) -> MetadataRow {
        MetadataRow {
            owner_id,
            schema_name: "dc".into(),
            element: element.into(),
            qualifier: None,
            language: None,
            value: value.into(),
            authority: None,
            confidence: -1,
            place: 0,
        }
    }

    fn bitstream(id: DbId, bundle_id: DbId, sequence: i32) -> BitstreamRow {
        BitstreamRow {
            id,
            bundle_id,
            name: Some(format!("file-{id}")),
            storage_key: format!("key-{id}"),
            checksum: format!("sum-{id}"),
            checksum_algorithm: "SHA-256".into(),
            size_bytes: 10,
            format: None,
            sequence,
        }
    }

    fn rows() -> ItemRows {
        ItemRows {
            item: ItemRow {
                id: 1,
                handle: Some("123456789/1".into()),
                in_archive: true,
                withdrawn: false,
                discoverable: true,
                owning_collection_id: Some(9),
                submitter_id: None,
                last_modified: Utc::now(),
            },
            metadata: vec![field(1, "title", "Rows")],
            bundles: vec![
                BundleRow {
                    id: 10,
                    item_id: 1,
                    name: "ORIGINAL".into(),
                    primary_bitstream_id: Some(12),
                },
                BundleRow {
                    id: 20,
                    item_id: 1,
                    name: "LICENSE".into(),
                    primary_bitstream_id: None,
                },
            ],
            bitstreams: vec![bitstream(12, 10, 1), bitstream(11, 10, 0), bitstream(21, 20, 0)],
            bitstream_metadata: vec![field(12, "description", "Second file")],
        }
    }

    #[test]
    fn bitstreams_land_in_their_bundle_in_sequence_order() {
        let item = rows().into_item();
        let original = item.bundle("ORIGINAL").unwrap();
        let ids: Vec<DbId> = original.bitstreams.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![11, 12]);
        assert_eq!(original.primary().map(|b| b.id), Some(12));
        assert_eq!(item.bundle("LICENSE").unwrap().bitstreams.len(), 1);
    }

    #[test]
    fn fields_attach_to_their_owner() {
        let item = rows().into_item();
        assert_eq!(item.first_value("dc.title"), Some("Rows"));
        let original = item.bundle("ORIGINAL").unwrap();
        assert!(original.bitstreams[0].metadata.is_empty());
        assert_eq!(original.bitstreams[1].metadata[0].value, "Second file");
    }
}
