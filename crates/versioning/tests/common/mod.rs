//! Shared fixtures for the versioning integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use strata_core::error::CoreError;
use strata_core::item::{BitstreamDraft, BundleDraft, Item, ItemDraft, DEFAULT_BUNDLE};
use strata_core::memory::{MemoryStore, MemoryTransaction};
use strata_core::metadata::MetadataValue;
use strata_core::relationship::{
    NewRelationship, NewRelationshipType, Relationship, RelationshipType,
};
use strata_core::services::{IdentifierService, ReindexSink};
use strata_core::store::{CollectionStore, ItemStore, RelationshipStore, Store, Transaction};
use strata_core::types::DbId;
use strata_events::{DispatchReport, Dispatcher, UnitOfWork};
use strata_versioning::{
    install_item, LocalHandleService, RelationshipReconciler, VersioningConfig,
    VersioningCoordinator,
};

pub const PUBLICATION: &str = "Publication";
pub const PERSON: &str = "Person";

/// Records every batch handed to the sink.
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<Vec<DbId>>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<Vec<DbId>> {
        self.calls.lock().unwrap().clone()
    }

    /// How many reindex signals `item_id` received in total.
    pub fn signals_for(&self, item_id: DbId) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .filter(|id| **id == item_id)
            .count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().iter().map(Vec::len).sum()
    }
}

impl ReindexSink for RecordingSink {
    fn reindex(&self, item_ids: &[DbId]) {
        self.calls.lock().unwrap().push(item_ids.to_vec());
    }
}

/// Identifier service that is always down.
pub struct UnavailableIdentifiers;

#[async_trait]
impl IdentifierService for UnavailableIdentifiers {
    async fn reserve(&self, _item_id: DbId) -> Result<String, CoreError> {
        Err(CoreError::External {
            service: "handle",
            message: "connection refused".into(),
        })
    }

    async fn delete(&self, _item_id: DbId) -> Result<(), CoreError> {
        Err(CoreError::External {
            service: "handle",
            message: "connection refused".into(),
        })
    }
}

/// A memory store, the default configuration and the wiring around them.
pub struct Harness {
    pub store: MemoryStore,
    pub config: VersioningConfig,
    pub handles: Arc<LocalHandleService>,
    pub sink: Arc<RecordingSink>,
    pub coordinator: VersioningCoordinator<MemoryStore>,
    pub dispatcher: Dispatcher<MemoryTransaction>,
    pub collection_id: DbId,
}

impl Harness {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let config = VersioningConfig::default();
        let handles = Arc::new(LocalHandleService::new(config.handle_prefix.clone()));
        let sink = Arc::new(RecordingSink::default());
        let coordinator = VersioningCoordinator::new(store.clone(), &config, handles.clone());
        let dispatcher: Dispatcher<MemoryTransaction> =
            Dispatcher::new(sink.clone()).with_consumer(Arc::new(RelationshipReconciler::new()));

        let mut tx = store.begin().await.unwrap();
        let collection = tx.create_collection("Publications").await.unwrap();
        tx.commit().await.unwrap();

        Self {
            store,
            config,
            handles,
            sink,
            coordinator,
            dispatcher,
            collection_id: collection.id,
        }
    }

    pub async fn tx(&self) -> MemoryTransaction {
        self.store.begin().await.unwrap()
    }

    pub async fn item(&self, id: DbId) -> Option<Item> {
        self.tx().await.get_item(id).await.unwrap()
    }

    pub async fn relationship(&self, id: DbId) -> Option<Relationship> {
        self.tx().await.get_relationship(id).await.unwrap()
    }

    /// Store a live item of the given entity type with a title, an
    /// accession date, a provenance note and one file.
    pub async fn archived_item(&self, title: &str, entity_type: &str) -> Item {
        let draft = ItemDraft::new()
            .archived()
            .in_collection(self.collection_id)
            .submitted_by(1)
            .with_field(MetadataValue::new("dc", "title", None, title))
            .with_field(MetadataValue::new("dspace", "entity", Some("type"), entity_type))
            .with_field(MetadataValue::new(
                "dc",
                "date",
                Some("accessioned"),
                "2020-05-01T10:00:00Z",
            ))
            .with_field(MetadataValue::new(
                "dc",
                "description",
                Some("provenance"),
                "Submitted by admin",
            ))
            .with_bundle(
                BundleDraft::new(DEFAULT_BUNDLE)
                    .with_primary(BitstreamDraft::from_bytes("article.pdf", title.as_bytes())),
            );

        let mut tx = self.tx().await;
        let item = tx.create_item(draft).await.unwrap();
        tx.add_to_collection(self.collection_id, item.id).await.unwrap();
        tx.commit().await.unwrap();
        item
    }

    pub async fn relationship_type(
        &self,
        left_label: &str,
        left_entity_type: Option<&str>,
        right_entity_type: Option<&str>,
    ) -> RelationshipType {
        let mut tx = self.tx().await;
        let created = tx
            .create_relationship_type(NewRelationshipType {
                left_entity_type: left_entity_type.map(str::to_string),
                right_entity_type: right_entity_type.map(str::to_string),
                left_label: left_label.to_string(),
                right_label: format!("{left_label}Inverse"),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        created
    }

    pub async fn link(&self, type_id: DbId, left: DbId, right: DbId) -> Relationship {
        let mut tx = self.tx().await;
        let created = tx
            .create_relationship(NewRelationship::between(type_id, left, right))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        created
    }

    /// Install `item_id` in its own unit of work and complete it.
    pub async fn install(&self, item_id: DbId) -> Result<DispatchReport, CoreError> {
        let mut uow = UnitOfWork::new(self.tx().await);
        install_item(&mut uow, item_id).await?;
        self.dispatcher.complete(uow).await
    }

    /// Edges of `item_id`, ordered by id.
    pub async fn relationships_of(&self, item_id: DbId) -> Vec<Relationship> {
        let mut edges = self
            .tx()
            .await
            .relationships_of_item(item_id, None)
            .await
            .unwrap();
        edges.sort_by_key(|r| r.id);
        edges
    }
}
