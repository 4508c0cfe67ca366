//! Integration tests for the PostgreSQL store.
//!
//! Exercises `PgStore` against a real database:
//! - Items round-trip with fields, bundles, bitstreams and primary markers
//! - Version numbers come from the history counter and stay unique
//! - Deleting an item takes its edges and collection mappings along
//! - Dropped transactions leave nothing behind
//! - The versioning coordinator runs end to end on top of the store

use std::sync::Arc;

use assert_matches::assert_matches;
use sqlx::PgPool;
use strata_core::error::CoreError;
use strata_core::item::{BitstreamDraft, BundleDraft, ItemDraft, DEFAULT_BUNDLE};
use strata_core::metadata::MetadataValue;
use strata_core::relationship::{NewRelationship, NewRelationshipType, Side};
use strata_core::store::{
    CollectionStore, ItemStore, RelationshipStore, Store, Transaction, VersionStore,
};
use strata_core::version::NewVersion;
use strata_db::PgStore;
use strata_versioning::{LocalHandleService, VersioningConfig, VersioningCoordinator};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn article(collection_id: i64, title: &str) -> ItemDraft {
    ItemDraft::new()
        .archived()
        .in_collection(collection_id)
        .with_field(MetadataValue::new("dc", "title", None, title))
        .with_field(MetadataValue::new("dc", "contributor", Some("author"), "Doe, Jane"))
        .with_field(MetadataValue::new("dc", "contributor", Some("author"), "Roe, Rick"))
        .with_bundle(
            BundleDraft::new(DEFAULT_BUNDLE)
                .with_bitstream(BitstreamDraft::from_bytes("data.csv", b"1,2,3"))
                .with_primary(
                    BitstreamDraft::from_bytes("paper.pdf", title.as_bytes()).with_field(
                        MetadataValue::new("dc", "description", None, "Camera ready"),
                    ),
                ),
        )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn items_round_trip(pool: PgPool) {
    strata_db::health_check(&pool).await.unwrap();
    let store = PgStore::new(pool);
    let mut tx = store.begin().await.unwrap();
    let collection = tx.create_collection("Articles").await.unwrap();

    let created = tx.create_item(article(collection.id, "Round trip")).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.get_item(created.id).await.unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.first_value("dc.title"), Some("Round trip"));
    let authors: Vec<_> = loaded
        .metadata
        .iter()
        .filter(|v| v.is_field("dc.contributor.author"))
        .map(|v| (v.place, v.value.as_str()))
        .collect();
    assert_eq!(authors, vec![(0, "Doe, Jane"), (1, "Roe, Rick")]);

    let bundle = loaded.default_bundle().unwrap();
    assert_eq!(bundle.bitstreams.len(), 2);
    assert_eq!(bundle.primary().unwrap().name.as_deref(), Some("paper.pdf"));
    assert_eq!(bundle.primary().unwrap().metadata[0].value, "Camera ready");
}

#[sqlx::test(migrations = "./migrations")]
async fn bitstreams_append_and_primary_must_belong_to_the_bundle(pool: PgPool) {
    let store = PgStore::new(pool);
    let mut tx = store.begin().await.unwrap();
    let collection = tx.create_collection("Articles").await.unwrap();
    let first = tx.create_item(article(collection.id, "First")).await.unwrap();
    let second = tx.create_item(article(collection.id, "Second")).await.unwrap();
    let bundle = first.default_bundle().unwrap();

    let added = tx
        .add_bitstream(bundle.id, BitstreamDraft::from_bytes("erratum.pdf", b"erratum"))
        .await
        .unwrap();
    assert_eq!(added.sequence, 2);

    let foreign = second.default_bundle().unwrap().bitstreams[0].id;
    assert_matches!(
        tx.set_primary_bitstream(bundle.id, Some(foreign)).await,
        Err(CoreError::Validation(_))
    );
    assert_matches!(
        tx.set_primary_bitstream(999_999, None).await,
        Err(CoreError::NotFound { entity: "bundle", .. })
    );

    tx.set_primary_bitstream(bundle.id, Some(added.id)).await.unwrap();
    let reloaded = tx.get_item(first.id).await.unwrap().unwrap();
    assert_eq!(reloaded.default_bundle().unwrap().primary_bitstream_id, Some(added.id));
}

#[sqlx::test(migrations = "./migrations")]
async fn version_numbers_come_from_the_history_counter(pool: PgPool) {
    let store = PgStore::new(pool);
    let mut tx = store.begin().await.unwrap();
    let collection = tx.create_collection("Articles").await.unwrap();
    let item = tx.create_item(article(collection.id, "Numbered")).await.unwrap();
    let history = tx.create_history(chrono::Utc::now()).await.unwrap();

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let number = tx.allocate_version_number(history.id).await.unwrap();
        let record = tx
            .insert_version(NewVersion {
                history_id: history.id,
                version_number: number,
                item_id: item.id,
                creator_id: None,
                created_at: chrono::Utc::now(),
                summary: String::new(),
            })
            .await
            .unwrap();
        numbers.push(record.version_number);
    }
    assert_eq!(numbers, vec![1, 2, 3]);

    let newest = tx.versions_by_history(history.id).await.unwrap();
    assert_eq!(newest[0].version_number, 3);
    tx.delete_version(newest[0].id).await.unwrap();
    assert_eq!(tx.allocate_version_number(history.id).await.unwrap(), 4);
    tx.commit().await.unwrap();
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_version_numbers_conflict(pool: PgPool) {
    let store = PgStore::new(pool);
    let mut tx = store.begin().await.unwrap();
    let collection = tx.create_collection("Articles").await.unwrap();
    let item = tx.create_item(article(collection.id, "Twice")).await.unwrap();
    let history = tx.create_history(chrono::Utc::now()).await.unwrap();
    let version = NewVersion {
        history_id: history.id,
        version_number: 1,
        item_id: item.id,
        creator_id: None,
        created_at: chrono::Utc::now(),
        summary: String::new(),
    };

    tx.insert_version(version.clone()).await.unwrap();
    let err = tx.insert_version(version).await.unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_an_item_takes_edges_and_mappings_along(pool: PgPool) {
    let store = PgStore::new(pool);
    let mut tx = store.begin().await.unwrap();
    let collection = tx.create_collection("Articles").await.unwrap();
    let left = tx.create_item(article(collection.id, "Left")).await.unwrap();
    let right = tx.create_item(article(collection.id, "Right")).await.unwrap();
    tx.add_to_collection(collection.id, left.id).await.unwrap();
    tx.add_to_collection(collection.id, left.id).await.unwrap();
    let authorship = tx
        .create_relationship_type(NewRelationshipType {
            left_entity_type: None,
            right_entity_type: None,
            left_label: "isAuthorOfPublication".into(),
            right_label: "isPublicationOfAuthor".into(),
        })
        .await
        .unwrap();
    let edge = tx
        .create_relationship(NewRelationship::between(authorship.id, left.id, right.id))
        .await
        .unwrap();
    tx.set_latest(edge.id, Side::Left, false).await.unwrap();
    assert!(!tx.get_relationship(edge.id).await.unwrap().unwrap().left_is_latest);

    tx.delete_item(left.id).await.unwrap();

    assert_eq!(tx.get_item(left.id).await.unwrap(), None);
    assert_eq!(tx.get_relationship(edge.id).await.unwrap(), None);
    assert!(tx.collections_of_item(left.id).await.unwrap().is_empty());
    assert!(tx.relationships_of_item(right.id, None).await.unwrap().is_empty());
    assert_matches!(
        tx.delete_item(left.id).await,
        Err(CoreError::NotFound { entity: "item", .. })
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn dropped_transactions_roll_back(pool: PgPool) {
    let store = PgStore::new(pool);
    let id = {
        let mut tx = store.begin().await.unwrap();
        let collection = tx.create_collection("Articles").await.unwrap();
        tx.create_item(article(collection.id, "Gone")).await.unwrap().id
    };

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.get_item(id).await.unwrap(), None);
}

#[sqlx::test(migrations = "./migrations")]
async fn coordinator_versions_items_in_postgres(pool: PgPool) {
    let store = PgStore::new(pool);
    let mut tx = store.begin().await.unwrap();
    let collection = tx.create_collection("Articles").await.unwrap();
    let original = tx.create_item(article(collection.id, "Versioned")).await.unwrap();
    tx.add_to_collection(collection.id, original.id).await.unwrap();
    tx.commit().await.unwrap();

    let config = VersioningConfig::default();
    let handles = Arc::new(LocalHandleService::new(config.handle_prefix.clone()));
    let coordinator = VersioningCoordinator::new(store.clone(), &config, handles);

    let record = coordinator
        .create_new_version(original.id, Some("second"), None)
        .await
        .unwrap();
    assert_eq!(record.version_number, 2);

    let chain = coordinator.history_for_item(original.id).await.unwrap().unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.first().unwrap().item_id, original.id);

    let mut tx = store.begin().await.unwrap();
    let copy = tx.get_item(record.item_id).await.unwrap().unwrap();
    assert!(!copy.in_archive);
    assert!(copy.handle.is_some());
    assert_eq!(copy.default_bundle().unwrap().bitstreams.len(), 2);
}
