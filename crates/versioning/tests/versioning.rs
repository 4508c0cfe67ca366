mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{Harness, UnavailableIdentifiers, PERSON, PUBLICATION};
use strata_core::error::CoreError;
use strata_core::item::DEFAULT_BUNDLE;
use strata_core::store::{CollectionStore, Store, Transaction, VersionStore};
use strata_versioning::{Removal, RestoreOutcome, VersionRegistry, VersioningCoordinator};

#[tokio::test]
async fn first_version_seeds_the_history() {
    let h = Harness::new().await;
    let original = h.archived_item("Seeded", PUBLICATION).await;

    let record = h
        .coordinator
        .create_new_version(original.id, Some("typo fixes"), Some(7))
        .await
        .unwrap();
    assert_eq!(record.version_number, 2);
    assert_eq!(record.summary, "typo fixes");
    assert_eq!(record.creator_id, Some(7));

    let chain = h
        .coordinator
        .history_for_item(original.id)
        .await
        .unwrap()
        .expect("item is versioned now");
    assert_eq!(chain.len(), 2);
    let first = chain.first().unwrap();
    assert_eq!(first.version_number, 1);
    assert_eq!(first.item_id, original.id);
    assert_eq!(first.summary, "");
    assert_eq!(first.created_at, original.accession_date().unwrap());
    assert_eq!(chain.latest().unwrap().item_id, record.item_id);
}

#[tokio::test]
async fn version_numbers_are_monotonic() {
    let h = Harness::new().await;
    let original = h.archived_item("Monotonic", PUBLICATION).await;

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let record = h
            .coordinator
            .create_new_version(original.id, None, None)
            .await
            .unwrap();
        numbers.push(record.version_number);
        h.install(record.item_id).await.unwrap();
    }
    assert_eq!(numbers, vec![2, 3, 4]);

    // Deleting the newest record does not free its number.
    let chain = h.coordinator.history_for_item(original.id).await.unwrap().unwrap();
    let newest = chain.latest().unwrap().clone();
    h.coordinator.remove_version(newest.id).await.unwrap();

    let next = h
        .coordinator
        .create_new_version(original.id, None, None)
        .await
        .unwrap();
    assert_eq!(next.version_number, 5);
}

#[tokio::test]
async fn a_pending_draft_blocks_another_version() {
    let h = Harness::new().await;
    let original = h.archived_item("Draft pending", PUBLICATION).await;
    let draft = h
        .coordinator
        .create_new_version(original.id, None, None)
        .await
        .unwrap();

    assert_matches!(
        h.coordinator.create_new_version(original.id, None, None).await,
        Err(CoreError::PreconditionFailed(_))
    );
    assert_matches!(
        h.coordinator.create_new_version(draft.item_id, None, None).await,
        Err(CoreError::PreconditionFailed(_))
    );
    let chain = h.coordinator.history_for_item(original.id).await.unwrap().unwrap();
    assert_eq!(chain.len(), 2);

    // Once the draft is live the next version can be started from it.
    h.install(draft.item_id).await.unwrap();
    let next = h
        .coordinator
        .create_new_version(draft.item_id, None, None)
        .await
        .unwrap();
    assert_eq!(next.version_number, 3);
}

#[tokio::test]
async fn new_version_is_a_faithful_clone() {
    let h = Harness::new().await;
    let original = h.archived_item("Clone me", PUBLICATION).await;

    let record = h
        .coordinator
        .create_new_version(original.id, None, Some(9))
        .await
        .unwrap();
    let copy = h.item(record.item_id).await.unwrap();

    assert!(!copy.in_archive);
    assert_eq!(copy.submitter_id, Some(9));
    assert_eq!(copy.owning_collection_id, original.owning_collection_id);
    assert_eq!(copy.handle.as_deref(), Some(h.handles.handle_for(copy.id).as_str()));

    assert_eq!(copy.first_value("dc.title"), Some("Clone me"));
    assert_eq!(copy.entity_type(), Some(PUBLICATION));
    assert_eq!(copy.first_value("dc.date.accessioned"), None);
    assert_eq!(copy.first_value("dc.description.provenance"), None);

    let source_bundle = original.bundle(DEFAULT_BUNDLE).unwrap();
    let copied_bundle = copy.bundle(DEFAULT_BUNDLE).unwrap();
    assert_ne!(copied_bundle.id, source_bundle.id);
    assert_eq!(copied_bundle.bitstreams.len(), 1);
    let (source, copied) = (&source_bundle.bitstreams[0], &copied_bundle.bitstreams[0]);
    assert_ne!(copied.id, source.id);
    assert_eq!(copied.checksum, source.checksum);
    assert_eq!(copied.storage_key, source.storage_key);
    assert_eq!(copied_bundle.primary_bitstream_id, Some(copied.id));

    // The source item is left as it was.
    assert_eq!(h.item(original.id).await.unwrap(), original);
}

#[tokio::test]
async fn relationships_are_copied_onto_the_new_version() {
    let h = Harness::new().await;
    let article = h.archived_item("Article", PUBLICATION).await;
    let author = h.archived_item("Author", PERSON).await;
    let authorship = h
        .relationship_type("isAuthorOfPublication", Some(PUBLICATION), Some(PERSON))
        .await;
    let correction = h
        .relationship_type(&h.config.correction_relationship_type, None, None)
        .await;
    let edge = h.link(authorship.id, article.id, author.id).await;
    let stray = h.archived_item("Stray working copy", PUBLICATION).await;
    h.link(correction.id, stray.id, article.id).await;

    let record = h
        .coordinator
        .create_new_version(article.id, None, None)
        .await
        .unwrap();

    let copies = h.relationships_of(record.item_id).await;
    assert_eq!(copies.len(), 1, "correction edges are not copied");
    let copy = &copies[0];
    assert_ne!(copy.id, edge.id);
    assert_eq!(copy.type_id, authorship.id);
    assert_eq!((copy.left_item_id, copy.right_item_id), (record.item_id, author.id));
    assert!(!copy.left_is_latest);
    assert!(copy.right_is_latest);

    let untouched = h.relationship(edge.id).await.unwrap();
    assert!(untouched.left_is_latest && untouched.right_is_latest);
}

#[tokio::test]
async fn missing_item_cannot_be_versioned() {
    let h = Harness::new().await;
    assert_matches!(
        h.coordinator.create_new_version(999, None, None).await,
        Err(CoreError::NotFound { entity: "item", id: 999 })
    );
}

#[tokio::test]
async fn identifier_failure_rolls_everything_back() {
    let h = Harness::new().await;
    let original = h.archived_item("Unlucky", PUBLICATION).await;
    let coordinator =
        VersioningCoordinator::new(h.store.clone(), &h.config, Arc::new(UnavailableIdentifiers));

    let err = coordinator
        .create_new_version(original.id, None, None)
        .await
        .unwrap_err();
    assert_matches!(
        &err,
        CoreError::OperationFailed { operation: "create_new_version", source }
            if matches!(**source, CoreError::External { service: "handle", .. })
    );

    // The seeded history did not survive either.
    let mut tx = h.tx().await;
    assert!(tx.versions_by_item(original.id).await.unwrap().is_empty());
    assert_eq!(h.coordinator.history_for_item(original.id).await.unwrap(), None);
}

#[tokio::test]
async fn removing_the_latest_version_reinstates_its_predecessor() {
    let h = Harness::new().await;
    let original = h.archived_item("Reinstate", PUBLICATION).await;
    let record = h
        .coordinator
        .create_new_version(original.id, None, None)
        .await
        .unwrap();
    h.install(record.item_id).await.unwrap();
    assert!(!h.item(original.id).await.unwrap().in_archive);

    let removal = h.coordinator.remove_version(record.id).await.unwrap();
    assert_eq!(
        removal,
        Removal::Removed {
            chain_deleted: false,
            reinstated: Some(original.id),
        }
    );

    assert!(h.item(original.id).await.unwrap().in_archive);
    assert_eq!(h.item(record.item_id).await, None);
    assert!(h.handles.is_tombstoned(record.item_id));

    let chain = h.coordinator.history_for_item(original.id).await.unwrap().unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(h.coordinator.find_version(record.id).await.unwrap(), None);
}

#[tokio::test]
async fn removing_an_older_version_leaves_the_latest_alone() {
    let h = Harness::new().await;
    let original = h.archived_item("Older", PUBLICATION).await;
    let record = h
        .coordinator
        .create_new_version(original.id, None, None)
        .await
        .unwrap();
    let chain = h.coordinator.history_for_item(original.id).await.unwrap().unwrap();
    let first = chain.first().unwrap().clone();

    let removal = h.coordinator.remove_version(first.id).await.unwrap();
    assert_eq!(
        removal,
        Removal::Removed {
            chain_deleted: false,
            reinstated: None,
        }
    );
    assert_eq!(h.item(original.id).await, None);
    assert!(!h.item(record.item_id).await.unwrap().in_archive);

    let mut tx = h.tx().await;
    assert!(tx.collections_of_item(original.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn removing_the_only_version_deletes_the_chain() {
    let h = Harness::new().await;
    let original = h.archived_item("Alone", PUBLICATION).await;
    let record = h
        .coordinator
        .create_new_version(original.id, None, None)
        .await
        .unwrap();
    let chain = h.coordinator.history_for_item(original.id).await.unwrap().unwrap();
    let first = chain.first().unwrap().clone();

    h.coordinator.remove_version(first.id).await.unwrap();
    let removal = h.coordinator.remove_version(record.id).await.unwrap();
    assert_eq!(
        removal,
        Removal::Removed {
            chain_deleted: true,
            reinstated: None,
        }
    );

    let mut tx = h.tx().await;
    assert_eq!(tx.get_history(record.history_id).await.unwrap(), None);
}

#[tokio::test]
async fn removing_an_unknown_version_is_a_no_op() {
    let h = Harness::new().await;
    assert_eq!(
        h.coordinator.remove_version(12345).await.unwrap(),
        Removal::NothingToDo
    );
}

#[tokio::test]
async fn restore_is_reported_as_unsupported() {
    let h = Harness::new().await;
    let original = h.archived_item("Restore", PUBLICATION).await;
    let record = h
        .coordinator
        .create_new_version(original.id, None, None)
        .await
        .unwrap();
    let before = h.coordinator.history_for_item(original.id).await.unwrap();

    let outcome = h
        .coordinator
        .restore_version(record.id, Some("back to v1"))
        .await
        .unwrap();
    assert_eq!(outcome, RestoreOutcome::Unsupported);
    assert_eq!(h.coordinator.history_for_item(original.id).await.unwrap(), before);
}

#[tokio::test]
async fn summaries_can_be_edited() {
    let h = Harness::new().await;
    let original = h.archived_item("Summary", PUBLICATION).await;
    let record = h
        .coordinator
        .create_new_version(original.id, Some("wip"), None)
        .await
        .unwrap();

    let updated = h.coordinator.update_summary(record.id, "final").await.unwrap();
    assert_eq!(updated.summary, "final");
    assert_eq!(
        h.coordinator.find_version(record.id).await.unwrap().unwrap().summary,
        "final"
    );
}

#[tokio::test]
async fn concurrent_writers_surface_a_retryable_conflict() {
    let h = Harness::new().await;
    let original = h.archived_item("Race", PUBLICATION).await;

    // Another writer holds an open transaction that commits first.
    let mut other = h.store.begin().await.unwrap();
    VersionRegistry::create(&mut other, None, original.id, "", None, chrono::Utc::now())
        .await
        .unwrap();

    h.coordinator
        .create_new_version(original.id, None, None)
        .await
        .unwrap();
    let err = other.commit().await.unwrap_err();
    assert!(err.is_retryable());
}
