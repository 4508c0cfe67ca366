//! Installing an item: the point where the submission workflow hands a
//! snapshot over to the archive.

use chrono::{SecondsFormat, Utc};
use strata_core::error::CoreError;
use strata_core::item::Item;
use strata_core::metadata::{MetadataValue, ACCESSION_DATE_FIELD};
use strata_core::store::Transaction;
use strata_core::types::DbId;
use strata_events::{PlatformEvent, UnitOfWork};

/// Make `item_id` live inside `uow` and queue the install signal.
///
/// Sets the archive flag, records the accession date when the item has
/// none, maps the item into its owning collection and emits
/// `item.installed`. Reconciliation happens when the unit of work is
/// completed.
pub async fn install_item<T: Transaction>(
    uow: &mut UnitOfWork<T>,
    item_id: DbId,
) -> Result<Item, CoreError> {
    let tx = uow.tx();
    let item = tx
        .get_item(item_id)
        .await?
        .ok_or(CoreError::not_found("item", item_id))?;
    let now = Utc::now();

    if item.first_value(ACCESSION_DATE_FIELD).is_none() {
        let mut metadata = item.metadata.clone();
        metadata.push(MetadataValue::parse(
            ACCESSION_DATE_FIELD,
            now.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?);
        tx.replace_metadata(item_id, metadata).await?;
    }
    tx.set_in_archive(item_id, true).await?;
    if let Some(collection_id) = item.owning_collection_id {
        tx.add_to_collection(collection_id, item_id).await?;
    }
    tx.touch_item(item_id, now).await?;

    let installed = tx
        .get_item(item_id)
        .await?
        .ok_or(CoreError::not_found("item", item_id))?;
    uow.emit(PlatformEvent::item_installed(item_id));
    tracing::info!(item_id, unit_of_work = %uow.id(), "Item installed");
    Ok(installed)
}
