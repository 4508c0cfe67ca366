//! A store transaction plus everything that has to happen once it commits.

use std::collections::VecDeque;

use indexmap::IndexSet;
use strata_core::store::Transaction;
use strata_core::types::DbId;
use uuid::Uuid;

use crate::bus::PlatformEvent;

/// Ordered set of items awaiting reindex. Duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexBatch {
    items: IndexSet<DbId>,
}

impl ReindexBatch {
    /// Returns `false` when the item was already scheduled.
    pub fn insert(&mut self, item_id: DbId) -> bool {
        self.items.insert(item_id)
    }

    pub fn contains(&self, item_id: DbId) -> bool {
        self.items.contains(&item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DbId> + '_ {
        self.items.iter().copied()
    }

    pub fn into_vec(self) -> Vec<DbId> {
        self.items.into_iter().collect()
    }
}

/// One transaction with its pending events and reindex batch.
///
/// Dropping a unit of work without completing it through the
/// [`Dispatcher`](crate::Dispatcher) rolls the transaction back and discards
/// the events.
pub struct UnitOfWork<T> {
    id: Uuid,
    tx: T,
    pending: VecDeque<PlatformEvent>,
    reindex: Option<ReindexBatch>,
}

impl<T: Transaction> UnitOfWork<T> {
    pub fn new(tx: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            tx,
            pending: VecDeque::new(),
            reindex: None,
        }
    }

    /// Correlation id used in log fields.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tx(&mut self) -> &mut T {
        &mut self.tx
    }

    /// Queue an event for the consumers of this unit of work.
    pub fn emit(&mut self, event: PlatformEvent) {
        self.pending.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// Schedule an item for reindexing after commit. The batch is created
    /// on first use.
    pub fn schedule_reindex(&mut self, item_id: DbId) {
        self.reindex.get_or_insert_with(ReindexBatch::default).insert(item_id);
    }

    /// The batch, if anything has been scheduled.
    pub fn reindex_batch(&self) -> Option<&ReindexBatch> {
        self.reindex.as_ref()
    }

    pub(crate) fn take_events(&mut self) -> Vec<PlatformEvent> {
        self.pending.drain(..).collect()
    }

    pub(crate) fn into_parts(self) -> (T, Option<ReindexBatch>) {
        (self.tx, self.reindex)
    }
}
