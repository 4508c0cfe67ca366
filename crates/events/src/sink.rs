//! Reindex sink for processes that run without a search indexer attached.

use std::sync::atomic::{AtomicUsize, Ordering};

use strata_core::services::ReindexSink;
use strata_core::types::DbId;

/// Writes every stale item to the log at `info` so an operator or log
/// shipper can pick it up.
#[derive(Debug, Default)]
pub struct TracingReindexSink {
    sent: AtomicUsize,
}

impl TracingReindexSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reindex signals written so far.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

impl ReindexSink for TracingReindexSink {
    fn reindex(&self, item_ids: &[DbId]) {
        for &item_id in item_ids {
            tracing::info!(item_id, "Item needs reindexing");
        }
        self.sent.fetch_add(item_ids.len(), Ordering::Relaxed);
    }
}
