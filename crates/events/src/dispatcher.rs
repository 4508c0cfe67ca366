//! Batched event dispatch at the end of a unit of work.
//!
//! [`Dispatcher::complete`] runs in four phases:
//!
//! 1. drain pending events and hand each one to every accepting
//!    [`Consumer`]; consumers may emit follow-up events, which are drained in
//!    later rounds up to [`MAX_ROUNDS`];
//! 2. call [`Consumer::finish`] on every consumer;
//! 3. commit the transaction;
//! 4. send the reindex batch to the [`ReindexSink`].
//!
//! Any error before the commit drops the transaction, so nothing the unit
//! of work did becomes visible and no reindex signal is sent.

use std::sync::Arc;

use async_trait::async_trait;
use strata_core::error::CoreError;
use strata_core::services::ReindexSink;
use strata_core::store::Transaction;
use strata_core::types::DbId;
use uuid::Uuid;

use crate::bus::PlatformEvent;
use crate::unit_of_work::UnitOfWork;

/// Upper bound on follow-up event rounds within one unit of work.
pub const MAX_ROUNDS: usize = 16;

/// Reacts to events of a unit of work inside its transaction.
#[async_trait]
pub trait Consumer<T: Transaction + 'static>: Send + Sync {
    /// Name used in log fields.
    fn name(&self) -> &'static str;

    /// Whether [`consume`](Consumer::consume) wants this event.
    fn accepts(&self, event: &PlatformEvent) -> bool;

    async fn consume(
        &self,
        uow: &mut UnitOfWork<T>,
        event: &PlatformEvent,
    ) -> Result<(), CoreError>;

    /// Called once after all events are consumed, before the commit.
    async fn finish(&self, _uow: &mut UnitOfWork<T>) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Summary of a completed unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub unit_of_work: Uuid,
    /// Events handed to consumers, follow-ups included.
    pub events: usize,
    /// Items sent to the reindex sink, in scheduling order.
    pub reindexed: Vec<DbId>,
}

pub struct Dispatcher<T: Transaction + 'static> {
    consumers: Vec<Arc<dyn Consumer<T>>>,
    sink: Arc<dyn ReindexSink>,
}

impl<T: Transaction + 'static> Dispatcher<T> {
    pub fn new(sink: Arc<dyn ReindexSink>) -> Self {
        Self {
            consumers: Vec::new(),
            sink,
        }
    }

    /// Register a consumer. Consumers see events in registration order.
    pub fn with_consumer(mut self, consumer: Arc<dyn Consumer<T>>) -> Self {
        self.consumers.push(consumer);
        self
    }

    /// Dispatch the unit of work's events, commit it and flush its reindex
    /// batch.
    pub async fn complete(&self, mut uow: UnitOfWork<T>) -> Result<DispatchReport, CoreError> {
        let uow_id = uow.id();
        let mut handled = 0;

        for round in 0.. {
            let events = uow.take_events();
            if events.is_empty() {
                break;
            }
            if round == MAX_ROUNDS {
                tracing::error!(
                    unit_of_work = %uow_id,
                    pending = events.len(),
                    "Event cascade did not settle"
                );
                return Err(CoreError::IllegalState(format!(
                    "Unit of work {uow_id} still emitting events after {MAX_ROUNDS} rounds"
                )));
            }
            for event in &events {
                handled += 1;
                for consumer in self.consumers.iter().filter(|c| c.accepts(event)) {
                    if let Err(e) = consumer.consume(&mut uow, event).await {
                        tracing::error!(
                            unit_of_work = %uow_id,
                            consumer = consumer.name(),
                            event_type = %event.event_type,
                            error = %e,
                            "Event consumer failed, rolling back"
                        );
                        return Err(e);
                    }
                }
            }
        }

        for consumer in &self.consumers {
            if let Err(e) = consumer.finish(&mut uow).await {
                tracing::error!(
                    unit_of_work = %uow_id,
                    consumer = consumer.name(),
                    error = %e,
                    "Consumer finish failed, rolling back"
                );
                return Err(e);
            }
        }

        if uow.pending_events() > 0 {
            tracing::warn!(
                unit_of_work = %uow_id,
                dropped = uow.pending_events(),
                "Events emitted during finish are not dispatched"
            );
        }

        let (tx, batch) = uow.into_parts();
        tx.commit().await?;

        let reindexed = batch.map(|b| b.into_vec()).unwrap_or_default();
        if !reindexed.is_empty() {
            self.sink.reindex(&reindexed);
        }
        tracing::debug!(
            unit_of_work = %uow_id,
            events = handled,
            reindexed = reindexed.len(),
            "Unit of work completed"
        );

        Ok(DispatchReport {
            unit_of_work: uow_id,
            events: handled,
            reindexed,
        })
    }
}
