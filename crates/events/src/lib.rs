//! Strata event plumbing.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`; also a [`ReindexSink`] for in-process
//!   subscribers.
//! - [`PlatformEvent`]: the domain event envelope.
//! - [`UnitOfWork`]: one store transaction plus the events and reindex
//!   requests accumulated while it runs.
//! - [`Dispatcher`]: hands accumulated events to [`Consumer`]s, commits,
//!   then flushes the reindex batch.
//! - [`TracingReindexSink`]: writes reindex signals to the log when no
//!   indexer is subscribed.
//!
//! [`ReindexSink`]: strata_core::services::ReindexSink

pub mod bus;
pub mod dispatcher;
pub mod sink;
pub mod unit_of_work;

pub use bus::{EventBus, PlatformEvent};
pub use dispatcher::{Consumer, DispatchReport, Dispatcher};
pub use sink::TracingReindexSink;
pub use unit_of_work::{ReindexBatch, UnitOfWork};
