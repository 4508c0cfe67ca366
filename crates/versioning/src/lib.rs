//! Version history and relationship consistency.
//!
//! - [`VersionRegistry`]: numbering and persistence of version records.
//! - [`VersioningCoordinator`]: create, remove and (not) restore versions.
//! - [`RelationshipReconciler`]: event consumer handing latest status to a
//!   newly installed version.
//! - [`CorrectionCoordinator`]: working-copy corrections merged back into
//!   the original item.
//! - [`install_item`]: the install step that emits `item.installed`.

pub mod config;
pub mod coordinator;
pub mod correction;
pub mod install;
pub mod reconciler;
pub mod registry;
pub mod services;

pub use config::VersioningConfig;
pub use coordinator::{Removal, RestoreOutcome, VersioningCoordinator};
pub use correction::{CorrectionCoordinator, MergeOutcome, WorkflowEntry};
pub use install::install_item;
pub use reconciler::RelationshipReconciler;
pub use registry::{RecordDeletion, VersionRegistry};
pub use services::{LocalHandleService, OwningCollectionPolicy};
