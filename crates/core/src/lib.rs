//! Domain types, pure algorithms and persistence seams for the version
//! history and relationship consistency engine.

pub mod cloner;
pub mod correction;
pub mod error;
pub mod hashing;
pub mod item;
pub mod memory;
pub mod metadata;
pub mod relationship;
pub mod services;
pub mod store;
pub mod types;
pub mod version;
