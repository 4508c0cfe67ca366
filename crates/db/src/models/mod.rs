//! Row types read from the database and their mapping onto domain types.

pub mod item;
pub mod relationship;
pub mod version;
