//! Query layer. Every repository works on a borrowed connection so callers
//! decide the transaction boundaries.

pub mod bitstream_repo;
pub mod collection_repo;
pub mod item_repo;
pub mod relationship_repo;
pub mod version_repo;

pub use bitstream_repo::BitstreamRepo;
pub use collection_repo::CollectionRepo;
pub use item_repo::ItemRepo;
pub use relationship_repo::RelationshipRepo;
pub use version_repo::VersionRepo;
