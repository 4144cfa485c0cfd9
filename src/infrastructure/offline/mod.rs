mod mappers;
mod queries;
mod rows;
pub mod sqlite_action_store;
pub mod sqlite_reference_cache;

pub use sqlite_action_store::SqliteActionStore;
pub use sqlite_reference_cache::SqliteReferenceCache;
