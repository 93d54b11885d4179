pub mod factory;
pub mod json;
pub mod sqlite;
pub mod traits;

pub use factory::create_memory_store;
pub use json::JsonMemoryStore;
pub use sqlite::SqliteMemoryStore;
pub use traits::MemoryStore;
