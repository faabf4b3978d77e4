//! Session memory
//!
//! Durable key-fact store and the storage backends it persists through.

pub mod storage;
pub mod store;

pub use storage::{FileStorage, InMemoryStorage, PostgresStorage, StorageBackend};
pub use store::{MemoryState, MemoryStore, EMPTY_RECALL, MEMORY_KEY};
