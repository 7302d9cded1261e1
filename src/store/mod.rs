//! Durable storage: key-value backends and the saved/nearest place store.

pub mod places;
pub mod storage;

pub use places::{
    load_collection, Collection, LocalPlaceStore, NearestPlaceRecord, SavedPlaceRecord, NEAREST_KEY, SAVED_KEY,
};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
