//! [`DataStore`](crate::traits::DataStore) implementations.

mod memory;

pub use memory::MemoryDataStore;
