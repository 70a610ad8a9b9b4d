//! Storage types and the reference in-memory engine.
//!
//! The [`DataStore`](crate::traits::DataStore) trait lives in [`crate::traits`];
//! this module holds what implementations share:
//!
//! - [`StoreError`]: constraint-shaped persistence failures
//! - [`PageRead`]: result of the paired page + count read
//! - [`MemoryDataStore`]: `RwLock`-guarded tables for tests and local runs

pub mod engines;
pub mod error;

pub use engines::MemoryDataStore;
pub use error::StoreError;

use eventboard_core::Resource;

/// Items and total count read from the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRead {
    pub items: Vec<Resource>,
    pub total: u64,
}

/// Name of the `(userId, resourceId)` uniqueness constraint on saved relations.
pub const SAVED_RELATION_UNIQUE: &str = "saved_relation_user_resource_key";
