use async_trait::async_trait;
use eventboard_core::{
    Principal, QueryFilter, Resource, ResourceDraft, ResourcePatch, SavedRelation, SortSpec,
};

use crate::auth::AuthError;
use crate::storage::{PageRead, StoreError};

/// Pluggable persistence backend for the request pipeline.
/// Implementations: in-memory (tests, local runs); SQL backends plug in here.
///
/// Handles are constructed by the process bootstrap and injected into every
/// component that needs them. Nothing in the pipeline reaches for a global.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Open connections or otherwise prepare the backend.
    async fn connect(&self) -> anyhow::Result<()>;

    /// Release resources and close connections.
    async fn disconnect(&self) -> anyhow::Result<()>;

    /// Resources matching `filter`, ordered by `sort`, after skipping `skip` rows.
    async fn find(
        &self,
        filter: &QueryFilter,
        sort: &SortSpec,
        skip: u64,
        take: u64,
    ) -> Result<Vec<Resource>, StoreError>;

    /// Number of resources matching `filter`.
    async fn count(&self, filter: &QueryFilter) -> Result<u64, StoreError>;

    /// `find` and `count` executed together against one consistent snapshot.
    ///
    /// A write landing concurrently must be either fully visible to both reads
    /// or invisible to both.
    async fn read_page(
        &self,
        filter: &QueryFilter,
        sort: &SortSpec,
        skip: u64,
        take: u64,
    ) -> Result<PageRead, StoreError>;

    /// Load a single resource by id.
    async fn find_resource(&self, id: &str) -> Result<Option<Resource>, StoreError>;

    /// Load every resource whose id is in `ids`. Order is unspecified.
    async fn find_resources(&self, ids: &[String]) -> Result<Vec<Resource>, StoreError>;

    /// Persist a new resource owned by `owner_id`. The store assigns id and timestamps.
    async fn create_resource(
        &self,
        owner_id: &str,
        draft: ResourceDraft,
    ) -> Result<Resource, StoreError>;

    /// Apply `patch` to an existing resource.
    ///
    /// Fails with [`StoreError::RecordNotFound`] if the id does not exist.
    async fn update_resource(&self, id: &str, patch: &ResourcePatch)
        -> Result<Resource, StoreError>;

    /// Delete a resource (and, per the backend's cascade rules, its saved relations).
    ///
    /// Fails with [`StoreError::RecordNotFound`] if the id does not exist.
    async fn delete_resource(&self, id: &str) -> Result<(), StoreError>;

    /// Total number of stored resources.
    async fn count_resources(&self) -> Result<u64, StoreError>;

    /// Composite-key lookup of a saved relation.
    async fn find_saved(
        &self,
        user_id: &str,
        resource_id: &str,
    ) -> Result<Option<SavedRelation>, StoreError>;

    /// Insert a saved relation.
    ///
    /// Fails with [`StoreError::UniqueViolation`] if the pair already exists and
    /// [`StoreError::ForeignKeyViolation`] if the resource does not.
    async fn create_saved(
        &self,
        user_id: &str,
        resource_id: &str,
    ) -> Result<SavedRelation, StoreError>;

    /// Delete a saved relation. Returns whether a row was removed.
    async fn delete_saved(&self, user_id: &str, resource_id: &str) -> Result<bool, StoreError>;

    /// Total number of saved relations across all users.
    async fn count_saved(&self) -> Result<u64, StoreError>;

    /// Category of every resource, possibly with duplicates.
    async fn all_categories(&self) -> Result<Vec<String>, StoreError>;

    /// Tags of every resource, flattened, as stored.
    async fn all_tags(&self) -> Result<Vec<String>, StoreError>;
}

/// Verifies bearer credentials and yields the acting principal.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify `credential` (the bearer token without its scheme prefix).
    async fn verify(&self, credential: &str) -> Result<Principal, AuthError>;
}
