//! Idempotent save/unsave of a user's bookmark on a resource.

use eventboard_core::SavedRelation;
use tracing::debug;

use super::admission::{Admission, AdmissionGate, CapacityScope};
use crate::storage::StoreError;
use crate::traits::DataStore;

/// Outcome of a save attempt. Every variant except `Saved` means no row was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(SavedRelation),
    AlreadySaved,
    NotFound,
    CapacityExceeded(CapacityScope),
}

/// Outcome of an unsave attempt. Both variants are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsaveOutcome {
    Removed,
    NotSaved,
}

/// Applies save/unsave against the data store under the saved-relation cap.
pub struct RelationMutator<'a> {
    store: &'a dyn DataStore,
    gate: AdmissionGate,
}

impl<'a> RelationMutator<'a> {
    #[must_use]
    pub fn new(store: &'a dyn DataStore, max_saved_relations: u64) -> Self {
        Self {
            store,
            gate: AdmissionGate::new(CapacityScope::SavedRelations, max_saved_relations),
        }
    }

    /// Admission, then target existence, then idempotency, then create.
    ///
    /// A uniqueness violation on create means a concurrent save won the race
    /// and is reported as `AlreadySaved`.
    ///
    /// # Errors
    ///
    /// Any other data store failure propagates unchanged.
    pub async fn save(&self, user_id: &str, resource_id: &str) -> Result<SaveOutcome, StoreError> {
        if let Admission::Rejected(scope) =
            self.gate.check(|| self.store.count_saved()).await?
        {
            return Ok(SaveOutcome::CapacityExceeded(scope));
        }

        if self.store.find_resource(resource_id).await?.is_none() {
            return Ok(SaveOutcome::NotFound);
        }

        if self.store.find_saved(user_id, resource_id).await?.is_some() {
            return Ok(SaveOutcome::AlreadySaved);
        }

        match self.store.create_saved(user_id, resource_id).await {
            Ok(relation) => Ok(SaveOutcome::Saved(relation)),
            Err(err) if err.is_unique_violation() => {
                debug!(user_id, resource_id, "concurrent save already applied");
                Ok(SaveOutcome::AlreadySaved)
            }
            Err(err) => Err(err),
        }
    }

    /// Removes the relation if present. A missing row is not an error.
    ///
    /// # Errors
    ///
    /// Data store failures other than a missing row propagate unchanged.
    pub async fn unsave(
        &self,
        user_id: &str,
        resource_id: &str,
    ) -> Result<UnsaveOutcome, StoreError> {
        match self.store.delete_saved(user_id, resource_id).await {
            Ok(true) => Ok(UnsaveOutcome::Removed),
            Ok(false) => Ok(UnsaveOutcome::NotSaved),
            Err(err) if err.is_record_not_found() => Ok(UnsaveOutcome::NotSaved),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use eventboard_core::{QueryFilter, Resource, ResourceDraft, ResourcePatch, SortSpec};

    use super::*;
    use crate::storage::{MemoryDataStore, PageRead};

    fn draft() -> ResourceDraft {
        ResourceDraft {
            title: "Night Market".to_string(),
            description: "Street food and stalls".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
            scheduled_time: None,
            location_description: "Canal street".to_string(),
            organizer_name: "Traders Guild".to_string(),
            category: "Food".to_string(),
            tags: vec!["market".to_string()],
            external_url: None,
        }
    }

    #[tokio::test]
    async fn saving_twice_writes_one_row() {
        let store = MemoryDataStore::new();
        let resource = store.create_resource("owner", draft()).await.unwrap();
        let mutator = RelationMutator::new(&store, 10);

        let first = mutator.save("u1", &resource.id).await.unwrap();
        let SaveOutcome::Saved(relation) = first else {
            panic!("first save should create a relation");
        };
        assert_eq!(relation.resource_id, resource.id);
        let second = mutator.save("u1", &resource.id).await.unwrap();
        assert_eq!(second, SaveOutcome::AlreadySaved);
        assert_eq!(store.saved_len(), 1);
    }

    #[tokio::test]
    async fn saving_unknown_resource_is_not_found() {
        let store = MemoryDataStore::new();
        let mutator = RelationMutator::new(&store, 10);
        let outcome = mutator.save("u1", "nope").await.unwrap();
        assert_eq!(outcome, SaveOutcome::NotFound);
        assert_eq!(store.saved_len(), 0);
    }

    #[tokio::test]
    async fn admission_runs_before_existence() {
        let store = MemoryDataStore::new();
        let mutator = RelationMutator::new(&store, 0);
        assert_eq!(
            mutator.save("u1", "nope").await.unwrap(),
            SaveOutcome::CapacityExceeded(CapacityScope::SavedRelations)
        );
    }

    #[tokio::test]
    async fn unsave_is_idempotent() {
        let store = MemoryDataStore::new();
        let resource = store.create_resource("owner", draft()).await.unwrap();
        let mutator = RelationMutator::new(&store, 10);
        mutator.save("u1", &resource.id).await.unwrap();

        let removed = mutator.unsave("u1", &resource.id).await.unwrap();
        assert_eq!(removed, UnsaveOutcome::Removed);
        let repeated = mutator.unsave("u1", &resource.id).await.unwrap();
        assert_eq!(repeated, UnsaveOutcome::NotSaved);
        let never = mutator.unsave("u2", "never").await.unwrap();
        assert_eq!(never, UnsaveOutcome::NotSaved);
    }

    /// Wraps the memory store and hides existing relations from `find_saved`,
    /// reproducing the window where a concurrent save lands between the
    /// idempotency check and the insert.
    struct RacingStore {
        inner: MemoryDataStore,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl DataStore for RacingStore {
        async fn connect(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn disconnect(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn find(
            &self,
            filter: &QueryFilter,
            sort: &SortSpec,
            skip: u64,
            take: u64,
        ) -> Result<Vec<Resource>, StoreError> {
            self.inner.find(filter, sort, skip, take).await
        }
        async fn count(&self, filter: &QueryFilter) -> Result<u64, StoreError> {
            self.inner.count(filter).await
        }
        async fn read_page(
            &self,
            filter: &QueryFilter,
            sort: &SortSpec,
            skip: u64,
            take: u64,
        ) -> Result<PageRead, StoreError> {
            self.inner.read_page(filter, sort, skip, take).await
        }
        async fn find_resource(&self, id: &str) -> Result<Option<Resource>, StoreError> {
            self.inner.find_resource(id).await
        }
        async fn find_resources(&self, ids: &[String]) -> Result<Vec<Resource>, StoreError> {
            self.inner.find_resources(ids).await
        }
        async fn create_resource(
            &self,
            owner_id: &str,
            draft: ResourceDraft,
        ) -> Result<Resource, StoreError> {
            self.inner.create_resource(owner_id, draft).await
        }
        async fn update_resource(
            &self,
            id: &str,
            patch: &ResourcePatch,
        ) -> Result<Resource, StoreError> {
            self.inner.update_resource(id, patch).await
        }
        async fn delete_resource(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete_resource(id).await
        }
        async fn count_resources(&self) -> Result<u64, StoreError> {
            self.inner.count_resources().await
        }
        async fn find_saved(
            &self,
            _user_id: &str,
            _resource_id: &str,
        ) -> Result<Option<SavedRelation>, StoreError> {
            Ok(None)
        }
        async fn create_saved(
            &self,
            user_id: &str,
            resource_id: &str,
        ) -> Result<SavedRelation, StoreError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create_saved(user_id, resource_id).await
        }
        async fn delete_saved(&self, user_id: &str, resource_id: &str) -> Result<bool, StoreError> {
            self.inner.delete_saved(user_id, resource_id).await
        }
        async fn count_saved(&self) -> Result<u64, StoreError> {
            self.inner.count_saved().await
        }
        async fn all_categories(&self) -> Result<Vec<String>, StoreError> {
            self.inner.all_categories().await
        }
        async fn all_tags(&self) -> Result<Vec<String>, StoreError> {
            self.inner.all_tags().await
        }
    }

    #[tokio::test]
    async fn unique_violation_on_create_is_already_saved() {
        let store = RacingStore {
            inner: MemoryDataStore::new(),
            creates: AtomicUsize::new(0),
        };
        let resource = store.create_resource("owner", draft()).await.unwrap();
        let mutator = RelationMutator::new(&store, 10);

        assert!(matches!(
            mutator.save("u1", &resource.id).await.unwrap(),
            SaveOutcome::Saved(_)
        ));
        assert_eq!(
            mutator.save("u1", &resource.id).await.unwrap(),
            SaveOutcome::AlreadySaved
        );
        assert_eq!(store.creates.load(Ordering::SeqCst), 2);
        assert_eq!(store.inner.saved_len(), 1);
    }
}
