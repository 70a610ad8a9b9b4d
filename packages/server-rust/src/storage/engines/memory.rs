//! In-memory [`DataStore`] implementation backed by a single [`RwLock`].
//!
//! Both tables sit behind one lock so that multi-table reads (page + count)
//! and writes that touch both tables (cascading delete) are atomic. Suitable
//! for development, tests, and single-node deployments where all data fits
//! in memory.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use eventboard_core::{
    QueryFilter, Resource, ResourceDraft, ResourcePatch, SavedRelation, SortDirection, SortField,
    SortSpec,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::storage::{PageRead, StoreError, SAVED_RELATION_UNIQUE};
use crate::traits::DataStore;

#[derive(Default)]
struct Tables {
    /// Insertion order is preserved; it is the order ties resolve in.
    resources: Vec<Resource>,
    saved: HashMap<(String, String), SavedRelation>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    fn position(&self, id: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.id == id)
    }

    /// Wall-clock now, nudged forward so consecutive writes never share a timestamp.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + TimeDelta::milliseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn select(&self, filter: &QueryFilter, sort: &SortSpec) -> Vec<&Resource> {
        let mut rows: Vec<&Resource> = self
            .resources
            .iter()
            .filter(|r| filter.matches(r))
            .collect();
        // Stable: equal keys keep insertion order.
        rows.sort_by(|a, b| compare(a, b, sort));
        rows
    }
}

fn compare(a: &Resource, b: &Resource, sort: &SortSpec) -> Ordering {
    let ord = match sort.field {
        SortField::ScheduledDate => a.scheduled_date.cmp(&b.scheduled_date),
        SortField::Title => a.title.cmp(&b.title),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::OrganizerName => a.organizer_name.cmp(&b.organizer_name),
        SortField::Category => a.category.cmp(&b.category),
    };
    match sort.direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn window(rows: Vec<&Resource>, skip: u64, take: u64) -> Vec<Resource> {
    // Offsets are bounded by the in-memory table size, so truncation is safe.
    rows.into_iter()
        .skip(skip as usize)
        .take(take.min(usize::MAX as u64) as usize)
        .cloned()
        .collect()
}

/// In-memory data store. Cheap to construct; share it as `Arc<MemoryDataStore>`.
#[derive(Default)]
pub struct MemoryDataStore {
    tables: RwLock<Tables>,
}

impl MemoryDataStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved relations currently held. Test and diagnostics helper.
    #[must_use]
    pub fn saved_len(&self) -> usize {
        self.tables.read().saved.len()
    }

    /// Number of resources currently held. Test and diagnostics helper.
    #[must_use]
    pub fn resources_len(&self) -> usize {
        self.tables.read().resources.len()
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn connect(&self) -> anyhow::Result<()> {
        debug!("memory data store ready");
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
        let tables = self.tables.read();
        Ok(window(tables.select(filter, sort), skip, take))
    }

    async fn count(&self, filter: &QueryFilter) -> Result<u64, StoreError> {
        let tables = self.tables.read();
        let matched = tables.resources.iter().filter(|r| filter.matches(r));
        Ok(matched.count() as u64)
    }

    async fn read_page(
        &self,
        filter: &QueryFilter,
        sort: &SortSpec,
        skip: u64,
        take: u64,
    ) -> Result<PageRead, StoreError> {
        // One guard for both reads.
        let tables = self.tables.read();
        let rows = tables.select(filter, sort);
        let total = rows.len() as u64;
        Ok(PageRead {
            items: window(rows, skip, take),
            total,
        })
    }

    async fn find_resource(&self, id: &str) -> Result<Option<Resource>, StoreError> {
        let tables = self.tables.read();
        Ok(tables.resources.iter().find(|r| r.id == id).cloned())
    }

    async fn find_resources(&self, ids: &[String]) -> Result<Vec<Resource>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .resources
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn create_resource(
        &self,
        owner_id: &str,
        draft: ResourceDraft,
    ) -> Result<Resource, StoreError> {
        let mut tables = self.tables.write();
        let now = tables.next_timestamp();
        let resource = Resource {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            title: draft.title,
            description: draft.description,
            scheduled_date: draft.scheduled_date,
            scheduled_time: draft.scheduled_time,
            location_description: draft.location_description,
            organizer_name: draft.organizer_name,
            category: draft.category,
            tags: draft.tags,
            external_url: draft.external_url,
            created_at: now,
            updated_at: now,
        };
        tables.resources.push(resource.clone());
        Ok(resource)
    }

    async fn update_resource(
        &self,
        id: &str,
        patch: &ResourcePatch,
    ) -> Result<Resource, StoreError> {
        let mut tables = self.tables.write();
        let Some(idx) = tables.position(id) else {
            return Err(StoreError::RecordNotFound {
                cause: Some(format!("resource {id} does not exist")),
            });
        };
        let now = tables.next_timestamp();
        let resource = &mut tables.resources[idx];
        patch.apply_to(resource);
        resource.updated_at = now;
        Ok(resource.clone())
    }

    async fn delete_resource(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let Some(idx) = tables.position(id) else {
            return Err(StoreError::RecordNotFound {
                cause: Some(format!("resource {id} does not exist")),
            });
        };
        tables.resources.remove(idx);
        tables.saved.retain(|(_, resource_id), _| resource_id != id);
        Ok(())
    }

    async fn count_resources(&self) -> Result<u64, StoreError> {
        Ok(self.tables.read().resources.len() as u64)
    }

    async fn find_saved(
        &self,
        user_id: &str,
        resource_id: &str,
    ) -> Result<Option<SavedRelation>, StoreError> {
        let key = (user_id.to_string(), resource_id.to_string());
        Ok(self.tables.read().saved.get(&key).cloned())
    }

    async fn create_saved(
        &self,
        user_id: &str,
        resource_id: &str,
    ) -> Result<SavedRelation, StoreError> {
        let mut tables = self.tables.write();
        if tables.position(resource_id).is_none() {
            return Err(StoreError::ForeignKeyViolation {
                field: Some("resourceId".to_string()),
            });
        }
        let key = (user_id.to_string(), resource_id.to_string());
        if tables.saved.contains_key(&key) {
            return Err(StoreError::UniqueViolation {
                constraint: SAVED_RELATION_UNIQUE.to_string(),
            });
        }
        let relation = SavedRelation {
            user_id: user_id.to_string(),
            resource_id: resource_id.to_string(),
            saved_at: tables.next_timestamp(),
        };
        tables.saved.insert(key, relation.clone());
        Ok(relation)
    }

    async fn delete_saved(&self, user_id: &str, resource_id: &str) -> Result<bool, StoreError> {
        let key = (user_id.to_string(), resource_id.to_string());
        Ok(self.tables.write().saved.remove(&key).is_some())
    }

    async fn count_saved(&self) -> Result<u64, StoreError> {
        Ok(self.tables.read().saved.len() as u64)
    }

    async fn all_categories(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .resources
            .iter()
            .map(|r| r.category.clone())
            .collect())
    }

    async fn all_tags(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .resources
            .iter()
            .flat_map(|r| r.tags.iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use eventboard_core::{PredicateNode, TextField};

    use super::*;

    fn draft(title: &str, category: &str, day: u32) -> ResourceDraft {
        ResourceDraft {
            title: title.to_string(),
            description: "Something worth attending".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 6, day).unwrap(),
            scheduled_time: None,
            location_description: "Town square".to_string(),
            organizer_name: "Council".to_string(),
            category: category.to_string(),
            tags: vec!["outdoor".to_string()],
            external_url: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_monotonic_timestamps() {
        let store = MemoryDataStore::new();
        let a = store
            .create_resource("u1", draft("A", "Music", 1))
            .await
            .unwrap();
        let b = store
            .create_resource("u1", draft("B", "Music", 2))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.created_at > a.created_at);
        assert_eq!(a.created_at, a.updated_at);
    }

    #[tokio::test]
    async fn read_page_counts_all_matches_but_returns_window() {
        let store = MemoryDataStore::new();
        for day in 1..=5 {
            store
                .create_resource("u1", draft(&format!("E{day}"), "Music", day))
                .await
                .unwrap();
        }
        store
            .create_resource("u1", draft("Other", "Sports", 9))
            .await
            .unwrap();

        let filter = QueryFilter {
            conjuncts: vec![PredicateNode::Eq {
                field: TextField::Category,
                value: "Music".to_string(),
            }],
        };
        let sort = SortSpec {
            field: SortField::ScheduledDate,
            direction: SortDirection::Asc,
        };
        let page = store.read_page(&filter, &sort, 2, 2).await.unwrap();
        assert_eq!(page.total, 5);
        let titles: Vec<_> = page.items.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["E3", "E4"]);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = MemoryDataStore::new();
        for title in ["first", "second", "third"] {
            store
                .create_resource("u1", draft(title, "Same", 1))
                .await
                .unwrap();
        }
        let sort = SortSpec {
            field: SortField::Category,
            direction: SortDirection::Asc,
        };
        let rows = store.find(&QueryFilter::all(), &sort, 0, 10).await.unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn update_and_delete_missing_report_record_not_found() {
        let store = MemoryDataStore::new();
        let err = store
            .update_resource("missing", &ResourcePatch::default())
            .await
            .unwrap_err();
        assert!(err.is_record_not_found());
        let err = store.delete_resource("missing").await.unwrap_err();
        assert!(err.is_record_not_found());
    }

    #[tokio::test]
    async fn update_bumps_updated_at_only() {
        let store = MemoryDataStore::new();
        let created = store
            .create_resource("u1", draft("A", "Music", 1))
            .await
            .unwrap();
        let patch = ResourcePatch {
            title: Some("A2".to_string()),
            ..ResourcePatch::default()
        };
        let updated = store.update_resource(&created.id, &patch).await.unwrap();
        assert_eq!(updated.title, "A2");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.owner_id, "u1");
    }

    #[tokio::test]
    async fn saved_relation_enforces_uniqueness_and_foreign_key() {
        let store = MemoryDataStore::new();
        let r = store
            .create_resource("u1", draft("A", "Music", 1))
            .await
            .unwrap();

        store.create_saved("u2", &r.id).await.unwrap();
        let dup = store.create_saved("u2", &r.id).await.unwrap_err();
        assert!(dup.is_unique_violation());

        let fk = store.create_saved("u2", "missing").await.unwrap_err();
        assert!(
            matches!(fk, StoreError::ForeignKeyViolation { field: Some(f) } if f == "resourceId")
        );
        assert_eq!(store.count_saved().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_resource_cascades_saved_relations() {
        let store = MemoryDataStore::new();
        let r = store
            .create_resource("u1", draft("A", "Music", 1))
            .await
            .unwrap();
        store.create_saved("u2", &r.id).await.unwrap();
        store.create_saved("u3", &r.id).await.unwrap();

        store.delete_resource(&r.id).await.unwrap();
        assert_eq!(store.saved_len(), 0);
        assert!(!store.delete_saved("u2", &r.id).await.unwrap());
    }

    #[tokio::test]
    async fn all_categories_returns_one_entry_per_resource() {
        let store = MemoryDataStore::new();
        for (title, category) in [("A", "Music"), ("B", "Art"), ("C", "Music")] {
            store
                .create_resource("u1", draft(title, category, 1))
                .await
                .unwrap();
        }
        let categories = store.all_categories().await.unwrap();
        assert_eq!(categories, vec!["Music", "Art", "Music"]);
    }

    #[tokio::test]
    async fn read_page_stays_consistent_under_concurrent_writes() {
        let store = Arc::new(MemoryDataStore::new());
        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..200 {
                    store
                        .create_resource("u1", draft(&format!("W{i}"), "Music", 1))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..200 {
            let page = store
                .read_page(&QueryFilter::all(), &SortSpec::default(), 0, 10)
                .await
                .unwrap();
            assert_eq!(page.items.len() as u64, page.total.min(10));
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert_eq!(store.resources_len(), 200);
    }
}
