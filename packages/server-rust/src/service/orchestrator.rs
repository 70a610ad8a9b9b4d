//! Request orchestration for the resource API.
//!
//! Each public operation is a single linear pass: authenticate, validate,
//! run domain logic, shape the success value. Any failure along the way is
//! handed to the [`ErrorClassifier`] exactly once, at the operation boundary.
//! Nothing here retries.

use std::collections::HashMap;
use std::sync::Arc;

use eventboard_core::{Page, Principal, Resource, SavedRelation};
use tracing::{debug, info};

use super::admission::{Admission, AdmissionGate, CapacityScope};
use super::classify::{ApiError, ErrorClassifier, Failure};
use super::config::ServiceConfig;
use super::guard::{authorize, Authorization};
use super::operation::{OperationContext, OperationKind};
use super::query::{aggregate_categories, aggregate_tags, QueryCompiler};
use super::relation::{RelationMutator, SaveOutcome, UnsaveOutcome};
use super::validate::{
    validate_batch_get, validate_create, validate_list, validate_resource_id,
    validate_update, RawListParams,
};
use crate::auth::AuthError;
use crate::traits::DataStore;

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveReply {
    /// A new relation was written.
    Created(SavedRelation),
    /// The relation already existed; nothing was written.
    AlreadySaved,
}

/// Verified principal, or why verification failed.
pub type Credential = Result<Principal, AuthError>;

/// Runs every resource operation against an injected [`DataStore`].
#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn DataStore>,
    compiler: QueryCompiler,
    classifier: ErrorClassifier,
    config: ServiceConfig,
}

impl ResourceService {
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>, config: ServiceConfig) -> Self {
        Self {
            compiler: QueryCompiler::new(Arc::clone(&store)),
            classifier: ErrorClassifier::new(config.environment),
            store,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    fn fail(&self, failure: Failure, ctx: &OperationContext) -> ApiError {
        self.classifier.classify(failure, ctx)
    }

    /// Classifies a failure raised before the operation could start, such as
    /// an unreadable request body.
    #[must_use]
    pub fn reject(&self, kind: OperationKind, failure: Failure) -> ApiError {
        self.fail(failure, &OperationContext::new(kind))
    }

    /// Resolves the caller, classifying a rejected credential under `ctx`.
    fn authenticate(
        &self,
        credential: Credential,
        ctx: OperationContext,
    ) -> Result<(Principal, OperationContext), ApiError> {
        match credential {
            Ok(principal) => {
                let ctx = ctx.with_principal(&principal);
                Ok((principal, ctx))
            }
            Err(err) => Err(self.fail(err.into(), &ctx)),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Filtered, sorted, paginated listing.
    ///
    /// # Errors
    ///
    /// 400 for invalid parameters; 500 on store faults.
    pub async fn list(&self, params: &RawListParams) -> Result<Page<Resource>, ApiError> {
        let ctx = OperationContext::new(OperationKind::List);
        self.run_list(params).await.map_err(|f| self.fail(f, &ctx))
    }

    async fn run_list(&self, params: &RawListParams) -> Result<Page<Resource>, Failure> {
        let query = validate_list(params)?;
        Ok(self.compiler.list(&query).await?)
    }

    /// Single resource by id.
    ///
    /// # Errors
    ///
    /// 400 for a blank id; 404 if absent.
    pub async fn get(&self, raw_id: &str) -> Result<Resource, ApiError> {
        let ctx = OperationContext::new(OperationKind::Get).with_resource(raw_id);
        self.run_get(raw_id).await.map_err(|f| self.fail(f, &ctx))
    }

    async fn run_get(&self, raw_id: &str) -> Result<Resource, Failure> {
        let id = validate_resource_id(raw_id)?;
        self.store
            .find_resource(id.as_str())
            .await?
            .ok_or(Failure::NotFound)
    }

    /// Distinct non-empty categories, sorted.
    ///
    /// # Errors
    ///
    /// 500 on store faults.
    pub async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let ctx = OperationContext::new(OperationKind::Categories);
        match self.store.all_categories().await {
            Ok(raw) => Ok(aggregate_categories(raw)),
            Err(err) => Err(self.fail(err.into(), &ctx)),
        }
    }

    /// Normalised, de-duplicated tags across all resources, sorted.
    ///
    /// # Errors
    ///
    /// 500 on store faults.
    pub async fn tags(&self) -> Result<Vec<String>, ApiError> {
        let ctx = OperationContext::new(OperationKind::Tags);
        match self.store.all_tags().await {
            Ok(raw) => Ok(aggregate_tags(raw)),
            Err(err) => Err(self.fail(err.into(), &ctx)),
        }
    }

    /// Resources for the requested ids, in first-occurrence request order.
    /// Unknown ids are omitted.
    ///
    /// # Errors
    ///
    /// 400 for an invalid body; 500 on store faults.
    pub async fn batch_get(&self, body: &[u8]) -> Result<Vec<Resource>, ApiError> {
        let ctx = OperationContext::new(OperationKind::BatchGet);
        self
            .run_batch_get(body)
            .await
            .map_err(|f| self.fail(f, &ctx))
    }

    async fn run_batch_get(&self, body: &[u8]) -> Result<Vec<Resource>, Failure> {
        let command = validate_batch_get(body)?;
        let found = self.store.find_resources(&command.ids).await?;
        let mut by_id: HashMap<String, Resource> =
            found.into_iter().map(|r| (r.id.clone(), r)).collect();
        let ordered: Vec<Resource> = command
            .ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();
        debug!(
            requested = command.ids.len(),
            found = ordered.len(),
            "batch get"
        );
        Ok(ordered)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Creates a resource owned by the caller.
    ///
    /// # Errors
    ///
    /// 401, 400, 409 on a uniqueness conflict, 503 when the resource cap is reached.
    pub async fn create(&self, credential: Credential, body: &[u8]) -> Result<Resource, ApiError> {
        let (principal, ctx) =
            self.authenticate(credential, OperationContext::new(OperationKind::Create))?;
        self.run_create(&principal, body)
            .await
            .map_err(|f| self.fail(f, &ctx))
    }

    async fn run_create(&self, principal: &Principal, body: &[u8]) -> Result<Resource, Failure> {
        let draft = validate_create(body)?;

        let gate = AdmissionGate::new(CapacityScope::Resources, self.config.max_resources);
        if let Admission::Rejected(scope) = gate.check(|| self.store.count_resources()).await? {
            return Err(Failure::CapacityExceeded(scope));
        }

        let created = self.store.create_resource(&principal.id, draft).await?;
        info!(resource_id = %created.id, owner_id = %principal.id, "resource created");
        Ok(created)
    }

    /// Applies a partial update. Only the owner may update.
    ///
    /// # Errors
    ///
    /// 401, 400, 404 if the resource is absent, 403 for a non-owner.
    pub async fn update(
        &self,
        credential: Credential,
        raw_id: &str,
        body: &[u8],
    ) -> Result<Resource, ApiError> {
        let ctx = OperationContext::new(OperationKind::Update).with_resource(raw_id);
        let (principal, ctx) = self.authenticate(credential, ctx)?;
        self.run_update(&principal, raw_id, body)
            .await
            .map_err(|f| self.fail(f, &ctx))
    }

    async fn run_update(
        &self,
        principal: &Principal,
        raw_id: &str,
        body: &[u8],
    ) -> Result<Resource, Failure> {
        let id = validate_resource_id(raw_id)?;
        let patch = validate_update(body)?;
        self.require_owner(id.as_str(), principal).await?;

        let updated = self.store.update_resource(id.as_str(), &patch).await?;
        info!(resource_id = %updated.id, "resource updated");
        Ok(updated)
    }

    /// Deletes a resource. Only the owner may delete.
    ///
    /// # Errors
    ///
    /// 401, 404 if the resource is absent, 403 for a non-owner.
    pub async fn delete(&self, credential: Credential, raw_id: &str) -> Result<(), ApiError> {
        let ctx = OperationContext::new(OperationKind::Delete).with_resource(raw_id);
        let (principal, ctx) = self.authenticate(credential, ctx)?;
        self.run_delete(&principal, raw_id)
            .await
            .map_err(|f| self.fail(f, &ctx))
    }

    async fn run_delete(&self, principal: &Principal, raw_id: &str) -> Result<(), Failure> {
        let id = validate_resource_id(raw_id)?;
        self.require_owner(id.as_str(), principal).await?;

        self.store.delete_resource(id.as_str()).await?;
        info!(resource_id = %id.as_str(), "resource deleted");
        Ok(())
    }

    async fn require_owner(&self, id: &str, principal: &Principal) -> Result<Resource, Failure> {
        match authorize(self.store.as_ref(), id, principal).await? {
            Authorization::Authorized(resource) => Ok(resource),
            Authorization::NotFound => Err(Failure::NotFound),
            Authorization::Forbidden => Err(Failure::Forbidden),
        }
    }

    /// Bookmarks a resource for the caller. Saving twice is not an error.
    ///
    /// # Errors
    ///
    /// 401, 400, 404 if the resource is absent, 503 when the saved-relation cap is reached.
    pub async fn save(&self, credential: Credential, raw_id: &str) -> Result<SaveReply, ApiError> {
        let ctx = OperationContext::new(OperationKind::Save)
            .with_resource(raw_id)
            .with_conflict_message("Event already saved");
        let (principal, ctx) = self.authenticate(credential, ctx)?;
        self.run_save(&principal, raw_id)
            .await
            .map_err(|f| self.fail(f, &ctx))
    }

    async fn run_save(&self, principal: &Principal, raw_id: &str) -> Result<SaveReply, Failure> {
        let id = validate_resource_id(raw_id)?;
        let mutator = RelationMutator::new(self.store.as_ref(), self.config.max_saved_relations);
        match mutator.save(&principal.id, id.as_str()).await? {
            SaveOutcome::Saved(relation) => {
                info!(resource_id = %id.as_str(), user_id = %principal.id, "resource saved");
                Ok(SaveReply::Created(relation))
            }
            SaveOutcome::AlreadySaved => Ok(SaveReply::AlreadySaved),
            SaveOutcome::NotFound => Err(Failure::NotFound),
            SaveOutcome::CapacityExceeded(scope) => Err(Failure::CapacityExceeded(scope)),
        }
    }

    /// Removes the caller's bookmark. Succeeds whether or not one existed.
    ///
    /// # Errors
    ///
    /// 401, 400 for a blank id, 500 on store faults.
    pub async fn unsave(
        &self,
        credential: Credential,
        raw_id: &str,
    ) -> Result<UnsaveOutcome, ApiError> {
        let ctx = OperationContext::new(OperationKind::Unsave).with_resource(raw_id);
        let (principal, ctx) = self.authenticate(credential, ctx)?;
        self.run_unsave(&principal, raw_id)
            .await
            .map_err(|f| self.fail(f, &ctx))
    }

    async fn run_unsave(
        &self,
        principal: &Principal,
        raw_id: &str,
    ) -> Result<UnsaveOutcome, Failure> {
        let id = validate_resource_id(raw_id)?;
        let mutator = RelationMutator::new(self.store.as_ref(), self.config.max_saved_relations);
        Ok(mutator.unsave(&principal.id, id.as_str()).await?)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use eventboard_core::{QueryFilter, ResourceDraft, ResourcePatch, SortSpec};
    use serde_json::json;

    use super::*;
    use crate::service::classify::{ErrorKind, GENERIC_FAULT_MESSAGE};
    use crate::service::config::Environment;
    use crate::storage::{MemoryDataStore, PageRead, StoreError};

    fn principal(id: &str) -> Principal {
        Principal {
            id: id.to_string(),
            display_name: id.to_string(),
        }
    }

    fn create_body(title: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "title": title,
            "description": "An evening of live acoustic sets",
            "scheduledDate": "2026-07-04",
            "scheduledTime": "19:30",
            "locationDescription": "Riverside bandstand",
            "organizerName": "Parks Trust",
            "category": "Music",
            "tags": ["Live", "outdoor"]
        }))
        .unwrap()
    }

    fn service_with(store: Arc<MemoryDataStore>, config: ServiceConfig) -> ResourceService {
        ResourceService::new(store, config)
    }

    fn service() -> (Arc<MemoryDataStore>, ResourceService) {
        let store = Arc::new(MemoryDataStore::new());
        let service = service_with(Arc::clone(&store), ServiceConfig::default());
        (store, service)
    }

    #[tokio::test]
    async fn create_then_get_round_trips_through_the_store() {
        let (_, service) = service();
        let created = service
            .create(Ok(principal("alice")), &create_body("Summer Concert"))
            .await
            .unwrap();
        assert_eq!(created.owner_id, "alice");
        let fetched = service.get(&created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn short_title_is_rejected_without_persisting() {
        let (store, service) = service();
        let err = service
            .create(Ok(principal("alice")), &create_body("Hi"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.errors.unwrap().get("title").is_some());
        assert_eq!(store.resources_len(), 0);
    }

    #[tokio::test]
    async fn missing_credential_is_unauthorized() {
        let (store, service) = service();
        let err = service
            .create(
                Err(AuthError::MissingCredential),
                &create_body("Summer Concert"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(store.resources_len(), 0);
    }

    #[tokio::test]
    async fn create_at_resource_cap_is_unavailable() {
        let store = Arc::new(MemoryDataStore::new());
        let service = service_with(
            Arc::clone(&store),
            ServiceConfig {
                max_resources: 1,
                ..ServiceConfig::default()
            },
        );
        service
            .create(Ok(principal("alice")), &create_body("First Event"))
            .await
            .unwrap();
        let err = service
            .create(Ok(principal("alice")), &create_body("Second Event"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(store.resources_len(), 1);
    }

    #[tokio::test]
    async fn non_owner_gets_forbidden_and_missing_gets_not_found() {
        let (_, service) = service();
        let created = service
            .create(Ok(principal("alice")), &create_body("Summer Concert"))
            .await
            .unwrap();
        let patch = br#"{"title":"Hijacked"}"#;

        let err = service
            .update(Ok(principal("mallory")), &created.id, patch)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err = service
            .update(Ok(principal("mallory")), "does-not-exist", patch)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = service
            .delete(Ok(principal("mallory")), &created.id)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err = service
            .delete(Ok(principal("alice")), "does-not-exist")
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn owner_can_update_and_delete() {
        let (store, service) = service();
        let created = service
            .create(Ok(principal("alice")), &create_body("Summer Concert"))
            .await
            .unwrap();

        let updated = service
            .update(
                Ok(principal("alice")),
                &created.id,
                br#"{"title":"Winter Concert"}"#,
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Winter Concert");
        assert_eq!(updated.category, "Music");

        service
            .delete(Ok(principal("alice")), &created.id)
            .await
            .unwrap();
        assert_eq!(store.resources_len(), 0);
    }

    #[tokio::test]
    async fn save_is_idempotent_and_unsave_always_succeeds() {
        let (store, service) = service();
        let created = service
            .create(Ok(principal("alice")), &create_body("Summer Concert"))
            .await
            .unwrap();

        let first = service
            .save(Ok(principal("bob")), &created.id)
            .await
            .unwrap();
        assert!(matches!(first, SaveReply::Created(_)));
        let second = service
            .save(Ok(principal("bob")), &created.id)
            .await
            .unwrap();
        assert_eq!(second, SaveReply::AlreadySaved);
        assert_eq!(store.saved_len(), 1);

        let outcome = service
            .unsave(Ok(principal("carol")), &created.id)
            .await
            .unwrap();
        assert_eq!(outcome, UnsaveOutcome::NotSaved);
    }

    #[tokio::test]
    async fn save_at_capacity_writes_nothing() {
        let store = Arc::new(MemoryDataStore::new());
        let service = service_with(
            Arc::clone(&store),
            ServiceConfig {
                max_saved_relations: 1,
                ..ServiceConfig::default()
            },
        );
        let created = service
            .create(Ok(principal("alice")), &create_body("Summer Concert"))
            .await
            .unwrap();
        service
            .save(Ok(principal("bob")), &created.id)
            .await
            .unwrap();

        let err = service
            .save(Ok(principal("carol")), &created.id)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.kind, ErrorKind::CapacityExceeded);
        assert_eq!(store.saved_len(), 1);
    }

    #[tokio::test]
    async fn batch_get_keeps_request_order_and_drops_unknown_ids() {
        let (_, service) = service();
        let a = service
            .create(Ok(principal("alice")), &create_body("Event Alpha"))
            .await
            .unwrap();
        let b = service
            .create(Ok(principal("alice")), &create_body("Event Bravo"))
            .await
            .unwrap();

        let body = serde_json::to_vec(&json!({ "ids": [&b.id, "ghost", &a.id, &b.id] })).unwrap();
        let found = service.batch_get(&body).await.unwrap();
        let titles: Vec<_> = found.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Event Bravo", "Event Alpha"]);
    }

    #[tokio::test]
    async fn invalid_list_parameters_are_rejected() {
        let (_, service) = service();
        let params = RawListParams {
            page: Some("0".to_string()),
            sort_by: Some("password".to_string()),
            ..RawListParams::default()
        };
        let err = service.list(&params).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let errors = err.errors.unwrap();
        assert!(errors.get("page").is_some());
        assert!(errors.get("sortBy").is_some());
    }

    // -----------------------------------------------------------------------
    // Store faults
    // -----------------------------------------------------------------------

    /// Every data call fails as if the backend were unreachable.
    struct FailingStore;

    fn down() -> StoreError {
        StoreError::Backend(anyhow::anyhow!("connection refused"))
    }

    #[async_trait]
    impl DataStore for FailingStore {
        async fn connect(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn disconnect(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn find(
            &self,
            _: &QueryFilter,
            _: &SortSpec,
            _: u64,
            _: u64,
        ) -> Result<Vec<Resource>, StoreError> {
            Err(down())
        }
        async fn count(&self, _: &QueryFilter) -> Result<u64, StoreError> {
            Err(down())
        }
        async fn read_page(
            &self,
            _: &QueryFilter,
            _: &SortSpec,
            _: u64,
            _: u64,
        ) -> Result<PageRead, StoreError> {
            Err(down())
        }
        async fn find_resource(&self, _: &str) -> Result<Option<Resource>, StoreError> {
            Err(down())
        }
        async fn find_resources(&self, _: &[String]) -> Result<Vec<Resource>, StoreError> {
            Err(down())
        }
        async fn create_resource(&self, _: &str, _: ResourceDraft) -> Result<Resource, StoreError> {
            Err(down())
        }
        async fn update_resource(
            &self,
            _: &str,
            _: &ResourcePatch,
        ) -> Result<Resource, StoreError> {
            Err(down())
        }
        async fn delete_resource(&self, _: &str) -> Result<(), StoreError> {
            Err(down())
        }
        async fn count_resources(&self) -> Result<u64, StoreError> {
            Err(down())
        }
        async fn find_saved(&self, _: &str, _: &str) -> Result<Option<SavedRelation>, StoreError> {
            Err(down())
        }
        async fn create_saved(&self, _: &str, _: &str) -> Result<SavedRelation, StoreError> {
            Err(down())
        }
        async fn delete_saved(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(down())
        }
        async fn count_saved(&self) -> Result<u64, StoreError> {
            Err(down())
        }
        async fn all_categories(&self) -> Result<Vec<String>, StoreError> {
            Err(down())
        }
        async fn all_tags(&self) -> Result<Vec<String>, StoreError> {
            Err(down())
        }
    }

    #[tokio::test]
    async fn store_faults_are_hidden_in_production() {
        let service = ResourceService::new(Arc::new(FailingStore), ServiceConfig::default());

        let err = service.list(&RawListParams::default()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, GENERIC_FAULT_MESSAGE);

        let err = service.tags().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);

        let err = service.save(Ok(principal("bob")), "r1").await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn store_faults_carry_detail_outside_production() {
        let config = ServiceConfig {
            environment: Environment::Development,
            ..ServiceConfig::default()
        };
        let service = ResourceService::new(Arc::new(FailingStore), config);
        let err = service.get("r1").await.unwrap_err();
        assert!(err.message.contains("connection refused"));
        assert!(err.hint.is_some());
    }

    #[tokio::test]
    async fn validation_runs_before_the_store_is_touched() {
        let service = ResourceService::new(Arc::new(FailingStore), ServiceConfig::default());
        let err = service
            .create(Ok(principal("alice")), b"not json")
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
