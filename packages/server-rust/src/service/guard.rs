//! Ownership gate for mutations on a single resource.

use eventboard_core::{Principal, Resource};

use crate::storage::StoreError;
use crate::traits::DataStore;

/// Terminal state of an authorization attempt.
///
/// Only [`Authorization::Authorized`] permits the mutation that follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// The resource exists and the principal owns it.
    Authorized(Resource),
    /// No resource has the requested id.
    NotFound,
    /// The resource exists but belongs to someone else.
    Forbidden,
}

/// Looks the resource up, then compares its owner with the acting principal.
///
/// Existence is always checked first, so a non-owner probing an unknown id
/// sees `NotFound`.
///
/// # Errors
///
/// Propagates the lookup's data store failure unchanged.
pub async fn authorize(
    store: &dyn DataStore,
    resource_id: &str,
    principal: &Principal,
) -> Result<Authorization, StoreError> {
    let Some(resource) = store.find_resource(resource_id).await? else {
        return Ok(Authorization::NotFound);
    };
    if resource.owner_id == principal.id {
        Ok(Authorization::Authorized(resource))
    } else {
        Ok(Authorization::Forbidden)
    }
}
