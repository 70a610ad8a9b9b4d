//! Eventboard core: resource model, query vocabulary, and validation issues.

pub mod query;
pub mod schema;
pub mod types;

pub use query::{
    ListQuery, Page, PredicateNode, QueryFilter, SortDirection, SortField, SortSpec, TextField,
};
pub use schema::{FieldErrorMap, IssueCollector, ValidationFailure, ValidationIssue, GENERAL_FIELD};
pub use types::{Principal, Resource, ResourceDraft, ResourcePatch, SavedRelation};
