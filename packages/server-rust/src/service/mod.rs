//! Request-processing pipeline.
//!
//! Each request passes through these stages in order:
//!
//! 1. **Validation** (`validate`): raw query/body -> typed command
//! 2. **Query compilation** (`query`): list command -> filter/sort/page plan
//! 3. **Authorization** (`guard`): existence, then ownership
//! 4. **Relations** (`relation`): idempotent save/unsave under `admission` caps
//! 5. **Classification** (`classify`): any failure -> one `ApiError`
//!
//! `orchestrator::ResourceService` sequences the stages per operation.

pub mod admission;
pub mod classify;
pub mod config;
pub mod guard;
pub mod operation;
pub mod orchestrator;
pub mod query;
pub mod relation;
pub mod validate;

// Re-export key types for convenient access.
pub use classify::{ApiError, ErrorClassifier, ErrorKind, Failure};
pub use config::{Environment, ServiceConfig};
pub use operation::{OperationContext, OperationKind};
pub use orchestrator::{Credential, ResourceService, SaveReply};
pub use query::{QueryCompiler, QueryPlan};
pub use relation::{RelationMutator, SaveOutcome, UnsaveOutcome};
pub use validate::RawListParams;
