//! Persistence-layer failures surfaced by [`DataStore`](crate::traits::DataStore)
//! implementations.

/// Errors raised by a data store.
///
/// The constraint-shaped variants mirror what relational backends report so
/// the error classifier can translate them without string matching.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("record to mutate was not found{}", suffix(": ", .cause.as_deref()))]
    RecordNotFound { cause: Option<String> },
    #[error("foreign key constraint violated{}", suffix(" on ", .field.as_deref()))]
    ForeignKeyViolation { field: Option<String> },
    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether this is a uniqueness violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// Whether this reports a missing row on update/delete.
    #[must_use]
    pub fn is_record_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}

fn suffix(prefix: &str, detail: Option<&str>) -> String {
    detail.map(|d| format!("{prefix}{d}")).unwrap_or_default()
}
