//! Soft capacity caps checked before a mutation is admitted.
//!
//! The count is a lock-free snapshot. Requests admitted concurrently can
//! together overshoot the cap slightly.

use tracing::warn;

use crate::storage::StoreError;

/// Which table a cap guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityScope {
    Resources,
    SavedRelations,
}

impl CapacityScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resources => "resources",
            Self::SavedRelations => "saved_relations",
        }
    }

    /// Client-facing rejection message.
    #[must_use]
    pub fn rejection_message(self) -> &'static str {
        match self {
            Self::Resources => "Event capacity reached, please try again later",
            Self::SavedRelations => "Saved events capacity reached, please try again later",
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected(CapacityScope),
}

/// Compares a current row count against a cap.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionGate {
    scope: CapacityScope,
    cap: u64,
}

impl AdmissionGate {
    #[must_use]
    pub fn new(scope: CapacityScope, cap: u64) -> Self {
        Self { scope, cap }
    }

    /// Decides admission from an already-taken count.
    #[must_use]
    pub fn decide(&self, current: u64) -> Admission {
        if current >= self.cap {
            warn!(
                scope = self.scope.as_str(),
                current,
                cap = self.cap,
                "admission rejected"
            );
            metrics::counter!("eventboard_admission_rejected_total", "scope" => self.scope.as_str())
                .increment(1);
            Admission::Rejected(self.scope)
        } else {
            Admission::Admitted
        }
    }

    /// Takes the count via `count` and decides.
    ///
    /// # Errors
    ///
    /// Propagates the count's data store failure unchanged.
    pub async fn check<F, Fut>(&self, count: F) -> Result<Admission, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<u64, StoreError>>,
    {
        Ok(self.decide(count().await?))
    }
}
