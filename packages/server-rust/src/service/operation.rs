//! Operation kinds and the per-request context carried into error classification.

use eventboard_core::Principal;

/// The fixed set of operations the pipeline serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    List,
    Get,
    Create,
    Update,
    Delete,
    Save,
    Unsave,
    Categories,
    Tags,
    BatchGet,
}

impl OperationKind {
    /// Stable name used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list_resources",
            Self::Get => "get_resource",
            Self::Create => "create_resource",
            Self::Update => "update_resource",
            Self::Delete => "delete_resource",
            Self::Save => "save_resource",
            Self::Unsave => "unsave_resource",
            Self::Categories => "list_categories",
            Self::Tags => "list_tags",
            Self::BatchGet => "batch_get_resources",
        }
    }
}

/// Context for one request: what is being done, to what, and by whom.
///
/// Carries the domain messages the classifier substitutes for raw
/// persistence errors.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub kind: OperationKind,
    pub resource_id: Option<String>,
    pub user_id: Option<String>,
    /// Message for a uniqueness conflict on this operation.
    pub conflict_message: &'static str,
    /// Message for a missing record on this operation.
    pub not_found_message: &'static str,
}

impl OperationContext {
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            resource_id: None,
            user_id: None,
            conflict_message: "An event with this identifier already exists",
            not_found_message: "Event not found",
        }
    }

    #[must_use]
    pub fn with_resource(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: &Principal) -> Self {
        self.user_id = Some(principal.id.clone());
        self
    }

    #[must_use]
    pub fn with_conflict_message(mut self, message: &'static str) -> Self {
        self.conflict_message = message;
        self
    }
}
