//! Failure classification: every failed request becomes exactly one [`ApiError`].
//!
//! Rules are applied in priority order:
//!
//! 1. schema validation failure -> 400 with a field-keyed error map
//! 2. unique constraint -> 409 with the operation's domain message
//! 3. record not found on mutate -> 404
//! 4. foreign key violation -> 400 naming the reference field
//! 5. explicit 4xx status -> passed through verbatim
//! 6. anything else -> 500

use axum::response::{IntoResponse, Response};
use axum::Json;
use eventboard_core::{FieldErrorMap, ValidationFailure, GENERAL_FIELD};
use http::StatusCode;
use serde::Serialize;
use tracing::{error, warn};

use super::admission::CapacityScope;
use super::config::Environment;
use super::operation::OperationContext;
use crate::auth::AuthError;
use crate::storage::StoreError;

/// Client-facing message for unhandled faults in production.
pub const GENERIC_FAULT_MESSAGE: &str = "An unexpected error occurred";

const STACK_HINT: &str = "Stack trace available in server logs";
const INVALID_REFERENCE_MESSAGE: &str = "Referenced record does not exist";

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

/// Everything a request can fail with before classification.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Authentication(#[from] AuthError),
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("capacity exceeded for {}", .0.as_str())]
    CapacityExceeded(CapacityScope),
    /// Carries an explicit HTTP status, typically from the transport layer.
    #[error("{message}")]
    Status { status: StatusCode, message: String },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Failure {
    #[must_use]
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Closed error taxonomy exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    CapacityExceeded,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::Authentication => "AuthenticationError",
            Self::Authorization => "AuthorizationError",
            Self::NotFound => "NotFoundError",
            Self::Conflict => "ConflictError",
            Self::CapacityExceeded => "CapacityExceededError",
            Self::Unknown => "UnknownError",
        }
    }

    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::CapacityExceeded => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure was an expected outcome handled locally.
    /// Only `Unknown` signals a fault operators should look at.
    #[must_use]
    pub fn is_recovered(self) -> bool {
        self != Self::Unknown
    }

    fn for_client_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Authentication,
            StatusCode::FORBIDDEN => Self::Authorization,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::CONFLICT => Self::Conflict,
            _ => Self::Validation,
        }
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// A classified failure, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub message: String,
    pub errors: Option<FieldErrorMap>,
    pub hint: Option<String>,
}

impl ApiError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: kind.status(),
            kind,
            message: message.into(),
            errors: None,
            hint: None,
        }
    }

    fn with_errors(mut self, errors: FieldErrorMap) -> Self {
        self.errors = Some(errors);
        self
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrorMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: &self.message,
            errors: self.errors.as_ref(),
            hint: self.hint.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// ErrorClassifier
// ---------------------------------------------------------------------------

/// Maps failures onto the taxonomy, logging and counting each one.
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier {
    environment: Environment,
}

impl ErrorClassifier {
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    /// Classifies `failure` in the context of the operation that raised it.
    #[must_use]
    pub fn classify(&self, failure: Failure, ctx: &OperationContext) -> ApiError {
        let raw = failure_detail(&failure);
        let api_error = self.map(failure, ctx);
        record(&api_error, ctx, &raw);
        api_error
    }

    fn map(&self, failure: Failure, ctx: &OperationContext) -> ApiError {
        match failure {
            Failure::Validation(validation) => {
                ApiError::new(ErrorKind::Validation, "Validation failed")
                    .with_errors(validation.field_errors())
            }
            Failure::Store(StoreError::UniqueViolation { .. }) => {
                ApiError::new(ErrorKind::Conflict, ctx.conflict_message)
            }
            Failure::Store(StoreError::RecordNotFound { cause }) => ApiError::new(
                ErrorKind::NotFound,
                cause.unwrap_or_else(|| ctx.not_found_message.to_string()),
            ),
            Failure::Store(StoreError::ForeignKeyViolation { field }) => {
                let mut errors = FieldErrorMap::default();
                let message = match field {
                    Some(field) => {
                        errors.push(&field, INVALID_REFERENCE_MESSAGE);
                        format!("Invalid reference: {field}")
                    }
                    None => {
                        errors.push(GENERAL_FIELD, INVALID_REFERENCE_MESSAGE);
                        "Invalid reference to a related record".to_string()
                    }
                };
                ApiError::new(ErrorKind::Validation, message).with_errors(errors)
            }
            Failure::Authentication(auth) => {
                ApiError::new(ErrorKind::Authentication, authentication_message(&auth))
            }
            Failure::Forbidden => ApiError::new(
                ErrorKind::Authorization,
                "You do not have permission to modify this event",
            ),
            Failure::NotFound => ApiError::new(ErrorKind::NotFound, ctx.not_found_message),
            Failure::CapacityExceeded(scope) => {
                ApiError::new(ErrorKind::CapacityExceeded, scope.rejection_message())
            }
            Failure::Status { status, message } if status.is_client_error() => ApiError {
                status,
                kind: ErrorKind::for_client_status(status),
                message,
                errors: None,
                hint: None,
            },
            other @ (Failure::Status { .. }
            | Failure::Store(StoreError::Backend(_))
            | Failure::Unexpected(_)) => self.unknown(&other),
        }
    }

    fn unknown(&self, failure: &Failure) -> ApiError {
        if self.environment.is_production() {
            ApiError::new(ErrorKind::Unknown, GENERIC_FAULT_MESSAGE)
        } else {
            let mut api_error = ApiError::new(ErrorKind::Unknown, failure_detail(failure));
            api_error.hint = Some(STACK_HINT.to_string());
            api_error
        }
    }
}

fn authentication_message(err: &AuthError) -> &'static str {
    match err {
        AuthError::MissingCredential => "Authentication required",
        AuthError::MalformedHeader => "Authorization header must use the Bearer scheme",
        AuthError::InvalidCredential(_) | AuthError::Issue(_) => "Invalid or expired token",
    }
}

/// Full error chain, as logged.
fn failure_detail(failure: &Failure) -> String {
    match failure {
        Failure::Unexpected(err) => format!("{err:#}"),
        Failure::Store(StoreError::Backend(err)) => format!("storage backend error: {err:#}"),
        other => other.to_string(),
    }
}

/// Metric labels for a classified failure. Pass-through statuses share a kind
/// with other statuses, so the raw code travels alongside it.
fn failure_labels(api_error: &ApiError) -> (&'static str, String) {
    (api_error.kind.as_str(), api_error.status.as_u16().to_string())
}

fn record(api_error: &ApiError, ctx: &OperationContext, raw: &str) {
    let operation = ctx.kind.as_str();
    let resource_id = ctx.resource_id.as_deref().unwrap_or("-");
    let user_id = ctx.user_id.as_deref().unwrap_or("-");
    let (kind, status) = failure_labels(api_error);

    if api_error.kind.is_recovered() {
        warn!(
            operation,
            resource_id,
            user_id,
            kind,
            status = %status,
            error = raw,
            "request failed"
        );
    } else {
        error!(
            operation,
            resource_id,
            user_id,
            kind,
            status = %status,
            error = raw,
            "unhandled fault"
        );
        metrics::counter!("eventboard_unhandled_faults_total", "operation" => operation)
            .increment(1);
    }
    metrics::counter!(
        "eventboard_request_failures_total",
        "kind" => kind,
        "status" => status
    )
    .increment(1);
}
