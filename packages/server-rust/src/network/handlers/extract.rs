//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eventboard_core::Principal;
use serde_json::json;

use super::AppState;
use crate::auth::{bearer_token, AuthError};

/// The principal behind a verified `Authorization: Bearer` credential.
///
/// Handlers take `Result<Authenticated, AuthError>` so the rejection is
/// classified with the operation it belongs to.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl Authenticated {
    /// Unwraps a possibly-rejected extraction into a service credential.
    #[must_use]
    pub fn credential(extracted: Result<Self, AuthError>) -> Result<Principal, AuthError> {
        extracted.map(|Self(principal)| principal)
    }
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredential)?
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;
        let token = bearer_token(header)?;
        let principal = state.identity.verify(token).await?;
        Ok(Self(principal))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": self.to_string() })),
        )
            .into_response()
    }
}
