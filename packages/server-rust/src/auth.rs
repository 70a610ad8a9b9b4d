//! Bearer-credential verification.
//!
//! [`JwtIdentityProvider`] is the reference [`IdentityProvider`]: HS256 tokens
//! signed with a shared secret, carrying the principal id in `sub` and the
//! display name in `name`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use eventboard_core::Principal;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::traits::IdentityProvider;

/// Why a credential was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredential,
    #[error("authorization header must use the Bearer scheme")]
    MalformedHeader,
    #[error("invalid or expired credential")]
    InvalidCredential(#[source] jsonwebtoken::errors::Error),
    #[error("failed to issue credential")]
    Issue(#[source] jsonwebtoken::errors::Error),
}

/// Claims carried in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id.
    pub sub: String,
    /// Display name.
    pub name: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Verifies (and, for tooling, issues) HS256 access tokens.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    /// Builds a provider around a shared HMAC secret.
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mints a token for `principal` that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Issue`] if signing fails.
    pub fn issue(&self, principal: &Principal, ttl: Duration) -> Result<String, AuthError> {
        let exp = SystemTime::now()
            .checked_add(ttl)
            .unwrap_or(SystemTime::now())
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let claims = Claims {
            sub: principal.id.clone(),
            name: principal.display_name.clone(),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Issue)
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, credential: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(credential, &self.decoding, &self.validation)
            .map_err(AuthError::InvalidCredential)?;
        Ok(Principal {
            id: data.claims.sub,
            display_name: data.claims.name,
        })
    }
}

/// Extracts the token from an `Authorization` header value.
///
/// # Errors
///
/// Returns [`AuthError::MalformedHeader`] when the scheme is not `Bearer` or
/// the token is empty.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}
