//! Bearer token verification and principal extractors.
//!
//! Tokens are issued elsewhere; this service only verifies them. A token
//! carries `{ email, role, exp }` signed with HS256.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::{Principal, Role};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AppState;
use crate::error::ApiError;

/// Why a credential was rejected.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing bearer token")]
    Missing,

    #[error("malformed authorization header")]
    Malformed,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Turns a credential into a verified principal.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Principal, IdentityError>;
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    #[serde(default)]
    pub role: String,
    pub exp: usize,
}

/// Verifies HS256 tokens against a shared secret.
pub struct JwtIdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl IdentityVerifier for JwtIdentityVerifier {
    fn verify(&self, token: &str) -> Result<Principal, IdentityError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| IdentityError::Invalid(e.to_string()))?;
        let claims = data.claims;
        if claims.email.trim().is_empty() {
            return Err(IdentityError::Invalid("empty email claim".to_string()));
        }
        Ok(Principal::new(claims.email, Role::from_claim(&claims.role)))
    }
}

/// Extracts the bearer token, if any. A present but malformed header is
/// an error, not an anonymous request.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, IdentityError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| IdentityError::Malformed)?;
    let (scheme, token) = value.split_once(' ').ok_or(IdentityError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(IdentityError::Malformed);
    }
    Ok(Some(token.trim()))
}

fn verify_request(
    parts: &Parts,
    verifier: &dyn IdentityVerifier,
) -> Result<Option<Principal>, IdentityError> {
    bearer_token(parts)?
        .map(|token| verifier.verify(token))
        .transpose()
}

/// A principal that must be present.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

impl AuthPrincipal {
    /// Fails with 403 unless the principal is an admin.
    pub fn require_admin(&self) -> Result<&Principal, ApiError> {
        if self.0.is_admin() {
            Ok(&self.0)
        } else {
            Err(ApiError::Forbidden("admin role required".to_string()))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match verify_request(parts, state.identity.as_ref())? {
            Some(principal) => Ok(AuthPrincipal(principal)),
            None => Err(IdentityError::Missing.into()),
        }
    }
}

/// A principal that may be absent, as in guest checkout.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl FromRequestParts<Arc<AppState>> for MaybePrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybePrincipal(verify_request(
            parts,
            state.identity.as_ref(),
        )?))
    }
}
