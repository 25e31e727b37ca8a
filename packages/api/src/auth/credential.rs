//! # Credential resolution
//!
//! Requests authenticate in one of two ways: a session token in the
//! `Authorization: Bearer` header, or a federated assertion (email plus the
//! short-lived token from the Google callback) posted to `/api/me`. Both are
//! modelled as a [`Credential`] and go through [`Authenticator::resolve`],
//! which is the only way to obtain a [`VerifiedEmail`]. Data access functions
//! take a `&VerifiedEmail`, so they cannot be called with an unchecked address.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

use super::normalize_email;
use super::token::{TokenKind, TokenService};
use crate::config::AuthSettings;
use crate::error::ApiError;
use crate::state::AppState;

/// A credential presented by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    Bearer(String),
    Federated {
        email: String,
        assertion: Option<String>,
    },
}

impl Credential {
    /// Extract the bearer token from the `Authorization` header, if any.
    pub fn from_headers(headers: &HeaderMap) -> Option<Credential> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let token = value.strip_prefix("Bearer ")?.trim();
        if token.is_empty() {
            return None;
        }
        Some(Credential::Bearer(token.to_string()))
    }
}

/// An email address proven by a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedEmail(String);

impl VerifiedEmail {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VerifiedEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
pub struct Authenticator {
    tokens: TokenService,
    trust_unverified_federated_email: bool,
}

impl Authenticator {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            tokens: TokenService::new(settings),
            trust_unverified_federated_email: settings.trust_unverified_federated_email,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn resolve(&self, credential: &Credential) -> Result<VerifiedEmail, ApiError> {
        match credential {
            Credential::Bearer(token) => self
                .tokens
                .verify_kind(token, TokenKind::Session)
                .map(|claims| VerifiedEmail(claims.email))
                .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string())),
            Credential::Federated { email, assertion } => {
                let email = normalize_email(email);
                match assertion {
                    Some(assertion) => {
                        let claims = self
                            .tokens
                            .verify_kind(assertion, TokenKind::Federated)
                            .ok_or_else(|| {
                                ApiError::Unauthorized("Invalid federated assertion".to_string())
                            })?;
                        if claims.email != email {
                            return Err(ApiError::Unauthorized(
                                "Federated assertion does not match email".to_string(),
                            ));
                        }
                        Ok(VerifiedEmail(email))
                    }
                    None if self.trust_unverified_federated_email => Ok(VerifiedEmail(email)),
                    None => Err(ApiError::Unauthorized(
                        "Federated assertion required".to_string(),
                    )),
                }
            }
        }
    }
}

/// Extractor for handlers that require a session token.
#[derive(Debug)]
pub struct AuthUser(pub VerifiedEmail);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let credential = Credential::from_headers(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        state.auth.resolve(&credential).map(AuthUser)
    }
}
