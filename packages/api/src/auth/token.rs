//! # Signed credentials
//!
//! [`TokenService`] issues and verifies HS256 JWTs carrying an email claim.
//! Two kinds share the signing key:
//!
//! - [`TokenKind::Session`] — the bearer credential for every authenticated
//!   request, valid for `auth.session_ttl_days` (7 by default).
//! - [`TokenKind::Federated`] — a short-lived assertion minted after a Google
//!   login; it can only be exchanged for a session token at `POST /api/me`.
//!
//! Tokens are not stored anywhere. Rotating `auth.jwt_secret` invalidates all of them.

use chrono::{Duration, Utc};
use jsonwebtoken::{errors::Error as JwtError, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Federated,
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    session_ttl: Duration,
    federated_ttl: Duration,
}

impl TokenService {
    pub fn new(settings: &AuthSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            validation,
            session_ttl: Duration::days(settings.session_ttl_days),
            federated_ttl: Duration::minutes(settings.federated_ttl_minutes),
        }
    }

    /// Sign a token for `email` that expires after `ttl`.
    pub fn issue(&self, email: &str, kind: TokenKind, ttl: Duration) -> Result<String, JwtError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            email: email.to_string(),
            kind,
            iat: now,
            exp: now + ttl.num_seconds(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn issue_session(&self, email: &str) -> Result<String, JwtError> {
        self.issue(email, TokenKind::Session, self.session_ttl)
    }

    pub fn issue_federated(&self, email: &str) -> Result<String, JwtError> {
        self.issue(email, TokenKind::Federated, self.federated_ttl)
    }

    /// Decode a token. `None` if it is malformed, tampered with, or expired.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Like [`verify`](Self::verify), but only accepts tokens of `kind`.
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Option<Claims> {
        self.verify(token).filter(|claims| claims.kind == kind)
    }
}
