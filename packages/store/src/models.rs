//! # Domain records held by the persistence layer
//!
//! These are the rows every [`crate::repo`] backend reads and writes. They are
//! plain data: validation happens at the HTTP boundary in the `api` crate, and
//! client-facing projections (`UserInfo`, `NoteInfo`) live there too.
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`User`] / [`NewUser`] | An account, keyed by its (lowercased) email address. |
//! | [`Note`] / [`NewNote`] | A note owned by the user whose email is in `owner`. |
//! | [`OtpChallenge`] | A pending one-time-password check for an (email, [`OtpMode`]) pair. |
//! | [`OAuthState`] | CSRF state and PKCE verifier for an in-flight OAuth login. |

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an account was first created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Email address proven with a one-time password.
    Email,
    /// Google federated login.
    Google,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Email => "email",
            AuthProvider::Google => "google",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(AuthProvider::Email),
            "google" => Some(AuthProvider::Google),
            _ => None,
        }
    }
}

/// A stored account.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub image: Option<String>,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a [`User`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub image: Option<String>,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub(crate) fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            date_of_birth: self.date_of_birth,
            image: self.image,
            provider: self.provider,
            created_at: self.created_at,
        }
    }
}

/// A stored note.
#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    pub id: Uuid,
    /// Email of the owning user.
    pub owner: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a [`Note`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewNote {
    pub owner: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NewNote {
    pub(crate) fn into_note(self) -> Note {
        Note {
            id: Uuid::new_v4(),
            owner: self.owner,
            title: self.title,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

/// Which registration rule a one-time password was issued under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpMode {
    Signup,
    Signin,
}

impl OtpMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpMode::Signup => "signup",
            OtpMode::Signin => "signin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "signup" => Some(OtpMode::Signup),
            "signin" => Some(OtpMode::Signin),
            _ => None,
        }
    }
}

/// A pending one-time-password check. Only the SHA-256 of the code is kept.
#[derive(Clone, Debug, PartialEq)]
pub struct OtpChallenge {
    pub email: String,
    pub mode: OtpMode,
    pub code_hash: String,
    pub attempts: u32,
    pub expires_at: DateTime<Utc>,
}

/// An in-flight OAuth authorization request.
#[derive(Clone, Debug, PartialEq)]
pub struct OAuthState {
    pub state: String,
    pub provider: String,
    pub pkce_verifier: String,
    pub expires_at: DateTime<Utc>,
}
