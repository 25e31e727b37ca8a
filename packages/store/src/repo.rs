//! # Store traits — the persistence seam
//!
//! Every server-side read and write goes through these traits, so the account
//! and notes logic in the `api` crate runs unchanged against PostgreSQL in
//! production and [`crate::MemoryStore`] in tests and local runs.
//!
//! | Trait | Collection | Operations |
//! |-------|-----------|------------|
//! | [`UserStore`] | users | find by email, insert (unique email), insert-if-absent |
//! | [`NoteStore`] | notes | list by owner (newest first), find by id, insert, delete |
//! | [`OtpStore`] | one-time passwords | put (replace), find, count a failure, delete |
//! | [`OAuthStateStore`] | OAuth states | put, take (single use, unexpired only) |
//!
//! [`Store`] bundles all four so handlers can hold one `Arc<dyn Store>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewNote, NewUser, Note, OAuthState, OtpChallenge, OtpMode, User};

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with email {0} already exists")]
    DuplicateEmail(String),

    #[error("storage backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user. Fails with [`StoreError::DuplicateEmail`] if the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Insert the user unless one with the same email exists; returns the stored record.
    async fn insert_user_if_absent(&self, user: NewUser) -> Result<User, StoreError>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// All notes owned by `owner`, newest first.
    async fn find_notes_by_owner(&self, owner: &str) -> Result<Vec<Note>, StoreError>;

    async fn find_note(&self, id: Uuid) -> Result<Option<Note>, StoreError>;

    async fn insert_note(&self, note: NewNote) -> Result<Note, StoreError>;

    /// Returns `false` if no note had that id.
    async fn delete_note(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store a challenge, replacing any previous one for the same email and mode.
    async fn put_otp(&self, challenge: OtpChallenge) -> Result<(), StoreError>;

    async fn find_otp(&self, email: &str, mode: OtpMode)
        -> Result<Option<OtpChallenge>, StoreError>;

    /// Count a failed attempt and return the new total (0 if no challenge exists).
    async fn record_otp_failure(&self, email: &str, mode: OtpMode) -> Result<u32, StoreError>;

    async fn delete_otp(&self, email: &str, mode: OtpMode) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait OAuthStateStore: Send + Sync {
    async fn put_oauth_state(&self, state: OAuthState) -> Result<(), StoreError>;

    /// Remove and return the state if it exists for `provider` and has not expired at `now`.
    async fn take_oauth_state(
        &self,
        state: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OAuthState>, StoreError>;
}

/// Everything the server needs from persistence.
pub trait Store: UserStore + NoteStore + OtpStore + OAuthStateStore {}

impl<T> Store for T where T: UserStore + NoteStore + OtpStore + OAuthStateStore {}
