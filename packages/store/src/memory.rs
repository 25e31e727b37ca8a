use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{NewNote, NewUser, Note, OAuthState, OtpChallenge, OtpMode, User};
use crate::repo::{NoteStore, OAuthStateStore, OtpStore, StoreError, UserStore};

/// In-memory store for tests and database-less local runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    users: Arc<Mutex<HashMap<String, User>>>,
    // Insertion order; listing relies on it to break timestamp ties.
    notes: Arc<Mutex<Vec<Note>>>,
    otps: Arc<Mutex<HashMap<(String, OtpMode), OtpChallenge>>>,
    oauth_states: Arc<Mutex<HashMap<String, OAuthState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(lock(&self.users).get(email).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = lock(&self.users);
        if users.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        let user = user.into_user();
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn insert_user_if_absent(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = lock(&self.users);
        let stored = users
            .entry(user.email.clone())
            .or_insert_with(|| user.into_user());
        Ok(stored.clone())
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn find_notes_by_owner(&self, owner: &str) -> Result<Vec<Note>, StoreError> {
        let mut notes: Vec<Note> = lock(&self.notes)
            .iter()
            .rev()
            .filter(|n| n.owner == owner)
            .cloned()
            .collect();
        // Stable sort: later insertions stay ahead on equal timestamps.
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }

    async fn find_note(&self, id: Uuid) -> Result<Option<Note>, StoreError> {
        Ok(lock(&self.notes).iter().find(|n| n.id == id).cloned())
    }

    async fn insert_note(&self, note: NewNote) -> Result<Note, StoreError> {
        let note = note.into_note();
        lock(&self.notes).push(note.clone());
        Ok(note)
    }

    async fn delete_note(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut notes = lock(&self.notes);
        let before = notes.len();
        notes.retain(|n| n.id != id);
        Ok(notes.len() != before)
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn put_otp(&self, challenge: OtpChallenge) -> Result<(), StoreError> {
        let mut otps = lock(&self.otps);
        let now = Utc::now();
        otps.retain(|_, c| c.expires_at > now);
        otps.insert((challenge.email.clone(), challenge.mode), challenge);
        Ok(())
    }

    async fn find_otp(
        &self,
        email: &str,
        mode: OtpMode,
    ) -> Result<Option<OtpChallenge>, StoreError> {
        Ok(lock(&self.otps).get(&(email.to_string(), mode)).cloned())
    }

    async fn record_otp_failure(&self, email: &str, mode: OtpMode) -> Result<u32, StoreError> {
        let mut otps = lock(&self.otps);
        Ok(match otps.get_mut(&(email.to_string(), mode)) {
            Some(challenge) => {
                challenge.attempts += 1;
                challenge.attempts
            }
            None => 0,
        })
    }

    async fn delete_otp(&self, email: &str, mode: OtpMode) -> Result<bool, StoreError> {
        Ok(lock(&self.otps).remove(&(email.to_string(), mode)).is_some())
    }
}

#[async_trait]
impl OAuthStateStore for MemoryStore {
    async fn put_oauth_state(&self, state: OAuthState) -> Result<(), StoreError> {
        let mut states = lock(&self.oauth_states);
        let now = Utc::now();
        states.retain(|_, s| s.expires_at > now);
        states.insert(state.state.clone(), state);
        Ok(())
    }

    async fn take_oauth_state(
        &self,
        state: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OAuthState>, StoreError> {
        let mut states = lock(&self.oauth_states);
        let live = states
            .get(state)
            .is_some_and(|s| s.provider == provider && s.expires_at > now);
        if live {
            Ok(states.remove(state))
        } else {
            Ok(None)
        }
    }
}
