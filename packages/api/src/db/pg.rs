//! PostgreSQL implementation of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use store::{
    AuthProvider, NewNote, NewUser, Note, NoteStore, OAuthState, OAuthStateStore, OtpChallenge,
    OtpMode, OtpStore, StoreError, User, UserStore,
};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, date_of_birth, image, provider, created_at";
const NOTE_COLUMNS: &str = "id, owner_email, title, content, created_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: Option<String>,
    email: String,
    date_of_birth: Option<NaiveDate>,
    image: Option<String>,
    provider: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let provider = AuthProvider::parse(&row.provider).ok_or_else(|| {
            StoreError::Backend(format!("unknown provider {:?} for user {}", row.provider, row.id).into())
        })?;
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            date_of_birth: row.date_of_birth,
            image: row.image,
            provider,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct NoteRow {
    id: Uuid,
    owner_email: String,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            owner: row.owner_email,
            title: row.title,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OtpRow {
    email: String,
    mode: String,
    code_hash: String,
    attempts: i32,
    expires_at: DateTime<Utc>,
}

impl TryFrom<OtpRow> for OtpChallenge {
    type Error = StoreError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let mode = OtpMode::parse(&row.mode)
            .ok_or_else(|| StoreError::Backend(format!("unknown OTP mode {:?}", row.mode).into()))?;
        Ok(OtpChallenge {
            email: row.email,
            mode,
            code_hash: row.code_hash,
            attempts: row.attempts.max(0) as u32,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OAuthStateRow {
    state: String,
    provider: String,
    pkce_verifier: String,
    expires_at: DateTime<Utc>,
}

impl From<OAuthStateRow> for OAuthState {
    fn from(row: OAuthStateRow) -> Self {
        OAuthState {
            state: row.state,
            provider: row.provider,
            pkce_verifier: row.pkce_verifier,
            expires_at: row.expires_at,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::backend)?;

        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.date_of_birth)
        .bind(&user.image)
        .bind(user.provider.as_str())
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail(user.email.clone())
            } else {
                StoreError::backend(e)
            }
        })?;

        row.try_into()
    }

    async fn insert_user_if_absent(&self, user: NewUser) -> Result<User, StoreError> {
        let inserted: Option<UserRow> = sqlx::query_as(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (email) DO NOTHING
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.date_of_birth)
        .bind(&user.image)
        .bind(user.provider.as_str())
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        match inserted {
            Some(row) => row.try_into(),
            None => self.find_user_by_email(&user.email).await?.ok_or_else(|| {
                StoreError::Backend(format!("user {} vanished after conflict", user.email).into())
            }),
        }
    }
}

#[async_trait]
impl NoteStore for PgStore {
    async fn find_notes_by_owner(&self, owner: &str) -> Result<Vec<Note>, StoreError> {
        let rows: Vec<NoteRow> = sqlx::query_as(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE owner_email = $1 ORDER BY created_at DESC, seq DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(rows.into_iter().map(Note::from).collect())
    }

    async fn find_note(&self, id: Uuid) -> Result<Option<Note>, StoreError> {
        let row: Option<NoteRow> =
            sqlx::query_as(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::backend)?;

        Ok(row.map(Note::from))
    }

    async fn insert_note(&self, note: NewNote) -> Result<Note, StoreError> {
        let row: NoteRow = sqlx::query_as(&format!(
            "INSERT INTO notes ({NOTE_COLUMNS}) VALUES ($1, $2, $3, $4, $5) RETURNING {NOTE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&note.owner)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.into())
    }

    async fn delete_note(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OtpStore for PgStore {
    async fn put_otp(&self, challenge: OtpChallenge) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM otp_challenges WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        sqlx::query(
            "INSERT INTO otp_challenges (email, mode, code_hash, attempts, expires_at)
             VALUES ($1, $2, $3, 0, $4)
             ON CONFLICT (email, mode) DO UPDATE SET
                code_hash = EXCLUDED.code_hash,
                attempts = 0,
                expires_at = EXCLUDED.expires_at",
        )
        .bind(&challenge.email)
        .bind(challenge.mode.as_str())
        .bind(&challenge.code_hash)
        .bind(challenge.expires_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn find_otp(
        &self,
        email: &str,
        mode: OtpMode,
    ) -> Result<Option<OtpChallenge>, StoreError> {
        let row: Option<OtpRow> = sqlx::query_as(
            "SELECT email, mode, code_hash, attempts, expires_at
             FROM otp_challenges WHERE email = $1 AND mode = $2",
        )
        .bind(email)
        .bind(mode.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(OtpChallenge::try_from).transpose()
    }

    async fn record_otp_failure(&self, email: &str, mode: OtpMode) -> Result<u32, StoreError> {
        let attempts: Option<(i32,)> = sqlx::query_as(
            "UPDATE otp_challenges SET attempts = attempts + 1
             WHERE email = $1 AND mode = $2
             RETURNING attempts",
        )
        .bind(email)
        .bind(mode.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(attempts.map(|(n,)| n.max(0) as u32).unwrap_or(0))
    }

    async fn delete_otp(&self, email: &str, mode: OtpMode) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM otp_challenges WHERE email = $1 AND mode = $2")
            .bind(email)
            .bind(mode.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OAuthStateStore for PgStore {
    async fn put_oauth_state(&self, state: OAuthState) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM oauth_states WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        sqlx::query(
            "INSERT INTO oauth_states (state, provider, pkce_verifier, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&state.state)
        .bind(&state.provider)
        .bind(&state.pkce_verifier)
        .bind(state.expires_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn take_oauth_state(
        &self,
        state: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OAuthState>, StoreError> {
        // Validates CSRF state and expiry and consumes the row in one statement.
        let row: Option<OAuthStateRow> = sqlx::query_as(
            "DELETE FROM oauth_states
             WHERE state = $1 AND provider = $2 AND expires_at > $3
             RETURNING state, provider, pkce_verifier, expires_at",
        )
        .bind(state)
        .bind(provider)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(OAuthState::from))
    }
}
