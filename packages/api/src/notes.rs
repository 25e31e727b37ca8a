//! Notes, scoped to the owner's verified email.
//!
//! Every operation takes a [`VerifiedEmail`], which can only come out of
//! [`crate::auth::Authenticator::resolve`].

use chrono::Utc;
use store::{NewNote, NoteStore};
use uuid::Uuid;

use crate::auth::VerifiedEmail;
use crate::error::ApiError;
use crate::models::{CreateNoteRequest, NoteInfo};
use crate::state::AppState;

fn not_found() -> ApiError {
    ApiError::NotFound("Note not found".to_string())
}

/// The caller's notes, newest first.
pub async fn list(state: &AppState, owner: &VerifiedEmail) -> Result<Vec<NoteInfo>, ApiError> {
    let notes = state.store.find_notes_by_owner(owner.as_str()).await?;
    Ok(notes.into_iter().map(NoteInfo::from).collect())
}

pub async fn create(
    state: &AppState,
    owner: &VerifiedEmail,
    request: CreateNoteRequest,
) -> Result<NoteInfo, ApiError> {
    let title = request.title.trim();
    let content = request.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::BadRequest("Title and content are required".to_string()));
    }

    let note = state
        .store
        .insert_note(NewNote {
            owner: owner.as_str().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        })
        .await?;

    tracing::debug!(note_id = %note.id, %owner, "note created");
    Ok(note.into())
}

/// Delete one of the caller's notes. Ids that are not UUIDs are simply unknown.
pub async fn delete(state: &AppState, owner: &VerifiedEmail, id: &str) -> Result<(), ApiError> {
    let id = Uuid::parse_str(id).map_err(|_| not_found())?;
    let note = state.store.find_note(id).await?.ok_or_else(not_found)?;

    if note.owner != owner.as_str() {
        tracing::warn!(note_id = %id, %owner, "attempt to delete another user's note");
        return Err(ApiError::Forbidden("Forbidden".to_string()));
    }

    if !state.store.delete_note(id).await? {
        return Err(not_found());
    }
    Ok(())
}
