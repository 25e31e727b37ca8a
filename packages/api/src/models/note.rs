use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store::Note;

/// A note as listed by `GET /api/notes`. `email` is the owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub id: String,
    pub email: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Note> for NoteInfo {
    fn from(note: Note) -> Self {
        NoteInfo {
            id: note.id.to_string(),
            email: note.owner,
            title: note.title,
            content: note.content,
            created_at: note.created_at,
        }
    }
}
