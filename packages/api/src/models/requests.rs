//! # Request and response bodies of the HTTP API
//!
//! Request fields default to empty so that a missing field and an empty one
//! are rejected the same way (400) by the handlers, rather than by the JSON
//! extractor. Every response carries a `success` flag.

use serde::{Deserialize, Serialize};
use store::OtpMode;

use super::{NoteInfo, UserInfo};

/// `POST /api/send-otp`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub mode: Option<OtpMode>,
}

/// `POST /api/signup`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    /// Date of birth, `YYYY-MM-DD`.
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub email: String,
    /// Required only when the server enforces OTP verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// `POST /api/signin`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// `POST /api/me` body for the federated flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MeRequest {
    #[serde(default)]
    pub email: String,
    /// Federated assertion handed out by the Google callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
}

/// `POST /api/notes`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Plain acknowledgement, optionally with a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

/// Returned by signup and signin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

/// Returned by `/api/me`; `token` is present on the federated path only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub success: bool,
    pub user: UserInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotesResponse {
    pub success: bool,
    pub notes: Vec<NoteInfo>,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}
