//! # Error taxonomy of the HTTP API
//!
//! Each variant maps to one status code and is rendered as
//! `{"success": false, "message": ...}`. Downstream failures (store, mail,
//! identity provider) become [`ApiError::Server`]; their cause is logged here
//! and the client only sees the generic message.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use store::StoreError;
use thiserror::Error;

use crate::mail::MailError;
use crate::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, invalid or expired credential.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Downstream failure. The first field is shown to the client, the second is logged.
    #[error("{0}")]
    Server(String, String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Server(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".to_string())
    }

    pub fn server(message: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        ApiError::Server(message.into(), cause.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(_) => ApiError::Conflict("Email already exists".to_string()),
            other => ApiError::server("Server error", other),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::server("Failed to send OTP. Please try again later.", err)
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ApiError::server("Failed to issue token", err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Server(_, ref cause) = self {
            tracing::error!(%cause, "request failed");
        }

        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
