//! # HTTP routes
//!
//! | Method | Path | Auth | Handler |
//! |--------|------|------|---------|
//! | POST | `/api/send-otp` | none | [`accounts::send_otp`] |
//! | POST | `/api/signup` | none (OTP when enforced) | [`accounts::signup`] |
//! | POST | `/api/signin` | none (OTP when enforced) | [`accounts::signin`] |
//! | GET | `/api/me` | bearer | [`accounts::me`] |
//! | POST | `/api/me` | federated assertion, or bearer with an empty body | [`accounts::me`] |
//! | GET, POST | `/api/notes` | bearer | [`notes::list`], [`notes::create`] |
//! | DELETE | `/api/notes/{id}` | bearer | [`notes::delete`] |
//! | GET | `/api/auth/google` | none | redirect to Google |
//! | GET | `/auth/google/callback` | OAuth state | redirect to `google.success_redirect` |
//!
//! Unknown paths get a JSON 404 and known paths with the wrong method a JSON 405.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{delete, get, post},
    Json, Router,
};
use oauth2::url::form_urlencoded;
use tower_http::trace::TraceLayer;

use crate::accounts;
use crate::auth::{AuthUser, Credential};
use crate::error::ApiError;
use crate::models::{
    CreateNoteRequest, MeRequest, NotesResponse, SendOtpRequest, SigninRequest, SignupRequest,
    SuccessResponse, TokenResponse, UserResponse,
};
use crate::notes;
use crate::state::AppState;

type AppJson<T> = Result<Json<T>, JsonRejection>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/send-otp", post(send_otp))
        .route("/api/signup", post(signup))
        .route("/api/signin", post(signin))
        .route("/api/me", get(get_me).post(post_me))
        .route("/api/notes", get(list_notes).post(create_note))
        .route("/api/notes/{id}", delete(delete_note))
        .route("/api/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tracing::instrument(skip_all)]
async fn send_otp(
    State(state): State<Arc<AppState>>,
    body: AppJson<SendOtpRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(request) = body?;
    accounts::send_otp(&state, request).await?;
    Ok(Json(SuccessResponse::with_message("OTP sent")))
}

#[tracing::instrument(skip_all)]
async fn signup(
    State(state): State<Arc<AppState>>,
    body: AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let Json(request) = body?;
    let response = accounts::signup(&state, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip_all)]
async fn signin(
    State(state): State<Arc<AppState>>,
    body: AppJson<SigninRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body?;
    Ok(Json(accounts::signin(&state, request).await?))
}

#[tracing::instrument(skip_all)]
async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthUser(email): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = accounts::me(&state, &email).await?;
    Ok(Json(UserResponse {
        success: true,
        user,
        token: None,
    }))
}

/// Exchange a federated assertion for a session token. Without an email in
/// the body this is the same as `GET /api/me`.
#[tracing::instrument(skip_all)]
async fn post_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UserResponse>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        MeRequest::default()
    } else {
        serde_json::from_slice::<MeRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };

    if request.email.trim().is_empty() {
        let credential = Credential::from_headers(&headers).ok_or_else(ApiError::unauthorized)?;
        let email = state.auth.resolve(&credential)?;
        let user = accounts::me(&state, &email).await?;
        return Ok(Json(UserResponse {
            success: true,
            user,
            token: None,
        }));
    }

    let email = state.auth.resolve(&Credential::Federated {
        email: request.email,
        assertion: request.assertion,
    })?;
    let user = accounts::me(&state, &email).await?;
    let token = state.auth.tokens().issue_session(email.as_str())?;

    Ok(Json(UserResponse {
        success: true,
        user,
        token: Some(token),
    }))
}

#[tracing::instrument(skip_all)]
async fn list_notes(
    State(state): State<Arc<AppState>>,
    AuthUser(owner): AuthUser,
) -> Result<Json<NotesResponse>, ApiError> {
    let notes = notes::list(&state, &owner).await?;
    Ok(Json(NotesResponse {
        success: true,
        notes,
    }))
}

#[tracing::instrument(skip_all)]
async fn create_note(
    State(state): State<Arc<AppState>>,
    AuthUser(owner): AuthUser,
    body: AppJson<CreateNoteRequest>,
) -> Result<(StatusCode, Json<SuccessResponse>), ApiError> {
    let Json(request) = body?;
    notes::create(&state, &owner, request).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::with_message("Note saved"))))
}

#[tracing::instrument(skip_all)]
async fn delete_note(
    State(state): State<Arc<AppState>>,
    AuthUser(owner): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    notes::delete(&state, &owner, &id).await?;
    Ok(Json(SuccessResponse::with_message("Note deleted")))
}

fn google_not_configured() -> ApiError {
    ApiError::NotFound("Google login is not configured".to_string())
}

async fn google_login(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
    let google = state.google.as_ref().ok_or_else(google_not_configured)?;
    let url = google.authorize_url(state.store.as_ref()).await?;
    Ok(Redirect::to(&url))
}

/// Finish a Google login. The outcome travels in the URL fragment so it never
/// reaches server logs of the success page.
async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Redirect, ApiError> {
    let google = state.google.as_ref().ok_or_else(google_not_configured)?;
    let success = google.success_redirect();
    let fail = |reason: &str| {
        let fragment = form_urlencoded::Serializer::new(String::new())
            .append_pair("error", reason)
            .finish();
        Redirect::to(&format!("{success}#{fragment}"))
    };

    if let Some(error) = params.get("error") {
        tracing::warn!(%error, "Google login refused");
        return Ok(fail("access_denied"));
    }
    let Some(code) = params.get("code") else {
        tracing::error!("Google callback missing code");
        return Ok(fail("missing_code"));
    };
    let Some(oauth_state) = params.get("state") else {
        tracing::error!("Google callback missing state");
        return Ok(fail("missing_state"));
    };

    let identity = match google.exchange_code(state.store.as_ref(), code, oauth_state).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!(error = ?e, "Google OAuth exchange error");
            return Ok(fail("oauth_error"));
        }
    };

    match accounts::reconcile_federated(&state, identity).await {
        Ok((user, assertion)) => {
            tracing::info!(user_id = %user.id, email = %user.email, "Google login");
            let fragment = form_urlencoded::Serializer::new(String::new())
                .append_pair("email", &user.email)
                .append_pair("assertion", &assertion)
                .finish();
            Ok(Redirect::to(&format!("{success}#{fragment}")))
        }
        Err(e) => {
            tracing::error!(error = ?e, "failed to reconcile Google user");
            Ok(fail("account_error"))
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
