//! # Accounts
//!
//! Registration and sign-in for both identity paths:
//!
//! - **Email + OTP**: [`send_otp`] checks the registration rule for the mode
//!   and mails a code; [`signup`] and [`signin`] then mint a session token.
//!   With `otp.require_verification` set, the server generates the code, keeps
//!   a hashed challenge, and signup/signin must present it.
//! - **Google**: [`reconcile_federated`] creates the local user on first login
//!   and mints the short-lived assertion the browser exchanges at `POST /api/me`.
//!
//! Every email is normalized (trimmed, lowercased) before it touches the store.

use chrono::{Duration, NaiveDate, Utc};
use store::{AuthProvider, NewUser, OtpMode, OtpStore, UserStore};

use crate::auth::otp::{self, OtpCheck};
use crate::auth::{is_plausible_email, normalize_email, VerifiedEmail};
use crate::error::ApiError;
use crate::mail::OtpMessage;
use crate::models::{SendOtpRequest, SigninRequest, SignupRequest, TokenResponse, UserInfo};
use crate::state::AppState;

/// Identity returned by a federated provider after a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct FederatedIdentity {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

fn invalid_otp() -> ApiError {
    ApiError::Unauthorized("Invalid or expired OTP".to_string())
}

/// Validate the request and mail a code.
///
/// With `otp.require_verification` the server picks the code, stores its
/// challenge, and ignores any `otp` in the request. Otherwise the caller's
/// code is mailed as is and nothing is stored.
pub async fn send_otp(state: &AppState, request: SendOtpRequest) -> Result<(), ApiError> {
    let email = normalize_email(&request.email);
    let enforced = state.settings.otp.require_verification;

    let Some(mode) = request.mode else {
        return Err(ApiError::BadRequest("Email, OTP and mode are required".to_string()));
    };
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email, OTP and mode are required".to_string()));
    }
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("Invalid email".to_string()));
    }

    let code = if enforced {
        otp::generate_code()
    } else {
        let code = request.otp.trim();
        if code.is_empty() {
            return Err(ApiError::BadRequest("Email, OTP and mode are required".to_string()));
        }
        if !otp::is_valid_code(code) {
            return Err(ApiError::BadRequest("OTP must be 6 digits".to_string()));
        }
        code.to_string()
    };

    let exists = state.store.find_user_by_email(&email).await?.is_some();
    match mode {
        OtpMode::Signup if exists => {
            return Err(ApiError::Conflict("Email already exists".to_string()))
        }
        OtpMode::Signin if !exists => {
            return Err(ApiError::NotFound("User not found".to_string()))
        }
        _ => {}
    }

    if enforced {
        let ttl = Duration::minutes(state.settings.otp.ttl_minutes);
        state
            .store
            .put_otp(otp::challenge(&email, mode, &code, Utc::now(), ttl))
            .await?;
    }

    state
        .mailer
        .send(OtpMessage {
            to: email.clone(),
            code,
        })
        .await?;

    tracing::info!(%email, mode = mode.as_str(), "OTP sent");
    Ok(())
}

/// Check the submitted code when verification is enforced.
async fn check_otp(
    state: &AppState,
    email: &str,
    mode: OtpMode,
    code: Option<&str>,
) -> Result<(), ApiError> {
    if !state.settings.otp.require_verification {
        return Ok(());
    }

    let code = code.map(str::trim).filter(|c| otp::is_valid_code(c)).ok_or_else(invalid_otp)?;
    let check = otp::verify_otp(
        state.store.as_ref(),
        email,
        mode,
        code,
        Utc::now(),
        state.settings.otp.max_attempts,
    )
    .await?;

    match check {
        OtpCheck::Valid => Ok(()),
        other => {
            tracing::warn!(%email, mode = mode.as_str(), ?other, "OTP rejected");
            Err(invalid_otp())
        }
    }
}

/// Create an email account and return its session token.
pub async fn signup(state: &AppState, request: SignupRequest) -> Result<TokenResponse, ApiError> {
    let email = normalize_email(&request.email);
    let name = request.name.trim();
    let dob = request.dob.trim();

    if name.is_empty() || dob.is_empty() || email.is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("Invalid email".to_string()));
    }
    let date_of_birth = NaiveDate::parse_from_str(dob, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("Date of birth must be YYYY-MM-DD".to_string()))?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }

    check_otp(state, &email, OtpMode::Signup, request.otp.as_deref()).await?;

    // A concurrent signup for the same email surfaces as DuplicateEmail -> 409.
    let user = state
        .store
        .insert_user(NewUser {
            name: Some(name.to_string()),
            email: email.clone(),
            date_of_birth: Some(date_of_birth),
            image: None,
            provider: AuthProvider::Email,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(user_id = %user.id, %email, "user registered");

    Ok(TokenResponse {
        success: true,
        token: state.auth.tokens().issue_session(&email)?,
    })
}

/// Sign in an existing account and return a fresh session token.
pub async fn signin(state: &AppState, request: SigninRequest) -> Result<TokenResponse, ApiError> {
    let email = normalize_email(&request.email);
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".to_string()));
    }

    if state.store.find_user_by_email(&email).await?.is_none() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    check_otp(state, &email, OtpMode::Signin, request.otp.as_deref()).await?;

    Ok(TokenResponse {
        success: true,
        token: state.auth.tokens().issue_session(&email)?,
    })
}

/// The user record behind a verified email.
pub async fn me(state: &AppState, email: &VerifiedEmail) -> Result<UserInfo, ApiError> {
    state
        .store
        .find_user_by_email(email.as_str())
        .await?
        .map(|user| UserInfo::from(&user))
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Look up or create the local user for a federated identity, and mint the
/// assertion the client exchanges for a session token.
///
/// An existing record is returned unchanged, whatever provider created it.
pub async fn reconcile_federated(
    state: &AppState,
    identity: FederatedIdentity,
) -> Result<(UserInfo, String), ApiError> {
    let email = normalize_email(&identity.email);
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("Identity provider returned no email".to_string()));
    }

    let user = state
        .store
        .insert_user_if_absent(NewUser {
            name: identity.name,
            email: email.clone(),
            date_of_birth: None,
            image: identity.picture,
            provider: AuthProvider::Google,
            created_at: Utc::now(),
        })
        .await?;

    let assertion = state.auth.tokens().issue_federated(&email)?;
    Ok((UserInfo::from(&user), assertion))
}
