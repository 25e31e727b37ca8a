//! Authentication: signed credentials, one-time passwords, Google login, and
//! resolution of presented credentials to a verified email.

mod config;
mod credential;
mod google;
pub mod otp;
mod token;

pub use self::config::OAuthConfig;
pub use credential::{AuthUser, Authenticator, Credential, VerifiedEmail};
pub use google::GoogleOAuth;
pub use token::{Claims, TokenKind, TokenService};

/// Canonical form of an email address used as the identity key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose shape check; deliverability is proven by the OTP mail.
pub fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace),
        None => false,
    }
}
