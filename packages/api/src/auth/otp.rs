//! # One-time passwords
//!
//! A code is six ASCII digits. When it is sent, the server keeps an
//! [`OtpChallenge`] holding only the code's SHA-256 and an expiry, one per
//! (email, mode). [`verify_otp`] consumes the challenge on success, counts
//! failed attempts, and drops the challenge once `max_attempts` is reached or
//! it has expired.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use store::{OtpChallenge, OtpMode, OtpStore, StoreError};

pub const OTP_LENGTH: usize = 6;

/// Outcome of checking a submitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Mismatch,
    Expired,
    /// No code was sent for this email and mode, or it was already used.
    Missing,
}

/// Random six-digit code, zero padded.
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub fn is_valid_code(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the challenge to store for a code sent at `now`.
pub fn challenge(email: &str, mode: OtpMode, code: &str, now: DateTime<Utc>, ttl: Duration) -> OtpChallenge {
    OtpChallenge {
        email: email.to_string(),
        mode,
        code_hash: hash_code(code),
        attempts: 0,
        expires_at: now + ttl,
    }
}

/// Check `code` against the stored challenge for `email` and `mode`.
pub async fn verify_otp<S>(
    store: &S,
    email: &str,
    mode: OtpMode,
    code: &str,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<OtpCheck, StoreError>
where
    S: OtpStore + ?Sized,
{
    let Some(challenge) = store.find_otp(email, mode).await? else {
        return Ok(OtpCheck::Missing);
    };

    if challenge.expires_at <= now {
        store.delete_otp(email, mode).await?;
        return Ok(OtpCheck::Expired);
    }

    if challenge.code_hash != hash_code(code) {
        let attempts = store.record_otp_failure(email, mode).await?;
        if attempts >= max_attempts {
            store.delete_otp(email, mode).await?;
        }
        return Ok(OtpCheck::Mismatch);
    }

    store.delete_otp(email, mode).await?;
    Ok(OtpCheck::Valid)
}
