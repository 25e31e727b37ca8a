//! # User projection sent to clients
//!
//! [`store::User`] is the stored record; [`UserInfo`] is the subset returned by
//! `/api/me`. It is `Serialize + Deserialize + PartialEq` so clients of this crate
//! can decode it, and it renders the id as a string and the date of birth under
//! the same `dob` key that `/api/signup` accepts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use store::{AuthProvider, User};

/// User information safe to send to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub dob: Option<NaiveDate>,
    pub image: Option<String>,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        UserInfo {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            dob: user.date_of_birth,
            image: user.image.clone(),
            provider: user.provider,
            created_at: user.created_at,
        }
    }
}
