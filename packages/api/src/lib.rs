//! # API crate: HTTP server for the notes service
//!
//! The request/response contracts in [`models`] are always compiled so that
//! clients can depend on this crate with `default-features = false`. Everything
//! that runs on the server sits behind the `server` feature (on by default).
//!
//! ## Modules
//!
//! | Module | Feature gate | Purpose |
//! |--------|-------------|---------|
//! | [`models`] | — | Request/response bodies and client-safe projections (`UserInfo`, `NoteInfo`) |
//! | [`config`] | `server` | Layered settings: `config.toml`, `NOTES_*` environment variables, `DATABASE_URL` |
//! | [`error`] | `server` | [`ApiError`] and its JSON rendering |
//! | [`auth`] | `server` | Signed tokens, one-time passwords, Google OAuth, credential resolution |
//! | [`mail`] | `server` | OTP mail over SMTP, or an in-memory outbox |
//! | [`db`] | `server` | PostgreSQL pool, migrations and the [`db::PgStore`] backend |
//! | [`accounts`] | `server` | OTP issuance, signup, signin, `/api/me`, federated user reconciliation |
//! | [`notes`] | `server` | Owner-scoped note listing, creation and deletion |
//! | [`routes`] | `server` | The axum [`Router`](axum::Router) wiring it all together |
//!
//! ## Wiring
//!
//! ```ignore
//! let settings = api::config::Settings::new()?;
//! let store = Arc::new(store::MemoryStore::new());
//! let mailer = Arc::new(api::mail::OutboxMailer::new());
//! let state = api::AppState::new(settings, store, mailer)?;
//! let app = api::router(Arc::new(state));
//! ```

pub mod models;

#[cfg(feature = "server")]
pub mod accounts;
#[cfg(feature = "server")]
pub mod auth;
#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod db;
#[cfg(feature = "server")]
pub mod error;
#[cfg(feature = "server")]
pub mod mail;
#[cfg(feature = "server")]
pub mod notes;
#[cfg(feature = "server")]
pub mod routes;
#[cfg(feature = "server")]
mod state;

pub use models::{NoteInfo, UserInfo};

#[cfg(feature = "server")]
pub use error::ApiError;
#[cfg(feature = "server")]
pub use routes::router;
#[cfg(feature = "server")]
pub use state::AppState;
