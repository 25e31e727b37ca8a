use std::sync::Arc;

use store::Store;

use crate::auth::{Authenticator, GoogleOAuth};
use crate::config::Settings;
use crate::mail::Mailer;

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub settings: Settings,
    pub auth: Authenticator,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    /// Present when `[google]` is configured.
    pub google: Option<GoogleOAuth>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, String> {
        let google = settings.google.as_ref().map(GoogleOAuth::new).transpose()?;

        Ok(Self {
            auth: Authenticator::new(&settings.auth),
            settings,
            store,
            mailer,
            google,
        })
    }
}
