//! # Google OAuth 2.0 login
//!
//! Authorization Code flow with PKCE. The identity provider is trusted to
//! return a verified email; reconciling that identity with a local user is
//! done by [`crate::accounts::reconcile_federated`].
//!
//! ## Flow
//!
//! 1. **[`authorize_url`](GoogleOAuth::authorize_url)** builds the consent URL
//!    (`openid`, `email`, `profile` scopes) with a random PKCE challenge, and
//!    stores the CSRF state and verifier for 10 minutes.
//! 2. **[`exchange_code`](GoogleOAuth::exchange_code)**, called from
//!    `/auth/google/callback`, takes the stored state (single use), exchanges
//!    the code and verifier for an access token, and fetches the userinfo.
//!    Accounts whose email Google does not report as verified are refused.

use chrono::{Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, PkceCodeChallenge,
    PkceCodeVerifier, Scope, TokenResponse,
};
use serde::Deserialize;
use store::{OAuthState, OAuthStateStore};

use super::config::OAuthConfig;
use crate::accounts::FederatedIdentity;
use crate::config::GoogleSettings;
use crate::error::ApiError;

const PROVIDER: &str = "google";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Google user info from API.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    email: String,
    verified_email: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleUser {
    /// Only an email Google explicitly reports as verified is accepted.
    fn into_identity(self) -> Result<FederatedIdentity, ApiError> {
        if self.verified_email != Some(true) {
            return Err(ApiError::Forbidden(
                "Google account email is not verified".to_string(),
            ));
        }

        Ok(FederatedIdentity {
            email: self.email,
            name: self.name,
            picture: self.picture,
        })
    }
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Google OAuth handler.
pub struct GoogleOAuth {
    config: OAuthConfig,
    http: reqwest::Client,
    success_redirect: String,
}

impl GoogleOAuth {
    pub fn new(settings: &GoogleSettings) -> Result<Self, String> {
        let config = OAuthConfig::google(settings).map_err(|e| e.to_string())?;

        // The token endpoint must not be followed through redirects.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Self {
            config,
            http,
            success_redirect: settings.success_redirect.clone(),
        })
    }

    /// Where the browser goes once the callback is done.
    pub fn success_redirect(&self) -> &str {
        &self.success_redirect
    }

    fn create_client(&self) -> ConfiguredClient {
        BasicClient::new(self.config.client_id.clone())
            .set_client_secret(self.config.client_secret.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
    }

    /// Generate the authorization URL and remember its state and PKCE verifier.
    pub async fn authorize_url<S>(&self, store: &S) -> Result<String, ApiError>
    where
        S: OAuthStateStore + ?Sized,
    {
        let client = self.create_client();
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        store
            .put_oauth_state(OAuthState {
                state: csrf_state.secret().clone(),
                provider: PROVIDER.to_string(),
                pkce_verifier: pkce_verifier.secret().clone(),
                expires_at: Utc::now() + Duration::minutes(10),
            })
            .await?;

        Ok(auth_url.to_string())
    }

    /// Exchange an authorization code for the user's Google identity.
    pub async fn exchange_code<S>(
        &self,
        store: &S,
        code: &str,
        state: &str,
    ) -> Result<FederatedIdentity, ApiError>
    where
        S: OAuthStateStore + ?Sized,
    {
        let stored = store
            .take_oauth_state(state, PROVIDER, Utc::now())
            .await?
            .ok_or_else(|| ApiError::BadRequest("Invalid or expired OAuth state".to_string()))?;

        let token_result = self
            .create_client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(stored.pkce_verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| ApiError::server("Google login failed", format!("token exchange: {e}")))?;

        let access_token = token_result.access_token().secret();

        let google_user: GoogleUser = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ApiError::server("Google login failed", format!("userinfo: {e}")))?
            .json()
            .await
            .map_err(|e| ApiError::server("Google login failed", format!("userinfo body: {e}")))?;

        google_user.into_identity()
    }
}
