/// Google OAuth2/OIDC Provider Implementation
///
/// Implements the authorization-code flow against Google. The identity is
/// taken from the verified ID token; when the token endpoint returns none,
/// the userinfo endpoint is used instead.
use super::{IdentityProvider, ProviderConfig, ProviderOutcome};
use crate::auth::cookies::{callback_cookie, set_cookies};
use crate::auth::error::AuthError;
use crate::auth::oauth2::AuthorizationCodeClient;
use crate::auth::types::{AuthorizationCode, EmailAddress, Identity, ProviderTag};
use crate::auth::verifier::{IdTokenVerifier, JwksVerifier};
use async_trait::async_trait;
use axum::http::request::Parts;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const GOOGLE_SCOPE_USER_EMAIL: &str = "https://www.googleapis.com/auth/userinfo.email";
const GOOGLE_SCOPE_USER_PROFILE: &str = "https://www.googleapis.com/auth/userinfo.profile";

/// Google user info, as found in ID token claims and the userinfo response
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    /// Absent means unknown; only an explicit `false` discards the email
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

/// Query parameters Google appends to the callback URI
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// Google OAuth2/OIDC Provider
pub struct GoogleProvider {
    config: ProviderConfig,
    client: AuthorizationCodeClient,
    callback_path: String,
    verifier: Arc<dyn IdTokenVerifier>,
}

impl GoogleProvider {
    /// Provider configuration with Google's endpoints and default scopes
    pub fn default_config(
        client_id: &str,
        client_secret: &str,
        callback_uri: &str,
    ) -> Result<ProviderConfig, AuthError> {
        ProviderConfig::new(
            client_id,
            client_secret,
            callback_uri,
            GOOGLE_AUTH_URL,
            GOOGLE_TOKEN_URL,
            GOOGLE_USERINFO_URL,
            vec![
                GOOGLE_SCOPE_USER_EMAIL.to_string(),
                GOOGLE_SCOPE_USER_PROFILE.to_string(),
            ],
        )
    }

    /// Create a provider that verifies ID tokens with Google's published keys
    pub fn from_credentials(
        client_id: &str,
        client_secret: &str,
        callback_uri: &str,
    ) -> Result<Self, AuthError> {
        let config = Self::default_config(client_id, client_secret, callback_uri)?;
        let verifier = JwksVerifier::google(config.client_id.clone())?;
        Ok(Self::new(config, Arc::new(verifier)))
    }

    /// Create a provider with an explicit configuration and token verifier
    pub fn new(config: ProviderConfig, verifier: Arc<dyn IdTokenVerifier>) -> Self {
        let client = AuthorizationCodeClient::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.callback_uri.clone(),
        );
        let callback_path = config.callback_uri.path().to_string();

        Self {
            config,
            client,
            callback_path,
            verifier,
        }
    }

    fn redirect_to_auth_endpoint(&self, return_path: &str) -> Response {
        let location = self
            .client
            .authorization_url(&self.config.auth_endpoint, &self.config.scopes);

        info!(return_path = %return_path, "redirecting to google auth endpoint");

        (
            StatusCode::FOUND,
            set_cookies([callback_cookie(return_path)]),
            [(header::LOCATION, location.to_string())],
            "redirect to google auth endpoint",
        )
            .into_response()
    }

    async fn callback(&self, request: &Parts) -> Result<Identity, AuthError> {
        let params: CallbackParams =
            serde_urlencoded::from_str(request.uri.query().unwrap_or_default())
                .map_err(|e| AuthError::protocol(format!("malformed callback query: {}", e)))?;

        let code = match params.code.filter(|c| !c.is_empty()) {
            Some(code) => AuthorizationCode::from(code),
            None => {
                let reason = match params.error {
                    Some(error) => format!("no code in redirect URI (provider error: {})", error),
                    None => "no code in redirect URI".to_string(),
                };
                return Err(AuthError::protocol(reason));
            }
        };

        let tokens = self
            .client
            .exchange_code(&self.config.token_endpoint, &code)
            .await?;

        let user_info: GoogleUserInfo = match tokens.id_token.as_ref().filter(|t| !t.is_empty()) {
            Some(id_token) => {
                let claims = self.verifier.verify(id_token).await?;
                serde_json::from_value(claims)?
            }
            None => {
                self.client
                    .fetch_user_info(&self.config.userinfo_endpoint, &tokens.access_token)
                    .await?
            }
        };

        Ok(self.convert_userinfo(user_info))
    }

    fn convert_userinfo(&self, info: GoogleUserInfo) -> Identity {
        if info.email_verified == Some(false) {
            warn!(sub = %info.sub, "ignoring unverified email claim");
        }

        let email = info
            .email
            .filter(|e| !e.is_empty() && info.email_verified != Some(false))
            .and_then(|e| match EmailAddress::parse(e) {
                Ok(email) => Some(email),
                Err(err) => {
                    warn!(sub = %info.sub, error = %err, "ignoring malformed email claim");
                    None
                }
            });

        Identity::new(
            ProviderTag::google(),
            info.name.unwrap_or_default(),
            info.sub,
            email,
        )
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn callback_path(&self) -> &str {
        &self.callback_path
    }

    async fn authenticate(&self, request: &Parts) -> Result<ProviderOutcome, AuthError> {
        if request.method == Method::GET && request.uri.path() == self.callback_path {
            return self.callback(request).await.map(ProviderOutcome::Authenticated);
        }

        Ok(ProviderOutcome::Redirect(
            self.redirect_to_auth_endpoint(request.uri.path()),
        ))
    }
}
