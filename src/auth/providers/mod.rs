/// Identity Provider adapters
///
/// This module provides the `IdentityProvider` trait the middleware talks to,
/// and the configuration shared by authorization-code providers.
use async_trait::async_trait;
use axum::http::request::Parts;
use axum::response::Response;

use crate::auth::error::AuthError;
use crate::auth::types::{ClientId, ClientSecret, Identity, Uri};

pub mod google;

pub use google::GoogleProvider;

/// Result of handing an unauthenticated request to a provider
#[derive(Debug)]
pub enum ProviderOutcome {
    /// The callback completed and produced an identity
    Authenticated(Identity),

    /// The provider answered the request itself (redirect to login)
    Redirect(Response),
}

/// Identity provider trait
///
/// Called for requests that carry no session cookie. Implementations either
/// complete the login callback or start the login flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Get the provider name (e.g. "google")
    fn name(&self) -> &str;

    /// Path on this application that receives the provider callback
    fn callback_path(&self) -> &str;

    /// Complete the callback or redirect the caller to the provider
    async fn authenticate(&self, request: &Parts) -> Result<ProviderOutcome, AuthError>;
}

/// Configuration for an authorization-code provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub callback_uri: Uri,
    pub auth_endpoint: Uri,
    pub token_endpoint: Uri,
    pub userinfo_endpoint: Uri,
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    /// Validate raw client settings against the given endpoints
    pub fn new(
        client_id: &str,
        client_secret: &str,
        callback_uri: &str,
        auth_endpoint: &str,
        token_endpoint: &str,
        userinfo_endpoint: &str,
        scopes: Vec<String>,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            client_id: ClientId::new(client_id)?,
            client_secret: ClientSecret::new(client_secret)?,
            callback_uri: Uri::parse(callback_uri).map_err(|e| rename_key(e, "callback_uri"))?,
            auth_endpoint: Uri::parse(auth_endpoint).map_err(|e| rename_key(e, "auth_endpoint"))?,
            token_endpoint: Uri::parse(token_endpoint)
                .map_err(|e| rename_key(e, "token_endpoint"))?,
            userinfo_endpoint: Uri::parse(userinfo_endpoint)
                .map_err(|e| rename_key(e, "userinfo_endpoint"))?,
            scopes,
        })
    }
}

fn rename_key(err: AuthError, key: &str) -> AuthError {
    match err {
        AuthError::InvalidConfig { reason, .. } => AuthError::invalid_config(key, reason),
        other => other,
    }
}
