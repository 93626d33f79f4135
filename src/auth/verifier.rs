/// ID Token Verification
///
/// The provider's ID token is checked by an `IdTokenVerifier`. The middleware
/// only needs "verify and hand me the claims"; the JWKS implementation below
/// delegates all cryptography to `jsonwebtoken`.
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use tokio::sync::RwLock;
use tracing::debug;

use super::error::AuthError;
use super::types::{ClientId, IdToken, Uri};

const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Verifies a provider ID token and returns its claims
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    /// Check signature, issuer, audience and expiry; return the verified claims
    async fn verify(&self, id_token: &IdToken) -> Result<serde_json::Value, AuthError>;
}

/// Verifier backed by the provider's published JSON Web Key Set
///
/// The key set is cached and only fetched again when a token names a key ID
/// the cache does not know, which is how providers roll their keys.
pub struct JwksVerifier {
    jwks_uri: Uri,
    issuers: Vec<String>,
    audience: ClientId,
    http_client: reqwest::Client,
    keys: RwLock<JwkSet>,
}

impl JwksVerifier {
    pub fn new(jwks_uri: Uri, issuers: Vec<String>, audience: ClientId) -> Self {
        Self {
            jwks_uri,
            issuers,
            audience,
            http_client: reqwest::Client::new(),
            keys: RwLock::new(JwkSet { keys: Vec::new() }),
        }
    }

    /// Verifier for Google-issued ID tokens addressed to `client_id`
    pub fn google(client_id: ClientId) -> Result<Self, AuthError> {
        Ok(Self::new(
            Uri::parse(GOOGLE_JWKS_URL)?,
            GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
            client_id,
        ))
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        let response = self.http_client.get(self.jwks_uri.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::provider_response(
                "can not read JWKS",
                status.as_u16(),
                body,
            ));
        }

        Ok(response.json::<JwkSet>().await?)
    }

    async fn key_for(&self, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(jwk) = self.keys.read().await.find(kid) {
            return Ok(jwk.clone());
        }

        let fresh = self.fetch_keys().await?;
        debug!(kid = %kid, keys = fresh.keys.len(), "JWKS refreshed");

        let mut keys = self.keys.write().await;
        *keys = fresh;
        keys.find(kid).cloned().ok_or_else(|| {
            AuthError::IdTokenVerification(format!("Key ID {} not found in JWKS", kid))
        })
    }
}

#[async_trait]
impl IdTokenVerifier for JwksVerifier {
    async fn verify(&self, id_token: &IdToken) -> Result<serde_json::Value, AuthError> {
        let header = decode_header(id_token.expose()).map_err(|e| {
            AuthError::IdTokenVerification(format!("Failed to decode ID token header: {}", e))
        })?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthError::IdTokenVerification(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }

        let kid = header.kid.ok_or_else(|| {
            AuthError::IdTokenVerification("ID token missing key ID (kid)".to_string())
        })?;

        let jwk = self.key_for(&kid).await?;
        let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            AuthError::IdTokenVerification(format!("Failed to create decoding key: {}", e))
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&self.issuers);

        let data = decode::<serde_json::Value>(id_token.expose(), &decoding_key, &validation)
            .map_err(|e| {
                AuthError::IdTokenVerification(format!("ID token validation failed: {}", e))
            })?;

        debug!(kid = %kid, "ID token verified");
        Ok(data.claims)
    }
}
