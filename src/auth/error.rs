// Authentication Error Types
// Error handling for the session codec, the provider flow and configuration

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    // Provider protocol errors
    #[error("Invalid OAuth2 provider procedure: {reason}")]
    InvalidProviderProtocol {
        reason: String,
        /// Status returned by the provider, if it answered at all
        status: Option<u16>,
        /// Raw response body, kept for diagnostics only
        body: Option<String>,
    },

    #[error("ID token verification failed: {0}")]
    IdTokenVerification(String),

    // Session token errors
    #[error("Invalid or unavailable token: {0}")]
    InvalidToken(String),

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    // Network/HTTP errors
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),

    #[error("Provider communication timeout")]
    Timeout,

    // General errors
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Provider protocol failure caused by the inbound request itself
    pub fn protocol(reason: impl Into<String>) -> Self {
        AuthError::InvalidProviderProtocol {
            reason: reason.into(),
            status: None,
            body: None,
        }
    }

    /// Provider protocol failure caused by an unexpected provider response
    pub fn provider_response(reason: impl Into<String>, status: u16, body: String) -> Self {
        AuthError::InvalidProviderProtocol {
            reason: reason.into(),
            status: Some(status),
            body: Some(body),
        }
    }

    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        AuthError::InvalidConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::HttpError(err.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::JsonError(err.to_string())
    }
}

// HTTP status code mapping for error responses
impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidToken(_) | AuthError::IdTokenVerification(_) => 401,

            AuthError::InvalidProviderProtocol { status: None, .. } => 400,

            AuthError::InvalidProviderProtocol { status: Some(_), .. }
            | AuthError::HttpError(_)
            | AuthError::JsonError(_) => 502,

            AuthError::Timeout => 504,

            AuthError::InvalidConfig { .. } | AuthError::Internal(_) => 500,
        }
    }
}
