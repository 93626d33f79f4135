// Authentication Configuration
// Provider credentials, session token settings and access policies

use serde::Deserialize;
use std::time::Duration;

use super::error::AuthError;
use super::middleware::{OmniAuth, OmniAuthBuilder};
use super::policy::{Policy, PolicySet};
use super::types::{ClientSecret, TokenSecret};

/// Authentication settings as loaded from the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Google login; without it only existing sessions are accepted
    #[serde(default)]
    pub google: Option<GoogleSettings>,

    /// Session token settings; random issuer and secret when absent
    #[serde(default)]
    pub jwt: Option<JwtSettings>,

    #[serde(default)]
    pub policy: PolicySettings,

    /// Upper bound for the login callback, in seconds
    #[serde(default)]
    pub provider_timeout_secs: Option<u64>,
}

/// Google OAuth2 client registration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: ClientSecret,
    /// Absolute callback URI registered with Google
    pub callback_uri: String,
}

/// Session token settings
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    pub issuer: String,
    pub secret: TokenSecret,

    /// Session lifetime in seconds (default: 24 hours)
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: i64,
}

/// Access policies, OR-ed together
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicySettings {
    /// Admit every authenticated user
    #[serde(default)]
    pub allow_all: bool,

    /// Admit users whose email is listed here
    #[serde(default)]
    pub allowed_emails: Vec<String>,
}

impl PolicySettings {
    pub fn to_policy_set(&self) -> PolicySet {
        let mut policies = PolicySet::default();
        if self.allow_all {
            policies.push(Policy::allow_all());
        }
        if !self.allowed_emails.is_empty() {
            policies.push(Policy::allowed_emails(self.allowed_emails.iter().cloned()));
        }
        policies
    }
}

impl Settings {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AuthError> {
        if let Some(ref jwt) = self.jwt {
            if jwt.issuer.is_empty() {
                return Err(AuthError::invalid_config("jwt.issuer", "cannot be empty"));
            }
            if jwt.secret.is_empty() {
                return Err(AuthError::invalid_config("jwt.secret", "cannot be empty"));
            }
            if jwt.ttl_secs <= 0 {
                return Err(AuthError::invalid_config("jwt.ttl_secs", "must be positive"));
            }
        }

        if self.provider_timeout_secs == Some(0) {
            return Err(AuthError::invalid_config(
                "provider_timeout_secs",
                "must be at least 1 second",
            ));
        }

        Ok(())
    }

    /// Builder pre-populated from these settings
    pub fn builder(&self) -> Result<OmniAuthBuilder, AuthError> {
        self.validate()?;

        let mut builder = OmniAuth::builder().policies(self.policy.to_policy_set());

        if let Some(ref google) = self.google {
            builder = builder.google(
                google.client_id.as_str(),
                google.client_secret.expose(),
                google.callback_uri.as_str(),
            );
        }

        if let Some(ref jwt) = self.jwt {
            builder = builder.jwt(
                jwt.issuer.as_str(),
                jwt.secret.expose(),
                chrono::Duration::seconds(jwt.ttl_secs),
            );
        }

        if let Some(secs) = self.provider_timeout_secs {
            builder = builder.provider_timeout(Duration::from_secs(secs));
        }

        Ok(builder)
    }

    pub fn build(&self) -> Result<OmniAuth, AuthError> {
        self.builder()?.build()
    }
}

fn default_session_ttl() -> i64 {
    86400
}
