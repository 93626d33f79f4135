/// Typed values used across the authentication pipeline
///
/// Every string that crosses a trust boundary gets its own wrapper. Values are
/// validated when they are constructed, and the wrappers carrying credentials
/// print `[REDACTED]` in `Debug` so they can be handed to `tracing` fields
/// without leaking.
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::error::AuthError;

/// Name of the cookie carrying the signed session token
pub const COOKIE_TOKEN_NAME: &str = "omniauth_token";

/// Name of the cookie carrying the path to return to after login
pub const COOKIE_CALLBACK_NAME: &str = "omniauth_callback";

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid");
}

macro_rules! redacted_string {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Returns the raw value. Never pass the result to a log macro.
            pub fn expose(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "([REDACTED])"))
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

redacted_string!(
    /// OAuth2 client secret issued by the identity provider
    ClientSecret
);
redacted_string!(
    /// HMAC key for session tokens
    TokenSecret
);
redacted_string!(
    /// Signed session token as carried in the session cookie
    SessionToken
);
redacted_string!(
    /// Authorization code received on the callback
    AuthorizationCode
);
redacted_string!(
    /// Provider access token
    AccessToken
);
redacted_string!(
    /// Provider ID token (a JWT signed by the provider)
    IdToken
);

impl ClientSecret {
    pub fn new(value: impl Into<String>) -> Result<Self, AuthError> {
        let value = value.into();
        if value.is_empty() {
            return Err(AuthError::invalid_config("client_secret", "cannot be empty"));
        }
        Ok(Self(value))
    }
}

impl TokenSecret {
    pub fn new(value: impl Into<String>) -> Result<Self, AuthError> {
        let value = value.into();
        if value.is_empty() {
            return Err(AuthError::invalid_config("jwt.secret", "cannot be empty"));
        }
        Ok(Self(value))
    }
}

/// OAuth2 client identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(value: impl Into<String>) -> Result<Self, AuthError> {
        let value = value.into();
        if value.is_empty() {
            return Err(AuthError::invalid_config("client_id", "cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Absolute URI, validated on construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri(url::Url);

impl Uri {
    pub fn parse(value: &str) -> Result<Self, AuthError> {
        if value.is_empty() {
            return Err(AuthError::invalid_config("uri", "cannot be empty"));
        }
        let url = url::Url::parse(value)
            .map_err(|e| AuthError::invalid_config("uri", format!("{value}: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AuthError::invalid_config(
                "uri",
                format!("{value}: must start with http:// or https://"),
            ));
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn as_url(&self) -> &url::Url {
        &self.0
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Email address with a validated shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(value: impl Into<String>) -> Result<Self, AuthError> {
        let value = value.into();
        if !EMAIL_PATTERN.is_match(&value) {
            return Err(AuthError::invalid_config(
                "email",
                format!("'{value}' is not an email address"),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Tag naming the identity provider an identity came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderTag(String);

impl ProviderTag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn google() -> Self {
        Self::new("google")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated identity attached to every admitted request
///
/// Two identities are the same user when provider and subject id match;
/// name and email are informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    provider: ProviderTag,
    name: String,
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<EmailAddress>,
}

impl Identity {
    pub fn new(
        provider: ProviderTag,
        name: impl Into<String>,
        id: impl Into<String>,
        email: Option<EmailAddress>,
    ) -> Self {
        Self {
            provider,
            name: name.into(),
            id: id.into(),
            email,
        }
    }

    pub fn provider(&self) -> &ProviderTag {
        &self.provider
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> Option<&EmailAddress> {
        self.email.as_ref()
    }

    /// Session token subject: `<provider>:<id>`
    pub fn subject(&self) -> String {
        format!("{}:{}", self.provider, self.id)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider && self.id == other.id
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.hash(state);
        self.id.hash(state);
    }
}
