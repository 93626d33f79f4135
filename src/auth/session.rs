// Session Token Codec
// Stateless session credentials: an HS256 JWT embedding the identity and expiry

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::AuthError;
use super::types::{Identity, SessionToken, TokenSecret};

const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims carried by a session token
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    user: Identity,
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies session tokens
pub struct SessionCodec {
    issuer: String,
    secret: TokenSecret,
    expires_after: Duration,
}

impl SessionCodec {
    pub fn new(
        issuer: impl Into<String>,
        secret: TokenSecret,
        expires_after: Duration,
    ) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::invalid_config("jwt.secret", "cannot be empty"));
        }
        if expires_after <= Duration::zero() {
            return Err(AuthError::invalid_config("jwt.ttl", "must be positive"));
        }

        Ok(Self {
            issuer: issuer.into(),
            secret,
            expires_after,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expires_after(&self) -> Duration {
        self.expires_after
    }

    /// Issue a token for `user`, valid from `now` until `now + ttl`
    pub fn sign(&self, user: &Identity, now: DateTime<Utc>) -> Result<SessionToken, AuthError> {
        let claims = SessionClaims {
            user: user.clone(),
            iss: self.issuer.clone(),
            sub: user.subject(),
            iat: now.timestamp(),
            exp: (now + self.expires_after).timestamp(),
        };

        let token = encode(
            &Header::new(SESSION_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(self.secret.expose().as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("Failed to sign session token: {}", e)))?;

        Ok(SessionToken::from(token))
    }

    /// Check signature, algorithm, issuer and expiry, returning the embedded identity
    pub fn verify(&self, token: &SessionToken, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        let mut validation = Validation::new(SESSION_ALGORITHM);
        // Expiry is checked below against the caller's clock, with no leeway.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let data = decode::<SessionClaims>(
            token.expose(),
            &DecodingKey::from_secret(self.secret.expose().as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, "session token rejected");
            AuthError::InvalidToken(e.to_string())
        })?;

        let claims = data.claims;
        if claims.exp <= now.timestamp() {
            debug!(sub = %claims.sub, exp = claims.exp, "session token expired");
            return Err(AuthError::InvalidToken("token has expired".to_string()));
        }

        if claims.sub != claims.user.subject() {
            return Err(AuthError::InvalidToken(
                "subject does not match embedded identity".to_string(),
            ));
        }

        Ok(claims.user)
    }
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("issuer", &self.issuer)
            .field("secret", &self.secret)
            .field("expires_after", &self.expires_after)
            .finish()
    }
}
