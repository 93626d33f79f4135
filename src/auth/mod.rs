// Authentication Module
// OAuth2/OIDC login, stateless session cookies and access policies for axum

pub mod config;
pub mod cookies;
pub mod error;
pub mod middleware;
pub mod oauth2;
pub mod policy;
pub mod providers;
pub mod random;
pub mod session;
pub mod types;
pub mod verifier;

pub use config::{GoogleSettings, JwtSettings, PolicySettings, Settings};
pub use error::AuthError;
pub use middleware::{AuthenticatedUser, Clock, OmniAuth, OmniAuthBuilder, omniauth_middleware};
pub use policy::{Policy, PolicySet};
pub use providers::{GoogleProvider, IdentityProvider, ProviderConfig, ProviderOutcome};
pub use random::RandomSource;
pub use session::SessionCodec;
pub use types::{EmailAddress, Identity, ProviderTag};
pub use verifier::{IdTokenVerifier, JwksVerifier};
