//! Authentication middleware for axum: OAuth2/OIDC login, HS256 session
//! cookies and an OR-combined access policy gate.

pub mod auth;
pub mod config;

pub use auth::{
    AuthError, AuthenticatedUser, Identity, OmniAuth, Policy, PolicySet, omniauth_middleware,
};
