/// Authentication Middleware
///
/// Axum middleware that authenticates every request through a session cookie
/// or the configured identity provider, applies the access policies and
/// injects the authenticated `Identity` into request extensions.
use crate::auth::cookies::{
    cleared_callback_cookie, cleared_session_cookie, session_cookie, set_cookies,
};
use crate::auth::error::AuthError;
use crate::auth::policy::{Policy, PolicySet};
use crate::auth::providers::{GoogleProvider, IdentityProvider, ProviderOutcome};
use crate::auth::random::RandomSource;
use crate::auth::session::SessionCodec;
use crate::auth::types::{
    COOKIE_CALLBACK_NAME, COOKIE_TOKEN_NAME, Identity, SessionToken, TokenSecret,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const ACCESS_DENIED_HTML: &str = "<html><body><h1>Access denied</h1></body></html>";
const RANDOM_JWT_FIELD_LEN: usize = 32;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Source of the current time, injectable for tests
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Configured authentication middleware state
pub struct OmniAuth {
    provider: Option<Arc<dyn IdentityProvider>>,
    policies: PolicySet,
    sessions: SessionCodec,
    provider_timeout: Option<Duration>,
    clock: Clock,
}

impl fmt::Debug for OmniAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OmniAuth")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("policies", &self.policies)
            .field("sessions", &self.sessions)
            .field("provider_timeout", &self.provider_timeout)
            .finish_non_exhaustive()
    }
}

impl OmniAuth {
    pub fn builder() -> OmniAuthBuilder {
        OmniAuthBuilder::default()
    }

    pub fn sessions(&self) -> &SessionCodec {
        &self.sessions
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn provider(&self) -> Option<&Arc<dyn IdentityProvider>> {
        self.provider.as_ref()
    }

    /// Run the authentication state machine for one request
    pub async fn handle(&self, request: Request, next: Next) -> Response {
        let (mut parts, body) = request.into_parts();
        let jar = CookieJar::from_headers(&parts.headers);
        let now = (self.clock)();

        let session = jar
            .get(COOKIE_TOKEN_NAME)
            .map(|c| c.value())
            .filter(|v| !v.is_empty());

        let user = match session {
            Some(token) => match self.sessions.verify(&SessionToken::from(token.to_string()), now) {
                Ok(user) => user,
                Err(err) => {
                    warn!(path = %parts.uri.path(), error = %err, "rejecting session cookie");
                    return (set_cookies([cleared_session_cookie()]), error_response(&err))
                        .into_response();
                }
            },
            None => match self.authenticate(&parts).await {
                Ok(Some(ProviderOutcome::Authenticated(user))) => {
                    info!(subject = %user.subject(), "login completed");
                    user
                }
                Ok(Some(ProviderOutcome::Redirect(response))) => return response,
                Ok(None) => {
                    debug!(path = %parts.uri.path(), "no session and no provider configured");
                    return access_denied();
                }
                Err(err) => return error_response(&err),
            },
        };

        let token = match self.sessions.sign(&user, now) {
            Ok(token) => token,
            Err(err) => return error_response(&err),
        };
        let mut issued = vec![session_cookie(token)];

        if !self.policies.decide(&parts, &user) {
            info!(subject = %user.subject(), path = %parts.uri.path(), "access denied by policy");
            return (set_cookies(issued), access_denied()).into_response();
        }

        let marker = jar
            .get(COOKIE_CALLBACK_NAME)
            .map(|c| c.value())
            .filter(|v| !v.is_empty());

        if let Some(marker) = marker {
            let location = local_redirect_target(marker).to_string();
            debug!(location = %location, "resuming request interrupted by login");
            issued.push(cleared_callback_cookie());
            return (
                StatusCode::FOUND,
                set_cookies(issued),
                [(header::LOCATION, location)],
            )
                .into_response();
        }

        parts.extensions.insert(user);
        let response = next.run(Request::from_parts(parts, body)).await;
        (set_cookies(issued), response).into_response()
    }

    async fn authenticate(&self, parts: &Parts) -> Result<Option<ProviderOutcome>, AuthError> {
        let Some(provider) = self.provider.as_ref() else {
            return Ok(None);
        };

        let outcome = match self.provider_timeout {
            Some(limit) => tokio::time::timeout(limit, provider.authenticate(parts))
                .await
                .map_err(|_| AuthError::Timeout)??,
            None => provider.authenticate(parts).await?,
        };

        Ok(Some(outcome))
    }
}

/// Axum middleware entry point
///
/// ```ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(auth, omniauth_middleware));
/// ```
pub async fn omniauth_middleware(
    State(auth): State<Arc<OmniAuth>>,
    request: Request,
    next: Next,
) -> Response {
    auth.handle(request, next).await
}

/// The fixed 401 page
pub fn access_denied() -> Response {
    (StatusCode::UNAUTHORIZED, Html(ACCESS_DENIED_HTML)).into_response()
}

fn error_response(err: &AuthError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "authentication failed");
    } else {
        warn!(status = status.as_u16(), error = %err, "authentication failed");
    }

    (status, err.to_string()).into_response()
}

/// Only follow local absolute paths stored in the marker cookie
fn local_redirect_target(marker: &str) -> &str {
    if marker.starts_with('/') && !marker.starts_with("//") && !marker.starts_with("/\\") {
        marker
    } else {
        "/"
    }
}

/// Identity placed in request extensions by the middleware
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

struct GoogleCredentials {
    client_id: String,
    client_secret: String,
    callback_uri: String,
}

struct JwtOptions {
    issuer: String,
    secret: String,
    expires_after: chrono::Duration,
}

/// Builder for `OmniAuth`; all validation happens in `build`
#[derive(Default)]
pub struct OmniAuthBuilder {
    provider: Option<Arc<dyn IdentityProvider>>,
    google: Option<GoogleCredentials>,
    jwt: Option<JwtOptions>,
    policies: PolicySet,
    random: Option<Arc<RandomSource>>,
    provider_timeout: Option<Duration>,
    clock: Option<Clock>,
}

impl OmniAuthBuilder {
    /// Use a custom identity provider
    pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self.google = None;
        self
    }

    /// Use Google with its default endpoints and JWKS verification
    pub fn google(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_uri: impl Into<String>,
    ) -> Self {
        self.google = Some(GoogleCredentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_uri: callback_uri.into(),
        });
        self.provider = None;
        self
    }

    /// Session token issuer, signing secret and lifetime
    pub fn jwt(
        mut self,
        issuer: impl Into<String>,
        secret: impl Into<String>,
        expires_after: chrono::Duration,
    ) -> Self {
        self.jwt = Some(JwtOptions {
            issuer: issuer.into(),
            secret: secret.into(),
            expires_after,
        });
        self
    }

    /// Append a policy; policies are OR-ed in insertion order
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Replace the whole policy set
    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    pub fn random_source(mut self, random: Arc<RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Bound the time spent in the provider step
    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = Some(timeout);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<OmniAuth, AuthError> {
        let provider = match (self.provider, self.google) {
            (Some(provider), _) => Some(provider),
            (None, Some(google)) => {
                let provider = GoogleProvider::from_credentials(
                    &google.client_id,
                    &google.client_secret,
                    &google.callback_uri,
                )?;
                Some(Arc::new(provider) as Arc<dyn IdentityProvider>)
            }
            (None, None) => None,
        };

        let sessions = match self.jwt {
            Some(jwt) => {
                if jwt.issuer.is_empty() {
                    return Err(AuthError::invalid_config("jwt.issuer", "cannot be empty"));
                }
                SessionCodec::new(jwt.issuer, TokenSecret::new(jwt.secret)?, jwt.expires_after)?
            }
            None => {
                let random = self.random.unwrap_or_default();
                debug!("no jwt settings given, generating random issuer and secret");
                SessionCodec::new(
                    random.token(RANDOM_JWT_FIELD_LEN),
                    TokenSecret::new(random.token(RANDOM_JWT_FIELD_LEN))?,
                    chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
                )?
            }
        };

        if self.policies.is_empty() {
            warn!("no access policies configured, every request will be denied");
        }

        if let Some(provider) = provider.as_ref() {
            info!(
                provider = provider.name(),
                callback_path = provider.callback_path(),
                "identity provider configured"
            );
        }

        Ok(OmniAuth {
            provider,
            policies: self.policies,
            sessions,
            provider_timeout: self.provider_timeout,
            clock: self.clock.unwrap_or_else(|| Arc::new(Utc::now) as Clock),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cookies::callback_cookie;
    use crate::auth::types::{EmailAddress, ProviderTag};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::{Router, middleware, routing::get};
    use tower::ServiceExt;

    fn test_user() -> Identity {
        Identity::new(
            ProviderTag::google(),
            "Test User",
            "42",
            Some(EmailAddress::parse("a@b.com").unwrap()),
        )
    }

    /// Provider that logs in on "/callback" and redirects everywhere else
    struct StubProvider;

    #[async_trait]
    impl IdentityProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn callback_path(&self) -> &str {
            "/callback"
        }

        async fn authenticate(&self, request: &Parts) -> Result<ProviderOutcome, AuthError> {
            if request.uri.path() == "/callback" {
                return Ok(ProviderOutcome::Authenticated(test_user()));
            }
            Ok(ProviderOutcome::Redirect(
                (
                    StatusCode::FOUND,
                    set_cookies([callback_cookie(request.uri.path())]),
                    [(header::LOCATION, "https://idp.example.com/auth")],
                )
                    .into_response(),
            ))
        }
    }

    /// Provider that never answers
    struct StalledProvider;

    #[async_trait]
    impl IdentityProvider for StalledProvider {
        fn name(&self) -> &str {
            "stalled"
        }

        fn callback_path(&self) -> &str {
            "/callback"
        }

        async fn authenticate(&self, _request: &Parts) -> Result<ProviderOutcome, AuthError> {
            std::future::pending().await
        }
    }

    fn app(auth: OmniAuth) -> Router {
        async fn whoami(AuthenticatedUser(user): AuthenticatedUser) -> String {
            user.subject()
        }

        Router::new()
            .route("/whoami", get(whoami))
            .route("/callback", get(whoami))
            .layer(middleware::from_fn_with_state(Arc::new(auth), omniauth_middleware))
    }

    fn builder() -> OmniAuthBuilder {
        OmniAuth::builder()
            .jwt("test-issuer", "test-secret", chrono::Duration::hours(1))
            .policy(Policy::allow_all())
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn set_cookie_headers(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_local_redirect_target() {
        assert_eq!(local_redirect_target("/secret"), "/secret");
        assert_eq!(local_redirect_target("/a/b?c=d"), "/a/b?c=d");
        assert_eq!(local_redirect_target("//evil.example.com"), "/");
        assert_eq!(local_redirect_target("/\\evil.example.com"), "/");
        assert_eq!(local_redirect_target("https://evil.example.com"), "/");
    }

    #[test]
    fn test_builder_generates_random_jwt_settings() {
        let auth = OmniAuth::builder()
            .random_source(Arc::new(RandomSource::from_seed(7)))
            .build()
            .unwrap();

        assert_eq!(auth.sessions().issuer().len(), 32);
        assert_eq!(auth.sessions().expires_after(), chrono::Duration::hours(24));
        assert!(auth.provider().is_none());
        assert!(auth.policies().is_empty());
    }

    #[test]
    fn test_builder_rejects_bad_settings() {
        let empty_secret = OmniAuth::builder()
            .jwt("issuer", "", chrono::Duration::hours(1))
            .build();
        assert!(matches!(empty_secret, Err(AuthError::InvalidConfig { .. })));

        let bad_callback = OmniAuth::builder().google("cid", "secret", "not-a-url").build();
        assert!(matches!(bad_callback, Err(AuthError::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder_google_provider() {
        let auth = OmniAuth::builder()
            .google("cid", "secret", "https://app.example.com/auth/google/callback")
            .build()
            .unwrap();
        let provider = auth.provider().unwrap();
        assert_eq!(provider.name(), "google");
        assert_eq!(provider.callback_path(), "/auth/google/callback");
    }

    #[test]
    fn test_error_response_status() {
        let response = error_response(&AuthError::protocol("no code in redirect URI"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(&AuthError::Timeout);
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_no_provider_no_session_is_denied() {
        let response = app(builder().build().unwrap())
            .oneshot(get_request("/whoami", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookie_headers(&response).is_empty());
        assert_eq!(body_text(response).await, ACCESS_DENIED_HTML);
    }

    #[tokio::test]
    async fn test_valid_session_dispatches_and_reissues() {
        let auth = builder().build().unwrap();
        let token = auth.sessions().sign(&test_user(), Utc::now()).unwrap();
        let cookie = format!("omniauth_token={}", token.expose());

        let response = app(auth)
            .oneshot(get_request("/whoami", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookie_headers(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("omniauth_token="));
        assert_eq!(body_text(response).await, "google:42");
    }

    #[tokio::test]
    async fn test_invalid_session_is_rejected_and_cleared() {
        let response = app(builder().provider(Arc::new(StubProvider)).build().unwrap())
            .oneshot(get_request("/whoami", Some("omniauth_token=garbage")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cookies = set_cookie_headers(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("omniauth_token=;"));
        assert!(cookies[0].contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_provider_redirect_is_returned_as_is() {
        let response = app(builder().provider(Arc::new(StubProvider)).build().unwrap())
            .oneshot(get_request("/whoami", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "https://idp.example.com/auth");
        let cookies = set_cookie_headers(&response);
        assert!(cookies[0].starts_with("omniauth_callback=/whoami;"));
    }

    #[tokio::test]
    async fn test_callback_with_marker_redirects_back() {
        let response = app(builder().provider(Arc::new(StubProvider)).build().unwrap())
            .oneshot(get_request("/callback", Some("omniauth_callback=/whoami")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/whoami");
        let cookies = set_cookie_headers(&response);
        assert!(
            cookies
                .iter()
                .any(|c| c.starts_with("omniauth_token=") && !c.starts_with("omniauth_token=;"))
        );
        assert!(
            cookies
                .iter()
                .any(|c| c.starts_with("omniauth_callback=;") && c.contains("Max-Age=0"))
        );
    }

    #[tokio::test]
    async fn test_provider_timeout() {
        let auth = builder()
            .provider(Arc::new(StalledProvider))
            .provider_timeout(Duration::from_millis(20))
            .build()
            .unwrap();

        let response = app(auth)
            .oneshot(get_request("/whoami", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_extractor_rejects_without_middleware() {
        async fn whoami(AuthenticatedUser(user): AuthenticatedUser) -> String {
            user.subject()
        }

        let response = Router::new()
            .route("/whoami", get(whoami))
            .oneshot(get_request("/whoami", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
