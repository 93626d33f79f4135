#![allow(dead_code)]

/// Mock identity provider for integration tests
/// Serves the token and userinfo endpoints on a random local port.
use async_trait::async_trait;
use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use omniauth::auth::error::AuthError;
use omniauth::auth::providers::{GoogleProvider, ProviderConfig};
use omniauth::auth::types::IdToken;
use omniauth::auth::verifier::IdTokenVerifier;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};

pub const CALLBACK_URI: &str = "https://app.example.com/auth/callback";
pub const AUTH_ENDPOINT: &str = "https://accounts.example.com/o/oauth2/auth";

/// Codes the mock token endpoint understands
pub const CODE_WITH_ID_TOKEN: &str = "code-with-id-token";
pub const CODE_WITHOUT_ID_TOKEN: &str = "code-without-id-token";
pub const CODE_REJECTED: &str = "code-rejected";

const ACCESS_TOKEN: &str = "access-42";
const ID_TOKEN: &str = "id-token-42";

pub struct MockProvider {
    pub port: u16,
    exchanges: Arc<Mutex<Vec<HashMap<String, String>>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockProvider {
    /// Start a new mock provider on a random available port
    pub async fn start() -> anyhow::Result<Self> {
        let exchanges = Arc::new(Mutex::new(Vec::new()));

        let recorded = exchanges.clone();
        let app = Router::new()
            .route(
                "/token",
                post(move |Form(form): Form<HashMap<String, String>>| {
                    let recorded = recorded.clone();
                    async move {
                        recorded.lock().await.push(form.clone());
                        handle_token(form)
                    }
                }),
            )
            .route("/userinfo", get(handle_userinfo));

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Mock provider failed to start");
        });

        Ok(Self {
            port,
            exchanges,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// Form bodies received by the token endpoint, in order
    pub async fn exchanges(&self) -> Vec<HashMap<String, String>> {
        self.exchanges.lock().await.clone()
    }

    /// Google adapter pointed at this server
    pub fn google_provider(&self) -> GoogleProvider {
        let config = ProviderConfig::new(
            "test-client-id",
            "test-client-secret",
            CALLBACK_URI,
            AUTH_ENDPOINT,
            &self.url("/token"),
            &self.url("/userinfo"),
            vec!["openid".to_string(), "email".to_string()],
        )
        .expect("valid provider config");

        GoogleProvider::new(config, Arc::new(StubVerifier))
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn handle_token(form: HashMap<String, String>) -> Response {
    match form.get("code").map(String::as_str) {
        Some(CODE_WITH_ID_TOKEN) => Json(json!({
            "access_token": ACCESS_TOKEN,
            "id_token": ID_TOKEN,
            "expires_in": 3599,
            "token_type": "Bearer",
        }))
        .into_response(),
        Some(CODE_WITHOUT_ID_TOKEN) => Json(json!({
            "access_token": ACCESS_TOKEN,
            "token_type": "Bearer",
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response(),
    }
}

async fn handle_userinfo(headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", ACCESS_TOKEN));

    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(json!({
        "sub": "7",
        "name": "Userinfo User",
        "email": "userinfo@example.com",
        "email_verified": true,
    }))
    .into_response()
}

/// Accepts only the ID token the mock provider issues
pub struct StubVerifier;

#[async_trait]
impl IdTokenVerifier for StubVerifier {
    async fn verify(&self, id_token: &IdToken) -> Result<serde_json::Value, AuthError> {
        if id_token.expose() != ID_TOKEN {
            return Err(AuthError::IdTokenVerification("unknown token".to_string()));
        }

        Ok(json!({
            "iss": "https://accounts.example.com",
            "aud": "test-client-id",
            "sub": "42",
            "name": "Test User",
            "email": "a@b.com",
            "email_verified": true,
        }))
    }
}
