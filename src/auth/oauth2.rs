/// Authorization-Code Client
///
/// Speaks the three requests of the OAuth2 authorization-code flow: the
/// browser redirect to the authorization endpoint, the server-side code
/// exchange, and the optional userinfo lookup. Endpoints are passed in by the
/// provider adapter so one client works for any provider.
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::AuthError;
use super::types::{AccessToken, AuthorizationCode, ClientId, ClientSecret, IdToken, Uri};

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResult {
    pub access_token: AccessToken,

    /// Returned by some providers; never used by the middleware
    #[serde(default)]
    pub refresh_token: Option<AccessToken>,

    /// Absent for plain OAuth2 providers
    #[serde(default)]
    pub id_token: Option<IdToken>,

    #[serde(default)]
    pub expires_in: Option<i64>,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub token_type: Option<String>,
}

/// Form body of the code exchange request
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
}

/// OAuth2 client bound to one set of client credentials
#[derive(Debug, Clone)]
pub struct AuthorizationCodeClient {
    client_id: ClientId,
    client_secret: ClientSecret,
    callback_uri: Uri,
    http_client: reqwest::Client,
}

impl AuthorizationCodeClient {
    pub fn new(client_id: ClientId, client_secret: ClientSecret, callback_uri: Uri) -> Self {
        Self::with_http_client(client_id, client_secret, callback_uri, reqwest::Client::new())
    }

    pub fn with_http_client(
        client_id: ClientId,
        client_secret: ClientSecret,
        callback_uri: Uri,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            callback_uri,
            http_client,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn callback_uri(&self) -> &Uri {
        &self.callback_uri
    }

    /// Build the URL the browser is sent to in order to log in
    pub fn authorization_url(&self, endpoint: &Uri, scopes: &[String]) -> url::Url {
        let mut url = endpoint.as_url().clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.client_id.as_str())
            .append_pair("redirect_uri", self.callback_uri.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", &scopes.join(" "));
        url
    }

    /// Exchange an authorization code for tokens at the token endpoint
    pub async fn exchange_code(
        &self,
        endpoint: &Uri,
        code: &AuthorizationCode,
    ) -> Result<ExchangeResult, AuthError> {
        let request = TokenRequest {
            grant_type: "authorization_code",
            code: code.expose(),
            client_id: self.client_id.as_str(),
            client_secret: self.client_secret.expose(),
            redirect_uri: self.callback_uri.as_str(),
        };

        debug!(endpoint = %endpoint, code = ?code, "exchanging authorization code");

        let response = self
            .http_client
            .post(endpoint.as_str())
            .form(&request)
            .send()
            .await?;

        read_json(response, "can not read token").await
    }

    /// Fetch the userinfo document with the access token as bearer credential
    pub async fn fetch_user_info<T: DeserializeOwned>(
        &self,
        endpoint: &Uri,
        access_token: &AccessToken,
    ) -> Result<T, AuthError> {
        let response = self
            .http_client
            .get(endpoint.as_str())
            .bearer_auth(access_token.expose())
            .send()
            .await?;

        read_json(response, "can not read user info").await
    }
}

/// Decode a 200 response body, turning anything else into a protocol error
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    reason: &str,
) -> Result<T, AuthError> {
    let status = response.status();
    let body = response.text().await?;

    if status != StatusCode::OK {
        warn!(status = status.as_u16(), body = %body, "{}", reason);
        return Err(AuthError::provider_response(reason, status.as_u16(), body));
    }

    serde_json::from_str(&body).map_err(|e| {
        warn!(status = status.as_u16(), error = %e, "{}: undecodable body", reason);
        AuthError::provider_response(format!("{}: {}", reason, e), status.as_u16(), body)
    })
}
