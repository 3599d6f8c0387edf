//! GitHub OAuth web flow used to link an account and obtain its token.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::AccessToken;

pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_USER_URL: &str = "https://api.github.com/user";

/// Scopes requested from the user.
pub const OAUTH_SCOPE: &str = "read:user read:org";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("github oauth transport error: {0}")]
    Transport(String),

    #[error("github oauth endpoint returned status {status}")]
    Status { status: u16 },

    #[error("github rejected the authorization code: {0}")]
    Rejected(String),

    #[error("no access token in github response")]
    MissingToken,

    #[error("github oauth response could not be parsed: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// OAuth app registration.
#[derive(Debug, Clone)]
pub struct OAuthAppCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub callback_url: String,
}

/// Token issued by the code exchange.
#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub access_token: AccessToken,
    pub token_type: String,
    pub scope: String,
}

/// Profile of the account that granted the token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GithubUser {
    pub login: String,
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Clone)]
pub struct GithubOAuthClient {
    http_client: Arc<dyn HttpClient>,
    app: OAuthAppCredentials,
    authorize_url: String,
    token_url: String,
    user_url: String,
    timeout_ms: u64,
}

impl GithubOAuthClient {
    pub fn new(http_client: Arc<dyn HttpClient>, app: OAuthAppCredentials) -> Self {
        Self {
            http_client,
            app,
            authorize_url: String::from(GITHUB_AUTHORIZE_URL),
            token_url: String::from(GITHUB_TOKEN_URL),
            user_url: String::from(GITHUB_USER_URL),
            timeout_ms: 10_000,
        }
    }

    /// Points the token and user calls at another host.
    pub fn with_endpoints(mut self, token_url: impl Into<String>, user_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.user_url = user_url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// URL the user is redirected to; `state` comes back on the callback.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}&allow_signup=true",
            self.authorize_url,
            urlencoding::encode(&self.app.client_id),
            urlencoding::encode(&self.app.callback_url),
            urlencoding::encode(OAUTH_SCOPE),
            urlencoding::encode(state),
        )
    }

    /// Exchanges the callback `code` for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken, OAuthError> {
        let body = json!({
            "client_id": self.app.client_id,
            "client_secret": self.app.client_secret.expose_secret(),
            "code": code,
        });
        let request = HttpRequest::post(&self.token_url)
            .with_json_body(&body)
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| OAuthError::Transport(error.to_string()))?;
        if !response.is_success() {
            tracing::error!(status = response.status, "failed to exchange code for token");
            return Err(OAuthError::Status {
                status: response.status,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body)?;
        if let Some(error) = parsed.error {
            let detail = parsed.error_description.unwrap_or(error);
            return Err(OAuthError::Rejected(detail));
        }
        let access_token = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(OAuthError::MissingToken)?;

        Ok(OAuthToken {
            access_token: AccessToken::new(access_token),
            token_type: parsed.token_type,
            scope: parsed.scope,
        })
    }

    /// Reads the profile of the token owner.
    pub async fn user_info(&self, token: &AccessToken) -> Result<GithubUser, OAuthError> {
        let request = HttpRequest::get(&self.user_url)
            .with_header("accept", "application/json")
            .with_auth(&HttpAuth::BearerToken(token.clone()))
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| OAuthError::Transport(error.to_string()))?;
        if !response.is_success() {
            tracing::error!(status = response.status, "failed to fetch github user info");
            return Err(OAuthError::Status {
                status: response.status,
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }
}

impl std::fmt::Debug for GithubOAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubOAuthClient")
            .field("client_id", &self.app.client_id)
            .field("callback_url", &self.app.callback_url)
            .finish_non_exhaustive()
    }
}
