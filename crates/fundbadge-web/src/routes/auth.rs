//! GitHub account linking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fundbadge_vault::{NewUserToken, TokenVault, VaultError};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, WebError};

/// Goal used in the badge link handed out after linking.
const DEFAULT_GOAL: u32 = 5000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/github", get(start_authorization))
        .route("/auth/github/callback", get(authorization_callback))
        .route("/auth/revoke", post(revoke))
        .route("/auth/status/:username", get(status))
}

/// OAuth `state` values issued and not yet redeemed.
#[derive(Debug, Clone)]
pub struct PendingStates {
    issued: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl Default for PendingStates {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

impl PendingStates {
    pub fn new(ttl: Duration) -> Self {
        Self {
            issued: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub fn issue(&self) -> String {
        let state = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        issued.retain(|_, created| now.duration_since(*created) < self.ttl);
        issued.insert(state.clone(), now);
        state
    }

    /// Redeems `state` once. Unknown and expired values are rejected.
    pub fn consume(&self, state: &str) -> bool {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(state)
            .is_some_and(|created| created.elapsed() < self.ttl)
    }

    pub fn len(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn start_authorization(State(state): State<AppState>) -> Response {
    let issued = state.pending_states.issue();
    let url = state.oauth.authorization_url(&issued);
    (StatusCode::FOUND, [(LOCATION, url)]).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub linked: bool,
    pub username: String,
    pub badge_url: String,
}

async fn authorization_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Result<Json<LinkedAccount>, WebError> {
    let redeemed = query
        .state
        .as_deref()
        .is_some_and(|value| state.pending_states.consume(value));
    if !redeemed {
        return Err(WebError::BadRequest(String::from(
            "Invalid or expired state parameter",
        )));
    }
    let Some(code) = query.code.filter(|code| !code.is_empty()) else {
        return Err(WebError::BadRequest(String::from(
            "No authorization code provided",
        )));
    };

    let token = state.oauth.exchange_code(&code).await?;
    let user = state.oauth.user_info(&token.access_token).await?;

    let record = NewUserToken {
        username: user.login.clone(),
        github_user_id: user.id,
        access_token: SecretString::from(token.access_token.expose().to_owned()),
        scope: token.scope,
        expires_at: None,
    };
    run_blocking(state.vault.clone(), move |vault| vault.save_user_token(&record)).await?;
    tracing::info!(username = %user.login, "linked github account");

    let base = badge_base_url(state.public_base_url.as_deref(), &headers);
    Ok(Json(LinkedAccount {
        linked: true,
        badge_url: format!("{base}/badge/github/{}/{DEFAULT_GOAL}", user.login),
        username: user.login,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    #[serde(default)]
    username: Option<String>,
}

async fn revoke(
    State(state): State<AppState>,
    Json(request): Json<RevokeRequest>,
) -> Result<impl IntoResponse, WebError> {
    let Some(username) = request.username.filter(|name| !name.is_empty()) else {
        return Err(WebError::BadRequest(String::from("Username required")));
    };

    let removed = {
        let username = username.clone();
        run_blocking(state.vault.clone(), move |vault| {
            vault.delete_user_token(&username)
        })
        .await?
    };
    tracing::info!(username = %username, removed, "revoked github access");

    Ok(Json(serde_json::json!({
        "success": true,
        "removed": removed,
        "message": "Access revoked",
    })))
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub username: String,
    pub authorized: bool,
}

async fn status(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<AuthStatus>, WebError> {
    let authorized = {
        let username = username.clone();
        run_blocking(state.vault.clone(), move |vault| vault.has_token(&username)).await?
    };
    Ok(Json(AuthStatus {
        username,
        authorized,
    }))
}

async fn run_blocking<T, F>(vault: TokenVault, operation: F) -> Result<T, WebError>
where
    T: Send + 'static,
    F: FnOnce(&TokenVault) -> Result<T, VaultError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || operation(&vault))
        .await
        .map_err(|error| WebError::Internal(format!("vault task failed: {error}")))?
        .map_err(WebError::from)
}

/// Public origin of this server, from configuration or the proxy headers.
fn badge_base_url(configured: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = configured {
        return base.trim_end_matches('/').to_owned();
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    let proto = header("x-forwarded-proto").unwrap_or("http");
    let host = header("x-forwarded-host")
        .or_else(|| header("host"))
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}
