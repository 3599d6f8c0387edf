//! # fundbadge web
//!
//! axum server for funding badges and GitHub account linking.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /badge/:platform/:username/:goal` | [`routes::badge`] |
//! | `GET /badge/sample/:goal` | [`routes::badge`] |
//! | `GET /auth/github`, `GET /auth/github/callback` | [`routes::auth`] |
//! | `POST /auth/revoke`, `GET /auth/status/:username` | [`routes::auth`] |
//! | `GET /health`, `GET /ping` | [`routes::health`] |
//! | `GET /debug/github/:username` | [`routes::debug`] |

pub mod badge;
mod error;
pub mod rate_limit;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderValue, Method};
use axum::{middleware, Router};
use fundbadge_core::config::{AllowedOrigins, RateLimitConfig};
use fundbadge_core::{Environment, FundingDataService, GithubOAuthClient, GithubSponsorsAdapter};
use fundbadge_vault::TokenVault;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::WebError;
pub use rate_limit::InboundRateLimit;
pub use routes::auth::PendingStates;

/// Shared handler state, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub service: FundingDataService,
    pub adapter: Arc<GithubSponsorsAdapter>,
    pub vault: TokenVault,
    pub oauth: GithubOAuthClient,
    pub pending_states: PendingStates,
    pub environment: Environment,
    /// Base for badge links handed out after linking; derived from the
    /// request host when unset.
    pub public_base_url: Option<String>,
    pub started_at: Instant,
}

/// Layers applied around every route.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub allowed_origins: AllowedOrigins,
    pub rate_limit: RateLimitConfig,
}

pub fn build_router(state: AppState, settings: &HttpSettings) -> Router {
    let limiter = InboundRateLimit::new(settings.rate_limit);

    Router::new()
        .merge(routes::health::routes())
        .nest("/badge", routes::badge::routes())
        .merge(routes::auth::routes())
        .merge(routes::debug::routes())
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce))
        .layer(cors_layer(&settings.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::OPTIONS,
    ]);

    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "ignoring unparsable CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(values))
        }
    }
}
