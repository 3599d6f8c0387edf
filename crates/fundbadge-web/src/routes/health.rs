use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use fundbadge_core::{CacheMetrics, FundingProvider, Platform, RateLimitInfo, UtcDateTime};
use serde::Serialize;

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ping", get(ping))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the server started.
    pub uptime: f64,
    pub services: ServiceHealth,
    pub cache: CacheMetrics,
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub cache: CacheHealth,
    pub github: GithubHealth,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub connected: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubHealth {
    pub accessible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
}

/// 200 when the cache answers and the GitHub quota can be read, else 503.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let cache_connected = state.service.cache().ping().await;
    let rate_limit = match state.adapter.fetch_quota().await {
        Ok(quota) => Some(quota),
        Err(error) => {
            tracing::warn!(error = %error, "github health check failed");
            None
        }
    };
    let healthy = cache_connected && rate_limit.is_some();

    let report = HealthReport {
        status: if healthy { "ok" } else { "degraded" },
        timestamp: UtcDateTime::now().format_rfc3339(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        services: ServiceHealth {
            cache: CacheHealth {
                connected: cache_connected,
            },
            github: GithubHealth {
                accessible: rate_limit.is_some(),
                rate_limit,
            },
        },
        cache: state.service.cache().metrics(),
        platforms: state.service.supported_platforms(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

#[derive(Debug, Serialize)]
pub struct Pong {
    pub pong: bool,
    pub timestamp: String,
}

async fn ping() -> Json<Pong> {
    Json(Pong {
        pong: true,
        timestamp: UtcDateTime::now().format_rfc3339(),
    })
}
