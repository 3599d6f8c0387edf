//! Raw upstream totals for troubleshooting. Hidden in production.

use axum::extract::{Path, State};
use axum::http::header::CACHE_CONTROL;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use fundbadge_core::{FundingError, RateLimitInfo};
use serde::Serialize;

use crate::{AppState, WebError};

pub fn routes() -> Router<AppState> {
    Router::new().route("/debug/github/:username", get(github_totals))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubTotals {
    pub username: String,
    pub total_recurring_monthly_price_in_cents: u64,
    pub total_count: u32,
    pub rate_limit: RateLimitInfo,
}

/// Reads the totals with the service token, bypassing cache and vault.
async fn github_totals(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    if state.environment.is_production() {
        return Err(WebError::NotFound);
    }

    let payload = state
        .adapter
        .fetch_sponsorship_data(&username, state.adapter.admin_token())
        .await?;
    if !payload.user_found {
        return Err(FundingError::user_not_found(&username).into());
    }
    let Some(totals) = payload.sponsorships else {
        return Err(FundingError::access_denied(&username).into());
    };

    Ok((
        [(CACHE_CONTROL, "no-store")],
        Json(GithubTotals {
            username,
            total_recurring_monthly_price_in_cents: totals.total_recurring_monthly_price_in_cents,
            total_count: totals.total_count,
            rate_limit: payload.rate_limit,
        }),
    ))
}
