//! Badge routes. Failures still answer 200 with an error badge so the image
//! renders wherever it is embedded.

use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use fundbadge_core::{FundingError, FundingErrorKind, Platform};
use serde::Deserialize;

use crate::badge::{etag, render_error_badge, render_funding_badge, BadgeOptions, BadgeStyle};
use crate::AppState;

const SVG_CONTENT_TYPE: &str = "image/svg+xml;charset=utf-8";
const LIVE_CACHE_CONTROL: &str = "public, max-age=300, s-maxage=300";
const DEMO_CACHE_CONTROL: &str = "public, max-age=3600, s-maxage=3600";
const MAX_AMOUNT: f64 = 1_000_000_000.0;
const MAX_LABEL_CHARS: usize = 50;
const DEMO_PROGRESS: f64 = 0.68;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sample/:goal", get(sample_badge))
        .route("/:platform/:username/:goal", get(funding_badge))
}

/// Raw query string values; checked by [`BadgeQuery::parse`].
#[derive(Debug, Default, Deserialize)]
pub struct BadgeQuery {
    style: Option<String>,
    label: Option<String>,
    color: Option<String>,
    refresh: Option<String>,
    demo: Option<String>,
    current: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct BadgeRequest {
    style: BadgeStyle,
    label: String,
    color: Option<String>,
    refresh: bool,
    demo: bool,
    current: Option<f64>,
}

impl BadgeQuery {
    fn parse(self) -> Result<BadgeRequest, String> {
        let style = match self.style.as_deref() {
            Some(raw) => raw.parse()?,
            None => BadgeStyle::default(),
        };

        let label = self.label.unwrap_or_else(|| String::from("Funding"));
        if label.chars().count() > MAX_LABEL_CHARS {
            return Err(format!("label must be at most {MAX_LABEL_CHARS} characters"));
        }

        let color = match self.color {
            Some(color) if color.len() == 6 && color.chars().all(|ch| ch.is_ascii_hexdigit()) => {
                Some(color)
            }
            Some(color) => return Err(format!("'{color}' is not a six digit hex colour")),
            None => None,
        };

        Ok(BadgeRequest {
            style,
            label,
            color,
            refresh: parse_flag("refresh", self.refresh.as_deref())?.unwrap_or(false),
            demo: parse_flag("demo", self.demo.as_deref())?.unwrap_or(false),
            current: self
                .current
                .as_deref()
                .map(|raw| parse_amount("current", raw))
                .transpose()?,
        })
    }
}

fn parse_flag(name: &str, raw: Option<&str>) -> Result<Option<bool>, String> {
    match raw {
        None => Ok(None),
        Some("true" | "1") => Ok(Some(true)),
        Some("false" | "0") => Ok(Some(false)),
        Some(other) => Err(format!("{name} must be true, false, 1 or 0, got '{other}'")),
    }
}

/// Amounts are positive and at most one billion.
fn parse_amount(name: &str, raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a number, got '{raw}'"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{name} must be greater than 0"));
    }
    if value > MAX_AMOUNT {
        return Err(format!("{name} is too large"));
    }
    Ok(value)
}

#[derive(Debug)]
enum BadgeFailure {
    Request(String),
    Funding(FundingError),
}

impl BadgeFailure {
    fn kind(&self) -> Option<FundingErrorKind> {
        match self {
            Self::Request(_) => None,
            Self::Funding(error) => Some(error.kind()),
        }
    }
}

impl std::fmt::Display for BadgeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(message) => f.write_str(message),
            Self::Funding(error) => write!(f, "{error}"),
        }
    }
}

/// Error badge text and cache lifetime in seconds for a failed lookup.
pub fn error_presentation(kind: Option<FundingErrorKind>) -> (&'static str, u32) {
    match kind {
        Some(FundingErrorKind::NotAuthorized) => ("Not Authorized - Connect GitHub", 300),
        Some(FundingErrorKind::AccessDenied) => ("Access Denied", 1800),
        Some(FundingErrorKind::UserNotFound) => ("User Not Found", 3600),
        Some(FundingErrorKind::InvalidUsername) => ("Invalid Username", 3600),
        Some(FundingErrorKind::RateLimitExceeded) => ("Rate Limited", 300),
        Some(FundingErrorKind::UnsupportedPlatform) => ("Invalid Platform", 3600),
        Some(FundingErrorKind::CredentialRequired) => ("Token Required", 300),
        _ => ("Error", 60),
    }
}

async fn funding_badge(
    State(state): State<AppState>,
    Path((platform, username, goal)): Path<(String, String, String)>,
    Query(query): Query<BadgeQuery>,
    headers: HeaderMap,
) -> Response {
    match resolve_badge(&state, &platform, &username, &goal, query).await {
        Ok((options, demo)) => {
            let cache_control = if demo {
                DEMO_CACHE_CONTROL
            } else {
                LIVE_CACHE_CONTROL
            };
            svg_response(render_funding_badge(&options), &headers, cache_control)
        }
        Err(failure) => {
            tracing::error!(
                platform = %platform,
                username = %username,
                error = %failure,
                "failed to generate badge"
            );
            error_badge_response(failure.kind())
        }
    }
}

async fn resolve_badge(
    state: &AppState,
    platform: &str,
    username: &str,
    goal: &str,
    query: BadgeQuery,
) -> Result<(BadgeOptions, bool), BadgeFailure> {
    let goal = parse_amount("goal", goal).map_err(BadgeFailure::Request)?;
    let request = query.parse().map_err(BadgeFailure::Request)?;

    let current = if request.demo {
        check_handle(state, platform, username).map_err(BadgeFailure::Funding)?;
        request.current.unwrap_or_else(|| (goal * DEMO_PROGRESS).round())
    } else {
        state
            .service
            .get_funding_data(platform, username, request.refresh)
            .await
            .map_err(BadgeFailure::Funding)?
            .current_amount
    };

    Ok((
        BadgeOptions {
            current,
            goal,
            label: request.label,
            style: request.style,
            color: request.color,
        },
        request.demo,
    ))
}

/// Demo badges skip the lookup but still reject handles the live path would.
fn check_handle(state: &AppState, platform: &str, username: &str) -> Result<(), FundingError> {
    let provider = platform
        .parse::<Platform>()
        .ok()
        .and_then(|parsed| state.service.registry().get(parsed))
        .ok_or_else(|| FundingError::unsupported_platform(platform))?;
    if !provider.validate_username(username) {
        return Err(FundingError::invalid_username(provider.platform(), username));
    }
    Ok(())
}

async fn sample_badge(
    Path(goal): Path<String>,
    Query(query): Query<BadgeQuery>,
    headers: HeaderMap,
) -> Response {
    let parsed = parse_amount("goal", &goal).and_then(|goal| Ok((goal, query.parse()?)));
    match parsed {
        Ok((goal, request)) => {
            let options = BadgeOptions {
                current: request
                    .current
                    .unwrap_or_else(|| (goal * DEMO_PROGRESS).round()),
                goal,
                label: request.label,
                style: request.style,
                color: request.color,
            };
            svg_response(render_funding_badge(&options), &headers, DEMO_CACHE_CONTROL)
        }
        Err(message) => {
            tracing::debug!(error = %message, "rejected sample badge request");
            error_badge_response(None)
        }
    }
}

fn svg_response(svg: String, request_headers: &HeaderMap, cache_control: &'static str) -> Response {
    let tag = etag(&svg);
    let not_modified = request_headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == tag);
    if not_modified {
        return (StatusCode::NOT_MODIFIED, [(ETAG, tag)]).into_response();
    }

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, String::from(SVG_CONTENT_TYPE)),
            (CACHE_CONTROL, String::from(cache_control)),
            (ETAG, tag),
            (X_CONTENT_TYPE_OPTIONS, String::from("nosniff")),
        ],
        svg,
    )
        .into_response()
}

fn error_badge_response(kind: Option<FundingErrorKind>) -> Response {
    let (message, max_age) = error_presentation(kind);
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, String::from(SVG_CONTENT_TYPE)),
            (CACHE_CONTROL, format!("public, max-age={max_age}")),
        ],
        render_error_badge(message),
    )
        .into_response()
}
