//! JSON error responses for the non-badge routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fundbadge_core::{FundingError, FundingErrorKind, OAuthError};
use fundbadge_vault::VaultError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("{0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Funding(#[from] FundingError),

    #[error("oauth authorization failed: {0}")]
    OAuth(#[from] OAuthError),

    #[error("token vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Funding(error) => funding_status(error.kind()),
            Self::OAuth(_) | Self::Vault(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text shown to the client. Vault and OAuth details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::NotFound => String::from("Not Found"),
            Self::Funding(error) => error.message().to_owned(),
            Self::OAuth(_) => String::from("OAuth authorization failed"),
            Self::Vault(_) | Self::Internal(_) => String::from("Internal Server Error"),
        }
    }
}

fn funding_status(kind: FundingErrorKind) -> StatusCode {
    match kind {
        FundingErrorKind::InvalidUsername | FundingErrorKind::UnsupportedPlatform => {
            StatusCode::BAD_REQUEST
        }
        FundingErrorKind::CredentialRequired | FundingErrorKind::NotAuthorized => {
            StatusCode::UNAUTHORIZED
        }
        FundingErrorKind::AccessDenied => StatusCode::FORBIDDEN,
        FundingErrorKind::UserNotFound => StatusCode::NOT_FOUND,
        FundingErrorKind::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        FundingErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FundingErrorKind::MaxRetriesExceeded
        | FundingErrorKind::Unavailable
        | FundingErrorKind::MalformedResponse => StatusCode::BAD_GATEWAY,
        FundingErrorKind::CredentialStore | FundingErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        let mut body = json!({ "error": self.public_message() });
        if let Self::Funding(error) = &self {
            body["code"] = json!(error.code());
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funding_kinds_map_to_http_statuses() {
        assert_eq!(
            WebError::from(FundingError::user_not_found("ghost")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebError::from(FundingError::not_authorized("octocat")).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebError::from(FundingError::rate_limit_exceeded("quota exhausted")).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            WebError::from(FundingError::unavailable("status 502")).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let error = WebError::Internal(String::from("duckdb file locked at /var/data"));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "Internal Server Error");
    }
}
