//! Funding provider trait and the error taxonomy surfaced to callers.
//!
//! This module defines the adapter contract (`FundingProvider`) that each
//! sponsorship platform implements, and the structured `FundingError` every
//! pipeline stage returns.
//!
//! # Error kinds
//!
//! | Kind | Raised when | Retried |
//! |------|-------------|---------|
//! | [`InvalidUsername`](FundingErrorKind::InvalidUsername) | handle fails platform grammar | no |
//! | [`CredentialRequired`](FundingErrorKind::CredentialRequired) | adapter called without a token | no |
//! | [`NotAuthorized`](FundingErrorKind::NotAuthorized) | no stored token for the handle | no |
//! | [`UserNotFound`](FundingErrorKind::UserNotFound) | upstream reports account absent | no |
//! | [`AccessDenied`](FundingErrorKind::AccessDenied) | account exists, sponsorships hidden | no |
//! | [`RateLimitExceeded`](FundingErrorKind::RateLimitExceeded) | upstream forbids on quota | no |
//! | [`UnsupportedPlatform`](FundingErrorKind::UnsupportedPlatform) | platform not registered | no |
//! | [`MaxRetriesExceeded`](FundingErrorKind::MaxRetriesExceeded) | retry budget exhausted | - |
//! | [`Unavailable`](FundingErrorKind::Unavailable) | transient transport/5xx failure | yes |
//! | [`MalformedResponse`](FundingErrorKind::MalformedResponse) | upstream body unparsable | no |
//! | [`Timeout`](FundingErrorKind::Timeout) | fetch exceeded its deadline | no |
//! | [`CredentialStore`](FundingErrorKind::CredentialStore) | token storage failed | no |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{AccessToken, FundingRecord, Platform, RateLimitInfo};

/// Classification of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FundingErrorKind {
    InvalidUsername,
    CredentialRequired,
    NotAuthorized,
    UserNotFound,
    AccessDenied,
    RateLimitExceeded,
    UnsupportedPlatform,
    MaxRetriesExceeded,
    Unavailable,
    MalformedResponse,
    Timeout,
    CredentialStore,
    Internal,
}

/// Structured funding pipeline error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingError {
    kind: FundingErrorKind,
    message: String,
    retryable: bool,
}

impl FundingError {
    fn new(kind: FundingErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn invalid_username(platform: Platform, username: &str) -> Self {
        Self::new(
            FundingErrorKind::InvalidUsername,
            format!("invalid {platform} username: '{username}'"),
            false,
        )
    }

    pub fn credential_required(message: impl Into<String>) -> Self {
        Self::new(FundingErrorKind::CredentialRequired, message, false)
    }

    pub fn not_authorized(username: &str) -> Self {
        Self::new(
            FundingErrorKind::NotAuthorized,
            format!(
                "user '{username}' has not authorized this service; visit /auth/github to connect the account"
            ),
            false,
        )
    }

    pub fn user_not_found(username: &str) -> Self {
        Self::new(
            FundingErrorKind::UserNotFound,
            format!("user not found: '{username}'"),
            false,
        )
    }

    pub fn access_denied(username: &str) -> Self {
        Self::new(
            FundingErrorKind::AccessDenied,
            format!(
                "cannot access sponsor data for '{username}'; the token does not have permission to view this account's sponsors"
            ),
            false,
        )
    }

    pub fn rate_limit_exceeded(message: impl Into<String>) -> Self {
        Self::new(FundingErrorKind::RateLimitExceeded, message, false)
    }

    pub fn unsupported_platform(platform: &str) -> Self {
        Self::new(
            FundingErrorKind::UnsupportedPlatform,
            format!("unsupported platform: '{platform}'"),
            false,
        )
    }

    /// Wraps the final failure of an exhausted retry loop.
    pub fn max_retries_exceeded(attempts: u32, last: &FundingError) -> Self {
        Self::new(
            FundingErrorKind::MaxRetriesExceeded,
            format!("gave up after {attempts} attempts: {}", last.message),
            false,
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FundingErrorKind::Unavailable, message, true)
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(FundingErrorKind::MalformedResponse, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FundingErrorKind::Timeout, message, false)
    }

    pub fn credential_store(message: impl Into<String>) -> Self {
        Self::new(FundingErrorKind::CredentialStore, message, false)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FundingErrorKind::Internal, message, false)
    }

    pub const fn kind(&self) -> FundingErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FundingErrorKind::InvalidUsername => "funding.invalid_username",
            FundingErrorKind::CredentialRequired => "funding.credential_required",
            FundingErrorKind::NotAuthorized => "funding.not_authorized",
            FundingErrorKind::UserNotFound => "funding.user_not_found",
            FundingErrorKind::AccessDenied => "funding.access_denied",
            FundingErrorKind::RateLimitExceeded => "funding.rate_limit_exceeded",
            FundingErrorKind::UnsupportedPlatform => "funding.unsupported_platform",
            FundingErrorKind::MaxRetriesExceeded => "funding.max_retries_exceeded",
            FundingErrorKind::Unavailable => "funding.unavailable",
            FundingErrorKind::MalformedResponse => "funding.malformed_response",
            FundingErrorKind::Timeout => "funding.timeout",
            FundingErrorKind::CredentialStore => "funding.credential_store",
            FundingErrorKind::Internal => "funding.internal",
        }
    }
}

impl Display for FundingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FundingError {}

/// Sponsorship platform adapter contract.
///
/// One implementation exists per [`Platform`]; the orchestrator reaches them
/// through a [`ProviderRegistry`](crate::ProviderRegistry).
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single adapter instance serves
/// every request.
pub trait FundingProvider: Send + Sync {
    /// Returns the platform this adapter serves.
    fn platform(&self) -> Platform;

    /// Checks a handle against the platform's username grammar.
    fn validate_username(&self, username: &str) -> bool;

    /// Fetches and normalizes the funding figure for `username`.
    ///
    /// # Errors
    ///
    /// Returns [`FundingError`] if:
    /// - `username` fails [`validate_username`](FundingProvider::validate_username)
    /// - `credential` is absent
    /// - the account is missing or its sponsorships are hidden from the token
    /// - the upstream quota is exhausted, or transient failures outlast the retry budget
    fn fetch_funding<'a>(
        &'a self,
        username: &'a str,
        credential: Option<&'a AccessToken>,
    ) -> Pin<Box<dyn Future<Output = Result<FundingRecord, FundingError>> + Send + 'a>>;

    /// Queries the remaining upstream quota using the service-level credential.
    fn fetch_quota<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<RateLimitInfo, FundingError>> + Send + 'a>>;
}
