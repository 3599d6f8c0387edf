//! # fundbadge core
//!
//! Funding-data retrieval and caching for README funding badges.
//!
//! ## Overview
//!
//! A `(platform, username)` pair goes in, a [`FundingRecord`] comes out:
//!
//! ```text
//! FundingDataService::get_funding_data
//!   ├── ProviderRegistry      platform -> dyn FundingProvider
//!   ├── CacheService          "funding:{platform}:{username}" -> JSON record
//!   ├── dyn CredentialStore   username -> AccessToken (TokenVault in production)
//!   └── GithubSponsorsAdapter GraphQL fetch with bounded retry
//!         └── dyn HttpClient  (reqwest)
//! ```
//!
//! The cache lifetime of a fresh record follows the upstream quota: when
//! fewer than 100 requests remain the record is kept for `max_ttl` instead of
//! `default_ttl`.
//!
//! ## Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `default` | In-memory cache only |
//! | `redis` | Adds [`cache::RedisCache`] |
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | GitHub Sponsors adapter |
//! | [`cache`] | Cache backends and the JSON cache service |
//! | [`config`] | Environment configuration |
//! | [`credentials`] | Per-user token lookup |
//! | [`domain`] | Funding record, quota and credential types |
//! | [`error`] | Validation errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`oauth`] | GitHub OAuth web flow |
//! | [`provider`] | Provider trait and error taxonomy |
//! | [`registry`] | Platform to provider lookup |
//! | [`retry`] | Backoff policy and injected sleeper |
//! | [`service`] | Funding data orchestrator |
//!
//! ## Error Handling
//!
//! ```rust
//! use fundbadge_core::{FundingError, FundingErrorKind};
//!
//! fn badge_label(error: &FundingError) -> &'static str {
//!     match error.kind() {
//!         FundingErrorKind::NotAuthorized => "Not Authorized - Connect GitHub",
//!         FundingErrorKind::UserNotFound => "User Not Found",
//!         FundingErrorKind::RateLimitExceeded => "Rate Limited",
//!         _ => "Error",
//!     }
//! }
//!
//! assert_eq!(badge_label(&FundingError::user_not_found("ghost")), "User Not Found");
//! ```
//!
//! ## Security
//!
//! - Access tokens are wrapped in [`AccessToken`] and redacted from `Debug`
//! - Tokens are never written to logs

pub mod adapters;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod oauth;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod service;

// Adapter implementations
pub use adapters::{
    validate_github_username, GithubSponsorsAdapter, SponsorshipPayload, SponsorshipTotals,
};

// Caching
pub use cache::{funding_cache_key, CacheBackend, CacheError, CacheMetrics, CacheService, InMemoryCache};

// Configuration
pub use config::{AppConfig, ConfigError, Environment};

// Credentials
pub use credentials::{CredentialStore, InMemoryCredentialStore};

// Domain models
pub use domain::{
    validate_currency_code, AccessToken, FundingBreakdown, FundingRecord, Platform,
    RateLimitInfo, TierCount, UtcDateTime,
};

// Error types
pub use error::ValidationError;

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// OAuth
pub use oauth::{GithubOAuthClient, GithubUser, OAuthAppCredentials, OAuthError, OAuthToken};

// Provider contract
pub use provider::{FundingError, FundingErrorKind, FundingProvider};
pub use registry::ProviderRegistry;

// Retry logic
pub use retry::{Backoff, RetryConfig, Sleeper, TokioSleeper};

// Orchestration
pub use service::{FundingDataService, TtlPolicy};
