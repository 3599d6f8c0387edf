//! Funding data orchestration: cache, credential lookup, remote fetch and
//! adaptive cache lifetime.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{funding_cache_key, CacheService};
use crate::credentials::CredentialStore;
use crate::provider::FundingError;
use crate::registry::ProviderRegistry;
use crate::{FundingRecord, Platform, RateLimitInfo};

/// Cache lifetime selection for freshly fetched records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub default_ttl: Duration,
    /// Used while the upstream quota sits below `low_quota_threshold`.
    pub max_ttl: Duration,
    pub low_quota_threshold: u32,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_ttl: Duration::from_secs(3600),
            low_quota_threshold: 100,
        }
    }
}

impl TtlPolicy {
    pub fn new(default_ttl: Duration, max_ttl: Duration) -> Self {
        Self {
            default_ttl,
            max_ttl,
            ..Self::default()
        }
    }

    /// `max_ttl` when `quota` is known and low, otherwise `default_ttl`.
    pub fn ttl_for(&self, quota: Option<&RateLimitInfo>) -> Duration {
        match quota {
            Some(quota) if quota.is_below(self.low_quota_threshold) => self.max_ttl,
            _ => self.default_ttl,
        }
    }
}

/// Turns `(platform, username)` into a funding record, from cache when
/// possible.
#[derive(Clone)]
pub struct FundingDataService {
    registry: ProviderRegistry,
    cache: CacheService,
    credentials: Arc<dyn CredentialStore>,
    ttl_policy: TtlPolicy,
    fetch_timeout: Option<Duration>,
}

impl FundingDataService {
    pub fn new(
        registry: ProviderRegistry,
        cache: CacheService,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            registry,
            cache,
            credentials,
            ttl_policy: TtlPolicy::default(),
            fetch_timeout: None,
        }
    }

    pub fn with_ttl_policy(mut self, ttl_policy: TtlPolicy) -> Self {
        self.ttl_policy = ttl_policy;
        self
    }

    /// Bounds the remote fetch. `None` leaves it to the transport timeout.
    pub fn with_fetch_timeout(mut self, fetch_timeout: Option<Duration>) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub const fn ttl_policy(&self) -> TtlPolicy {
        self.ttl_policy
    }

    pub fn supported_platforms(&self) -> Vec<Platform> {
        self.registry.platforms()
    }

    /// Returns the funding record for `username` on `platform`.
    ///
    /// With `bypass_cache` the cache is not read but the fresh record is
    /// still written.
    ///
    /// # Errors
    ///
    /// - `UnsupportedPlatform` before any cache or credential access
    /// - `InvalidUsername` when the handle fails the platform grammar
    /// - `NotAuthorized` when no token is stored for `username`
    /// - `Timeout` when a configured fetch timeout elapses
    /// - any provider or credential store error, unchanged
    pub async fn get_funding_data(
        &self,
        platform: &str,
        username: &str,
        bypass_cache: bool,
    ) -> Result<FundingRecord, FundingError> {
        let provider = platform
            .parse::<Platform>()
            .ok()
            .and_then(|platform| self.registry.get(platform))
            .ok_or_else(|| FundingError::unsupported_platform(platform))?;
        let platform = provider.platform();

        if !provider.validate_username(username) {
            return Err(FundingError::invalid_username(platform, username));
        }

        let key = funding_cache_key(platform, username);

        if !bypass_cache {
            if let Some(record) = self.cache.get::<FundingRecord>(&key).await {
                tracing::debug!(%platform, username, "funding cache hit");
                return Ok(record);
            }
        }

        tracing::debug!(%platform, username, bypass_cache, "fetching funding data from provider");

        let Some(credential) = self.credentials.get_credential(username).await? else {
            return Err(FundingError::not_authorized(username));
        };

        let fetch = provider.fetch_funding(username, Some(&credential));
        let fetched = match self.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => Err(FundingError::timeout(format!(
                    "fetching funding data for '{username}' exceeded {}ms",
                    limit.as_millis()
                ))),
            },
            None => fetch.await,
        };
        let record = fetched.map_err(|error| {
            tracing::error!(%platform, username, error = %error, "failed to fetch funding data");
            error
        })?;

        let quota = match provider.fetch_quota().await {
            Ok(quota) => Some(quota),
            Err(error) => {
                tracing::warn!(error = %error, "failed to get rate limit info, using default ttl");
                None
            }
        };
        let ttl = self.ttl_policy.ttl_for(quota.as_ref());
        if let Some(quota) = quota.filter(|quota| quota.is_below(self.ttl_policy.low_quota_threshold)) {
            tracing::warn!(
                %platform,
                remaining = quota.remaining,
                ttl_secs = ttl.as_secs(),
                "low rate limit, extending cache ttl"
            );
        }

        if let Err(error) = self.cache.set(&key, &record, Some(ttl)).await {
            tracing::error!(key = %key, error = %error, "failed to cache funding data");
        }

        Ok(record)
    }
}

impl std::fmt::Debug for FundingDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FundingDataService")
            .field("registry", &self.registry)
            .field("ttl_policy", &self.ttl_policy)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}
