use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::provider::{FundingError, FundingProvider};
use crate::retry::{retry_with_backoff, RetryConfig, Sleeper, TokioSleeper};
use crate::{AccessToken, FundingBreakdown, FundingRecord, Platform, RateLimitInfo, UtcDateTime};

pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Remaining-quota level below which the adapter warns and the orchestrator
/// stretches cache lifetimes.
pub const LOW_QUOTA_THRESHOLD: u32 = 100;

const SPONSORS_QUERY: &str = r"
query GetSponsorsData($username: String!) {
  user(login: $username) {
    sponsorshipsAsMaintainer(first: 100, activeOnly: true) {
      totalRecurringMonthlyPriceInCents
      totalCount
    }
  }
  rateLimit {
    remaining
    limit
    resetAt
  }
}";

const RATE_LIMIT_QUERY: &str = "{ rateLimit { remaining limit resetAt } }";

/// Checks a GitHub login: 1-39 ASCII letters, digits or single hyphens,
/// neither starting nor ending with a hyphen.
pub fn validate_github_username(username: &str) -> bool {
    let bytes = username.as_bytes();
    if bytes.is_empty() || bytes.len() > 39 {
        return false;
    }
    if !bytes[0].is_ascii_alphanumeric() || bytes[bytes.len() - 1] == b'-' {
        return false;
    }

    bytes
        .iter()
        .all(|byte| byte.is_ascii_alphanumeric() || *byte == b'-')
        && !username.contains("--")
}

/// Sponsorship totals as GitHub reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipTotals {
    pub total_recurring_monthly_price_in_cents: u64,
    pub total_count: u32,
}

/// Raw result of one sponsorship query.
///
/// `sponsorships` is `None` when the login is unknown or the token may not
/// see that account's sponsors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipPayload {
    pub user_found: bool,
    pub sponsorships: Option<SponsorshipTotals>,
    pub rate_limit: RateLimitInfo,
}

/// GitHub Sponsors adapter.
///
/// Per-user reads go through [`fetch_sponsorship_data`](Self::fetch_sponsorship_data)
/// with the token the user linked. Quota checks use the service-level admin
/// token.
#[derive(Clone)]
pub struct GithubSponsorsAdapter {
    http_client: Arc<dyn HttpClient>,
    admin_token: Option<AccessToken>,
    endpoint: String,
    timeout_ms: u64,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
    last_quota: Arc<Mutex<Option<RateLimitInfo>>>,
}

impl Default for GithubSponsorsAdapter {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestHttpClient::default()))
    }
}

impl GithubSponsorsAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            admin_token: None,
            endpoint: String::from(GITHUB_GRAPHQL_URL),
            timeout_ms: 10_000,
            retry: RetryConfig::default(),
            sleeper: Arc::new(TokioSleeper),
            last_quota: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_admin_token(mut self, token: AccessToken) -> Self {
        self.admin_token = Some(token);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn admin_token(&self) -> Option<&AccessToken> {
        self.admin_token.as_ref()
    }

    /// Quota reported by the most recent successful sponsorship query.
    pub fn last_observed_quota(&self) -> Option<RateLimitInfo> {
        *self
            .last_quota
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queries sponsorship totals for `username`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// `InvalidUsername` and `CredentialRequired` are raised before any
    /// request. Not-found, rate-limit and unparsable responses fail on the
    /// first attempt; anything else is retried and ends in
    /// `MaxRetriesExceeded`.
    pub async fn fetch_sponsorship_data(
        &self,
        username: &str,
        credential: Option<&AccessToken>,
    ) -> Result<SponsorshipPayload, FundingError> {
        if !validate_github_username(username) {
            return Err(FundingError::invalid_username(Platform::Github, username));
        }
        let Some(token) = credential else {
            return Err(FundingError::credential_required(format!(
                "a GitHub token is required to read sponsorships for '{username}'"
            )));
        };

        tracing::debug!(username, "fetching github sponsors data");

        let payload = retry_with_backoff(&self.retry, self.sleeper.as_ref(), move |_| {
            self.query_sponsors(username, token)
        })
        .await?;

        self.observe_quota(payload.rate_limit);
        Ok(payload)
    }

    async fn query_sponsors(
        &self,
        username: &str,
        token: &AccessToken,
    ) -> Result<SponsorshipPayload, FundingError> {
        let body = json!({
            "query": SPONSORS_QUERY,
            "variables": { "username": username },
        });
        let response = self.post_graphql(&body, token, Some(username)).await?;
        let data: SponsorsData = decode_graphql(&response, Some(username))?;

        Ok(SponsorshipPayload {
            user_found: data.user.is_some(),
            sponsorships: data
                .user
                .and_then(|user| user.sponsorships_as_maintainer)
                .map(|totals| SponsorshipTotals {
                    total_recurring_monthly_price_in_cents: totals
                        .total_recurring_monthly_price_in_cents,
                    total_count: totals.total_count,
                }),
            rate_limit: data.rate_limit.into_info()?,
        })
    }

    async fn post_graphql(
        &self,
        body: &serde_json::Value,
        token: &AccessToken,
        username: Option<&str>,
    ) -> Result<HttpResponse, FundingError> {
        let request = HttpRequest::post(&self.endpoint)
            .with_json_body(body)
            .with_auth(&HttpAuth::BearerToken(token.clone()))
            .with_timeout_ms(self.timeout_ms);

        let response = self.http_client.execute(request).await.map_err(|error| {
            if error.retryable() {
                FundingError::unavailable(format!("github transport error: {error}"))
            } else {
                FundingError::internal(format!("github transport error: {error}"))
            }
        })?;

        if response.is_success() {
            return Ok(response);
        }

        Err(classify_failure(&response, username))
    }

    fn observe_quota(&self, quota: RateLimitInfo) {
        if quota.is_below(LOW_QUOTA_THRESHOLD) {
            tracing::warn!(
                remaining = quota.remaining,
                limit = quota.limit,
                reset = %quota.reset,
                "github api rate limit is low"
            );
        }

        *self
            .last_quota
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(quota);
    }
}

impl FundingProvider for GithubSponsorsAdapter {
    fn platform(&self) -> Platform {
        Platform::Github
    }

    fn validate_username(&self, username: &str) -> bool {
        validate_github_username(username)
    }

    fn fetch_funding<'a>(
        &'a self,
        username: &'a str,
        credential: Option<&'a AccessToken>,
    ) -> Pin<Box<dyn Future<Output = Result<FundingRecord, FundingError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = self.fetch_sponsorship_data(username, credential).await?;

            if !payload.user_found {
                return Err(FundingError::user_not_found(username));
            }
            let Some(totals) = payload.sponsorships else {
                return Err(FundingError::access_denied(username));
            };

            FundingRecord::from_cents(
                Platform::Github,
                username,
                totals.total_recurring_monthly_price_in_cents,
                "USD",
                true,
                Some(FundingBreakdown::sponsors(totals.total_count)),
            )
            .map_err(|error| FundingError::internal(error.to_string()))
        })
    }

    fn fetch_quota<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<RateLimitInfo, FundingError>> + Send + 'a>> {
        Box::pin(async move {
            let Some(token) = self.admin_token.as_ref() else {
                return Err(FundingError::credential_required(
                    "GitHub token is required for rate limit checks",
                ));
            };

            let body = json!({ "query": RATE_LIMIT_QUERY });
            let result = async {
                let response = self.post_graphql(&body, token, None).await?;
                let data: QuotaData = decode_graphql(&response, None)?;
                data.rate_limit.into_info()
            }
            .await;

            if let Err(error) = &result {
                tracing::error!(error = %error, "failed to fetch github rate limit");
            }
            result
        })
    }
}

fn classify_failure(response: &HttpResponse, username: Option<&str>) -> FundingError {
    match (response.status, username) {
        (404, Some(username)) => FundingError::user_not_found(username),
        (403 | 429, _) if indicates_rate_limit(response) => {
            FundingError::rate_limit_exceeded("GitHub API rate limit exceeded")
        }
        (status, _) => {
            tracing::error!(status, body = %truncate(&response.body), "github api query failed");
            FundingError::unavailable(format!("github graphql returned status {status}"))
        }
    }
}

fn indicates_rate_limit(response: &HttpResponse) -> bool {
    response.header("x-ratelimit-remaining") == Some("0")
        || response.body.to_ascii_lowercase().contains("rate limit")
}

fn decode_graphql<T>(response: &HttpResponse, username: Option<&str>) -> Result<T, FundingError>
where
    T: for<'de> Deserialize<'de>,
{
    let envelope: GraphqlEnvelope<T> = serde_json::from_str(&response.body).map_err(|error| {
        FundingError::malformed_response(format!("github response is not valid graphql json: {error}"))
    })?;

    let errors = envelope.errors.unwrap_or_default();
    if errors.iter().any(|error| error.is("RATE_LIMITED")) {
        return Err(FundingError::rate_limit_exceeded("GitHub API rate limit exceeded"));
    }
    if let (Some(username), true) = (username, errors.iter().any(|error| error.is("NOT_FOUND"))) {
        return Err(FundingError::user_not_found(username));
    }

    match envelope.data {
        Some(data) => Ok(data),
        None => {
            let message = errors
                .first()
                .map(|error| error.message.clone())
                .unwrap_or_else(|| String::from("response carried no data"));
            Err(FundingError::unavailable(format!("github graphql error: {message}")))
        }
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: String,
}

impl GraphqlError {
    fn is(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SponsorsData {
    user: Option<WireUser>,
    rate_limit: WireRateLimit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    sponsorships_as_maintainer: Option<WireSponsorships>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSponsorships {
    total_recurring_monthly_price_in_cents: u64,
    total_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotaData {
    rate_limit: WireRateLimit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRateLimit {
    remaining: u32,
    limit: u32,
    reset_at: UtcDateTime,
}

impl WireRateLimit {
    fn into_info(self) -> Result<RateLimitInfo, FundingError> {
        RateLimitInfo::new(self.remaining, self.limit, self.reset_at)
            .map_err(|error| FundingError::malformed_response(error.to_string()))
    }
}
