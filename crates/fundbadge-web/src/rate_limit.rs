//! Per-client inbound rate limiting.
//!
//! Clients are keyed by the first `x-forwarded-for` address, falling back to
//! the socket peer. Loopback clients are never limited.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fundbadge_core::config::RateLimitConfig;
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use serde_json::json;

type KeyedRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Stale client entries are dropped every this many requests.
const RETAIN_INTERVAL: u64 = 1_000;

#[derive(Clone)]
pub struct InboundRateLimit {
    limiter: Arc<KeyedRateLimiter>,
    clock: DefaultClock,
    max_requests: u32,
    checked: Arc<AtomicU64>,
}

impl InboundRateLimit {
    pub fn new(config: RateLimitConfig) -> Self {
        let max_requests = config.max_requests.max(1);
        let clock = DefaultClock::default();
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota_from_window(
                config.window,
                max_requests,
            ))),
            clock,
            max_requests,
            checked: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns how long `ip` must wait when it is over budget.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        if ip.is_loopback() {
            return Ok(());
        }

        let count = self.checked.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % RETAIN_INTERVAL == 0 {
            self.limiter.retain_recent();
        }

        self.limiter
            .check_key(&ip)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }
}

impl std::fmt::Debug for InboundRateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundRateLimit")
            .field("max_requests", &self.max_requests)
            .finish_non_exhaustive()
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    let period = Duration::from_secs_f64((window.as_secs_f64() / f64::from(limit)).max(0.001));

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| peer.map(|peer| peer.ip()))
}

/// Middleware enforcing [`InboundRateLimit`].
pub async fn enforce(
    State(limit): State<InboundRateLimit>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let limit_header = HeaderValue::from(limit.max_requests());

    if let Some(ip) = client_ip(request.headers(), peer) {
        if let Err(wait) = limit.check(ip) {
            let retry_after = wait.as_secs().max(1);
            tracing::warn!(client = %ip, retry_after, "inbound rate limit exceeded");

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "statusCode": 429,
                    "error": "Too Many Requests",
                    "message": format!("Rate limit exceeded, retry in {retry_after} seconds"),
                })),
            )
                .into_response();
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", limit_header);
            headers.insert("retry-after", HeaderValue::from(retry_after));
            return response;
        }
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert("x-ratelimit-limit", limit_header);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(max_requests: u32) -> InboundRateLimit {
        InboundRateLimit::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        })
    }

    #[test]
    fn rejects_after_budget_is_spent() {
        let limit = limit(2);
        let client: IpAddr = "203.0.113.7".parse().expect("ip");

        assert!(limit.check(client).is_ok());
        assert!(limit.check(client).is_ok());
        let wait = limit.check(client).expect_err("third request must be limited");
        assert!(wait > Duration::ZERO);

        let other: IpAddr = "203.0.113.8".parse().expect("ip");
        assert!(limit.check(other).is_ok());
    }

    #[test]
    fn loopback_is_exempt() {
        let limit = limit(1);
        let local: IpAddr = "127.0.0.1".parse().expect("ip");
        for _ in 0..10 {
            assert!(limit.check(local).is_ok());
        }
    }

    #[test]
    fn forwarded_address_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );
        let peer: SocketAddr = "10.0.0.1:4000".parse().expect("addr");

        assert_eq!(
            client_ip(&headers, Some(peer)),
            Some("198.51.100.4".parse().expect("ip"))
        );
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(peer)),
            Some(peer.ip())
        );
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
