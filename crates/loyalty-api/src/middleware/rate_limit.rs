// ============================================================================
// Loyalty API - Claim Rate Limiting
// File: crates/loyalty-api/src/middleware/rate_limit.rs
// Description: Per-client request quota on the claim endpoints
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::error::ApiError;

/// Keys retained before stale entries are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

/// Keyed by peer address. Requests without a known peer share one bucket.
pub struct ClaimRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl ClaimRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self { limiter: RateLimiter::keyed(Quota::per_minute(rpm)) }
    }

    pub fn check(&self, client: IpAddr) -> bool {
        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }
        self.limiter.check_key(&client).is_ok()
    }
}

pub async fn limit_claims(
    State(limiter): State<Arc<ClaimRateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.check(client) {
        tracing::warn!("Claim rate limit exceeded for {}", client);
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(request).await)
}
