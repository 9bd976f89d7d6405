//! # Request Throttling
//!
//! One process-wide limiter guards the whole API surface; there is no
//! per-client keying. `URLDEX_RATE_LIMIT` sets the sustained
//! requests-per-second budget; `0` disables throttling entirely.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

const RATE_LIMIT_ENV: &str = "URLDEX_RATE_LIMIT";
const DEFAULT_RATE_LIMIT: u32 = 100;

/// Process-wide request limiter shared by every route.
pub type ApiThrottle = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Resolve the throttle budget from the environment and build the limiter.
///
/// Unset or unparseable values fall back to the default budget; `None`
/// means throttling is switched off.
#[must_use]
pub fn throttle_from_env() -> Option<ApiThrottle> {
    let budget = std::env::var(RATE_LIMIT_ENV)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT);
    build_throttle(budget)
}

/// Build a limiter for the given sustained rate. Zero disables.
#[must_use]
pub fn build_throttle(requests_per_second: u32) -> Option<ApiThrottle> {
    let rps = NonZeroU32::new(requests_per_second)?;
    Some(Arc::new(RateLimiter::direct(Quota::per_second(rps))))
}

/// Reject requests beyond the sustained budget with 429.
pub async fn throttle_middleware(
    State(throttle): State<ApiThrottle>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if throttle.check().is_err() {
        tracing::warn!("request rejected: rate limit exceeded");
        return Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"));
    }
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_disables_throttling() {
        assert!(build_throttle(0).is_none());
    }

    #[test]
    fn budget_exhausts_after_burst() {
        let throttle = build_throttle(2).expect("limiter");
        assert!(throttle.check().is_ok());
        assert!(throttle.check().is_ok());
        assert!(throttle.check().is_err());
    }
}
