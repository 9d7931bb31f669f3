//! Governor-based rate limiting, keyed by API key.
//!
//! Applied to the conversion endpoint only. Runs after authentication and
//! uses the [`ApiKey`] it stored; requests without one share a single
//! bucket.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use crate::context::AppContext;
use crate::middleware::auth::ApiKey;
use crate::middleware::reject;

/// A shared per-key rate limiter.
pub type KeyedLimiter = Arc<RateLimiter<ApiKey, DefaultKeyedStateStore<ApiKey>, DefaultClock>>;

/// Create a limiter allowing `requests_per_minute` per key. `0` disables
/// limiting.
pub fn create_keyed_limiter(requests_per_minute: u32) -> Option<KeyedLimiter> {
    let per_minute = NonZeroU32::new(requests_per_minute)?;
    Some(Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))))
}

/// Returns 429 Too Many Requests when the caller's quota is spent.
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(limiter) = &ctx.limiter {
        let key = request
            .extensions()
            .get::<ApiKey>()
            .cloned()
            .unwrap_or_else(ApiKey::anonymous);
        if limiter.check_key(&key).is_err() {
            crate::metrics::record_rejected("rate_limited");
            return reject(
                &request,
                nb_core::Error::RateLimited("too many conversion requests for this API key".into()),
            );
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_disables_limiting() {
        assert!(create_keyed_limiter(0).is_none());
    }

    #[test]
    fn keys_have_separate_buckets() {
        let limiter = create_keyed_limiter(1).unwrap();
        let a = ApiKey("a".into());
        let b = ApiKey("b".into());
        assert!(limiter.check_key(&a).is_ok());
        assert!(limiter.check_key(&a).is_err());
        assert!(limiter.check_key(&b).is_ok());
    }
}
