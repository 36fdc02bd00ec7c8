//! Per-IP token-bucket rate limiting for unauthenticated endpoints
//! (login: 5/min per §6). In-process, keyed by client IP — acceptable
//! per the concurrency model's shared-resource policy, since a single
//! server process is the unit of deployment this pass targets.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use serde_json::json;

pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

pub fn per_ip_limiter(per_minute: u32) -> Arc<IpRateLimiter> {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute.max(1)).unwrap());
    Arc::new(RateLimiter::keyed(quota))
}

pub async fn rate_limit(State(limiter): State<Arc<IpRateLimiter>>, ConnectInfo(addr): ConnectInfo<SocketAddr>, req: Request, next: Next) -> Response {
    if limiter.check_key(&addr.ip()).is_err() {
        return (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "60")], axum::Json(json!({"error": "rate limit exceeded", "code": "SYSTEM_6004"}))).into_response();
    }
    next.run(req).await
}
