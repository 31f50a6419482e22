//! Inbound rate limiting.
//!
//! Sliding 60-second window of 100 requests per client IP. The store is a
//! concurrent map of hit timestamps; a background task prunes idle entries
//! so one-off clients do not accumulate. Exceeding the window yields HTTP
//! 429 with `{message, retryAfter}` where `retryAfter` counts the seconds
//! until the oldest in-window hit expires.

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::sig_down::Shutdown;

/// Window length.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Maximum requests per IP per window.
pub const MAX_REQUESTS: usize = 100;

#[derive(Default)]
pub struct RateLimiter {
    hits: DashMap<IpAddr, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit for `ip`. `Err(retry_after_secs)` when over the window.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let now = Instant::now();
        let mut entry = self.hits.entry(ip).or_default();
        entry.retain(|hit| now.duration_since(*hit) < WINDOW);
        if entry.len() >= MAX_REQUESTS {
            let oldest = entry.first().copied().unwrap_or(now);
            let retry_after = WINDOW
                .saturating_sub(now.duration_since(oldest))
                .as_secs()
                .max(1);
            return Err(retry_after);
        }
        entry.push(now);
        Ok(())
    }

    /// Drop IPs whose every hit has aged out of the window.
    fn sweep(&self) {
        let now = Instant::now();
        self.hits
            .retain(|_, hits| hits.iter().any(|hit| now.duration_since(*hit) < WINDOW));
    }

    /// Background cleanup loop, one sweep per window. Registered with the
    /// shutdown coordinator so it exits cleanly when the gateway drains.
    pub fn spawn_cleanup(self: &Arc<Self>, shutdown: &Shutdown) {
        let limiter = Arc::clone(self);
        let cancelled = shutdown.cancellation_token();
        shutdown.spawn(async move {
            let mut interval = tokio::time::interval(WINDOW);
            loop {
                tokio::select! {
                    _ = interval.tick() => limiter.sweep(),
                    _ = cancelled.cancelled() => break,
                }
            }
        });
    }
}

/// Axum middleware enforcing the limiter on every request.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check(addr.ip()) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(ip = %addr.ip(), retry_after, "rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "message": "rate limit exceeded, try again later",
                    "retryAfter": retry_after,
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_first_request_is_rejected() {
        let limiter = RateLimiter::new();
        let ip: IpAddr = "203.0.113.7".parse().expect("ip");
        for _ in 0..MAX_REQUESTS {
            assert!(limiter.check(ip).is_ok());
        }
        let retry_after = limiter.check(ip).expect_err("over the window");
        assert!(retry_after >= 1 && retry_after <= WINDOW.as_secs());
    }

    #[test]
    fn limits_are_per_ip() {
        let limiter = RateLimiter::new();
        let first: IpAddr = "203.0.113.7".parse().expect("ip");
        let second: IpAddr = "203.0.113.8".parse().expect("ip");
        for _ in 0..MAX_REQUESTS {
            assert!(limiter.check(first).is_ok());
        }
        assert!(limiter.check(first).is_err());
        assert!(limiter.check(second).is_ok());
    }

    #[test]
    fn sweep_drops_only_idle_ips() {
        let limiter = RateLimiter::new();
        let ip: IpAddr = "203.0.113.9".parse().expect("ip");
        limiter.check(ip).expect("first hit");
        limiter.sweep();
        assert!(limiter.hits.contains_key(&ip));
    }

    #[tokio::test]
    async fn cleanup_loop_exits_on_shutdown() {
        let shutdown = Shutdown::try_new().expect("signal registration");
        let limiter = Arc::new(RateLimiter::new());
        limiter.spawn_cleanup(&shutdown);

        shutdown.cancellation_token().cancel();
        assert!(shutdown.drain(Duration::from_secs(1)).await);
    }
}
