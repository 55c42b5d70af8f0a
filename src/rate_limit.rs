//! Fixed-window rate limiting for the data routes.
//!
//! Counts requests per client IP inside a window that resets every
//! `window` seconds; requests beyond `max_requests` are answered with
//! 429 before any handler runs. State lives in process memory only —
//! admission control happens upstream of the handlers, so the pure
//! bucketing work is never delayed by it.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::Mutex;

// ---

struct WindowState {
    started: Instant,
    count: u32,
}

/// Per-IP fixed-window request counter.
pub struct RateLimiter {
    // ---
    window: Duration,
    max_requests: u32,
    clients: Mutex<HashMap<IpAddr, WindowState>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `client`; false once the window is full.
    pub async fn admit(&self, client: IpAddr) -> bool {
        // ---
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        let state = clients.entry(client).or_insert(WindowState {
            started: now,
            count: 0,
        });

        if now.duration_since(state.started) >= self.window {
            state.started = now;
            state.count = 0;
        }

        state.count += 1;
        state.count <= self.max_requests
    }
}

/// Axum middleware gating the data routes.
pub async fn limit(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    // ---
    if limiter.admit(addr.ip()).await {
        next.run(request).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "Too many requests from this IP, please try again later."
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn client() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    #[tokio::test]
    async fn denies_requests_beyond_the_window_maximum() {
        // ---
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);

        for _ in 0..3 {
            assert!(limiter.admit(client()).await);
        }
        assert!(!limiter.admit(client()).await);
    }

    #[tokio::test]
    async fn window_expiry_resets_the_count() {
        // ---
        let limiter = RateLimiter::new(Duration::ZERO, 1);

        // Zero-length window: every request starts a fresh window.
        assert!(limiter.admit(client()).await);
        assert!(limiter.admit(client()).await);
        assert!(limiter.admit(client()).await);
    }

    #[tokio::test]
    async fn clients_are_counted_independently() {
        // ---
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let other: IpAddr = "10.0.0.7".parse().unwrap();

        assert!(limiter.admit(client()).await);
        assert!(!limiter.admit(client()).await);
        assert!(limiter.admit(other).await);
    }
}
