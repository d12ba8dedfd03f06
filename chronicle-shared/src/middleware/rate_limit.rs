use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::errors::{AppError, ErrorCode};

struct WindowSlot {
    started: Instant,
    count: u32,
}

/// Once the map holds this many keys, elapsed windows are swept before
/// inserting another. Bounds memory under churning client IPs.
const PRUNE_THRESHOLD: usize = 10_000;

/// Process-local sliding-window request counter.
///
/// Counters live in an in-memory map keyed by client identity. A key's
/// window is checked opportunistically on each request: once it has
/// elapsed the counter is discarded and a fresh window begins. There is no
/// background sweep, and state is neither shared across instances nor
/// preserved across restarts.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    slots: Mutex<HashMap<String, WindowSlot>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `key`; returns false once the key has
    /// exceeded `max_requests` within the current window.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

        if slots.len() >= PRUNE_THRESHOLD {
            slots.retain(|_, slot| now.duration_since(slot.started) < self.window);
        }

        let slot = slots.entry(key.to_string()).or_insert(WindowSlot {
            started: now,
            count: 0,
        });
        if now.duration_since(slot.started) >= self.window {
            slot.started = now;
            slot.count = 0;
        }
        slot.count += 1;
        slot.count <= self.max_requests
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// Axum middleware wrapping [`RateLimiter`], keyed by client IP.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&req, addr);
    if !limiter.check(&key) {
        tracing::warn!(client = %key, "rate limit exceeded");
        return AppError::new(ErrorCode::RateLimited, "too many requests, please slow down")
            .into_response();
    }
    next.run(req).await
}

/// Client identity for rate limiting: first hop of X-Forwarded-For when
/// present, otherwise the peer address.
fn client_key(req: &Request<Body>, addr: SocketAddr) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string())
}
