//! Per-IP rate limiting for the chat endpoint.
//!
//! An explicit, injectable fixed-window limiter: each IP gets a counting
//! window; exceeding it blocks the IP for a fixed duration. Entries are
//! swept periodically; the sweep never removes an entry that is mid-window
//! or mid-block. A mutex guards the table since the runtime is
//! multi-threaded.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request may proceed.
    Allowed,
    /// Request is blocked; retry after the given duration.
    Blocked {
        /// Time until the block lifts.
        retry_after: Duration,
    },
}

#[derive(Debug)]
struct Entry {
    window_start: Instant,
    count: u32,
    blocked_until: Option<Instant>,
}

/// Fixed-window rate limiter keyed by client IP.
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<IpAddr, Entry>>,
}

impl RateLimiter {
    /// Create a limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `key` and decide whether it may proceed.
    pub fn check_and_increment(&self, key: IpAddr) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: IpAddr, now: Instant) -> Decision {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let entry = entries.entry(key).or_insert(Entry {
            window_start: now,
            count: 0,
            blocked_until: None,
        });

        if let Some(until) = entry.blocked_until {
            if now < until {
                return Decision::Blocked {
                    retry_after: until - now,
                };
            }
            // Block expired; start a fresh window.
            entry.blocked_until = None;
            entry.window_start = now;
            entry.count = 0;
        }

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.window_start = now;
            entry.count = 0;
        }

        entry.count += 1;
        if entry.count > self.config.max_requests {
            entry.blocked_until = Some(now + self.config.block);
            tracing::warn!(ip = %key, "rate limit exceeded, blocking");
            return Decision::Blocked {
                retry_after: self.config.block,
            };
        }

        Decision::Allowed
    }

    /// Drop entries that are neither mid-window nor mid-block.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let window = self.config.window;
        entries.retain(|_, entry| {
            let in_block = entry.blocked_until.is_some_and(|until| now < until);
            let in_window = now.duration_since(entry.window_start) < window;
            in_block || in_window
        });
    }

    /// How often stale entries should be swept.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        self.config.sweep_interval
    }
}

/// Resolve the real client IP behind Cloudflare / Fly.io proxies.
///
/// Header priority: `CF-Connecting-IP`, `X-Forwarded-For` (first hop),
/// `X-Real-IP`, `Fly-Client-IP`, then the socket peer address.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    if let Some(ip) = headers
        .get("cf-connecting-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    if let Some(ip) = headers
        .get("fly-client-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    peer.ip()
}

/// Axum middleware applying the limiter to a route.
pub async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), peer);
    match state.limiter().check_and_increment(ip) {
        Decision::Allowed => next.run(request).await,
        Decision::Blocked { retry_after } => AppError::RateLimited(retry_after).into_response(),
    }
}
