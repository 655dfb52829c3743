// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window admission control keyed by caller identity.
//!
//! Counters live behind [`CounterStore`]. When the store cannot be reached
//! the limiter fails open: an unthrottled chat path is preferred over an
//! unavailable one.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use parley_config::model::RateLimitConfig;
use parley_core::{CounterStore, ParleyError};
use serde_json::json;
use tracing::{debug, warn};

/// Bodies larger than this are not inspected for a session id.
const MAX_INSPECTED_BODY: usize = 256 * 1024;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Instant,
}

/// Process-local [`CounterStore`]. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, Counter>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment with an explicit clock reading.
    pub fn increment_at(&self, key: &str, window: Duration, now: Instant) -> u64 {
        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now + window,
        });
        if now >= counter.expires_at {
            counter.count = 0;
            counter.expires_at = now + window;
        }
        counter.count += 1;
        counter.count
    }

    /// Drops expired counters. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, c| now < c.expires_at);
        before - self.counters.len()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, ParleyError> {
        Ok(self.increment_at(key, window, Instant::now()))
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// Requests left in the window; `None` when the count is unknown.
    pub remaining: Option<u64>,
    pub limit: u64,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: u64,
    window: Duration,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
            enabled: true,
        }
    }

    pub fn from_config(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(
                store,
                u64::from(config.max_requests),
                Duration::from_secs(config.window_secs),
            )
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Counts one request for `key` and decides whether to admit it.
    pub async fn admit(&self, key: &str) -> Admission {
        if !self.enabled {
            return Admission {
                allowed: true,
                remaining: None,
                limit: self.limit,
            };
        }

        match self
            .store
            .increment(&format!("rate:session:{key}"), self.window)
            .await
        {
            Ok(count) => Admission {
                allowed: count <= self.limit,
                remaining: Some(self.limit.saturating_sub(count)),
                limit: self.limit,
            },
            Err(e) => {
                warn!(key, error = %e, "rate limit store unavailable, admitting request");
                Admission {
                    allowed: true,
                    remaining: None,
                    limit: self.limit,
                }
            }
        }
    }
}

/// Middleware applying [`RateLimiter::admit`] to each request.
///
/// The caller key is the body's `sessionId`, else the first
/// `X-Forwarded-For` address, else the peer address, else `anonymous`.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_INSPECTED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "request body rejected");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "Request body is too large" })),
            )
                .into_response();
        }
    };

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let key = caller_key(&bytes, &parts.headers, peer);

    let admission = limiter.admit(&key).await;
    if !admission.allowed {
        debug!(key, "request rate limited");
        let mut response = too_many_requests(limiter.window());
        set_limit_headers(response.headers_mut(), &admission);
        return response;
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let mut response = next.run(request).await;
    set_limit_headers(response.headers_mut(), &admission);
    response
}

/// Renders [`ParleyError::RateLimited`] as a 429 with `Retry-After`.
fn too_many_requests(retry_after: Duration) -> Response {
    let err = ParleyError::RateLimited { retry_after };
    let secs = retry_after.as_secs();
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": err.user_message(),
            "retryAfter": secs,
        })),
    )
        .into_response();
    response
        .headers_mut()
        .insert("retry-after", HeaderValue::from(secs));
    response
}

fn caller_key(body: &[u8], headers: &HeaderMap, peer: Option<String>) -> String {
    let session = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("sessionId")?.as_str().map(str::to_string))
        .filter(|s| !s.trim().is_empty());
    if let Some(session) = session {
        return session;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    forwarded
        .or(peer)
        .unwrap_or_else(|| "anonymous".to_string())
}

fn set_limit_headers(headers: &mut HeaderMap, admission: &Admission) {
    if let Some(remaining) = admission.remaining {
        headers.insert("x-ratelimit-limit", HeaderValue::from(admission.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    }
}
