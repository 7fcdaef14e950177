//! Request middleware
//!
//! Provides:
//! - Fixed-window rate limiting on trigger endpoints
//! - Bearer-secret check for scheduled sweep endpoints
//! - Request body size limits
//! - Security headers
//! - Request logging with sanitization

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use subtle::ConstantTimeEq;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::api::AppState;
use crate::api::identity::USER_ID_HEADER;
use crate::config::sanitize_for_logging;
use crate::error::GovernanceError;

/// Outcome of one increment-and-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after_secs: u64,
}

/// Counter backend for the rate limiter.
pub trait RateLimitStore: Send + Sync {
    fn check(&self, key: &str) -> RateDecision;

    /// Drop stale windows.
    fn cleanup(&self) {}
}

/// Per-process fixed-window limiter.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    /// key -> (request count, window start)
    requests: DashMap<String, (u32, Instant)>,
    limit: u32,
    window: Duration,
}

impl InMemoryRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            limit,
            window,
        }
    }
}

impl RateLimitStore for InMemoryRateLimiter {
    fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();

        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) >= self.window {
            *count = 0;
            *window_start = now;
        }

        let reset_after_secs = self
            .window
            .checked_sub(now.duration_since(*window_start))
            .map(|d| d.as_secs())
            .unwrap_or(0);

        if *count >= self.limit {
            return RateDecision {
                allowed: false,
                limit: self.limit,
                remaining: 0,
                reset_after_secs,
            };
        }

        *count += 1;
        RateDecision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - *count,
            reset_after_secs,
        }
    }

    fn cleanup(&self) {
        let now = Instant::now();
        self.requests
            .retain(|_, (_, window_start)| now.duration_since(*window_start) < self.window * 2);
    }
}

/// Client IP, honouring reverse proxy headers.
fn client_ip(headers: &HeaderMap, addr: Option<&SocketAddr>) -> String {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return ip.trim().to_string();
    }

    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.trim().to_string();
    }

    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Keep only the edges of a value for logging.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn connect_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Caller id when present, client IP otherwise.
fn rate_limit_key(request: &Request) -> String {
    let headers = request.headers();
    match headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(user_id) => format!("user:{}", user_id),
        None => format!("ip:{}", client_ip(headers, connect_addr(request).as_ref())),
    }
}

fn insert_rate_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(decision.reset_after_secs));
}

/// Rate limiting middleware for trigger endpoints
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = rate_limit_key(&request);
    let decision = state.rate_limiter.check(&key);

    if !decision.allowed {
        warn!(
            key = %sanitize_for_logging(&key),
            path = %request.uri().path(),
            "Rate limit exceeded"
        );
        let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
        let headers = response.headers_mut();
        insert_rate_headers(headers, &decision);
        headers.insert("Retry-After", HeaderValue::from(decision.reset_after_secs));
        return response;
    }

    let mut response = next.run(request).await;
    insert_rate_headers(response.headers_mut(), &decision);
    response
}

/// Require `Authorization: Bearer <cron secret>`.
pub async fn cron_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let expected: &str = &state.cron_secret;
    let authorized = !expected.is_empty()
        && presented.is_some_and(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()));

    if !authorized {
        warn!(path = %request.uri().path(), "Rejected scheduled job call without valid secret");
        return GovernanceError::Unauthorized.into_response();
    }

    debug!(path = %request.uri().path(), "Scheduled job authorized");
    next.run(request).await
}

/// Compare without branching on content or length.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // Pad both sides to the longer length with different fill bytes
    let max_len = a.len().max(b.len());
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a);
    b_padded[..b.len()].copy_from_slice(b);

    let lengths_equal = (a.len() as u64).ct_eq(&(b.len() as u64));
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

/// Security headers middleware
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    // Governance reads must never be served from a cache
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.remove("Server");

    response
}

/// Request logging middleware with sanitization
pub async fn logging_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.log_requests {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ip = client_ip(request.headers(), connect_addr(&request).as_ref());
    let log_ip = if state.sanitize_logs {
        mask_value(&ip)
    } else {
        ip
    };

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            client_ip = %log_ip,
            "Request failed"
        );
    } else if status.is_client_error() {
        warn!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            client_ip = %log_ip,
            "Client error"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            client_ip = %log_ip,
            "Request completed"
        );
    }

    response
}

/// Reject bodies whose declared length exceeds the configured maximum
pub async fn body_size_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(length) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        && length > state.max_request_size
    {
        warn!(
            length = length,
            max = state.max_request_size,
            "Request body too large"
        );
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter() {
        let limiter = InMemoryRateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.check("user:u1").allowed);
        assert!(limiter.check("user:u1").allowed);
        let third = limiter.check("user:u1");
        assert!(third.allowed);
        assert_eq!(third.remaining, 0);

        let denied = limiter.check("user:u1");
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.reset_after_secs <= 60);

        // Keys are independent
        assert!(limiter.check("user:u2").allowed);
    }

    #[test]
    fn test_window_resets() {
        let limiter = InMemoryRateLimiter::new(1, Duration::from_millis(0));
        assert!(limiter.check("ip:10.0.0.1").allowed);
        // Zero-length window has always elapsed
        assert!(limiter.check("ip:10.0.0.1").allowed);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(&addr)), "203.0.113.7");
        assert_eq!(client_ip(&HeaderMap::new(), Some(&addr)), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_mask_value() {
        assert_eq!(mask_value("short"), "*****");
        assert_eq!(mask_value("abcdefghij"), "abcd...ghij");
        let masked = mask_value("192.168.1.100");
        assert!(masked.starts_with("192."));
        assert!(masked.ends_with(".100"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"cron-secret", b"cron-secret"));
        assert!(!constant_time_eq(b"cron-secret", b"cron-secreT"));
        assert!(!constant_time_eq(b"short", b"longer"));
        // A prefix of the secret must not match
        assert!(!constant_time_eq(b"cron", b"cron-secret"));
        assert!(!constant_time_eq(b"", b"cron-secret"));
        assert!(constant_time_eq(b"", b""));
    }
}
