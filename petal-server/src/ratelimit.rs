//! Memory-local token-bucket rate limiting at the HTTP edge.
//!
//! One bucket per client address (the whole process shares a bucket when no
//! peer address is known, e.g. under test), refilled continuously at the
//! configured rate with a burst equal to one second of traffic.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tower::{Layer, Service};

use crate::error::reason_response;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter keyed by client address.
pub struct MemoryRateLimiter {
    rate_per_second: f64,
    burst: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl MemoryRateLimiter {
    pub fn new(rate_per_second: u32) -> Self {
        let rate = f64::from(rate_per_second.max(1));
        Self {
            rate_per_second: rate,
            burst: rate,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a request from `key` is admitted right now.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry(key.to_owned()).or_insert(Bucket {
            tokens: self.burst,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.rate_per_second).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Tower layer applying [`MemoryRateLimiter`] before everything else.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<MemoryRateLimiter>,
}

impl RateLimitLayer {
    pub fn new(rate_per_second: u32) -> Self {
        Self {
            limiter: Arc::new(MemoryRateLimiter::new(rate_per_second)),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Tower service rejecting over-limit requests with 429.
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    limiter: Arc<MemoryRateLimiter>,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let key = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "global".to_owned(), |info| info.0.ip().to_string());
        let allowed = self.limiter.allow(&key);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !allowed {
                return Ok(reason_response(
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate limit exceeded",
                ));
            }
            inner.call(req).await
        })
    }
}
