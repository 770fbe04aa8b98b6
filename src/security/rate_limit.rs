//! Fixed-window rate limiting for anonymous and keyed traffic.
//!
//! Two subject spaces share one counter implementation:
//! - anonymous callers, keyed by client IP, with a fixed policy
//! - API keys, with a policy parsed from the settings document and a
//!   bucket key that embeds the window index
//!
//! Counters live in a `DashMap`; each admission mutates one entry under its
//! shard lock, so concurrent requests for the same subject are serialized.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client_ip::client_ip;

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Maximum requests per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u64,
    pub window_ms: u64,
}

impl RateLimitPolicy {
    pub const fn new(max_requests: u64, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(50, 60_000)
    }
}

/// Policy resolved for one API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    Unlimited,
    Limited(RateLimitPolicy),
}

impl KeyPolicy {
    /// Parse `"<N>/minute"`, `"<N>/hour"`, `"<N>/day"` or `"unlimited"`.
    ///
    /// Anything else, including a missing spec, yields `fallback`.
    pub fn parse(spec: Option<&str>, fallback: RateLimitPolicy) -> Self {
        let Some(spec) = spec else {
            return KeyPolicy::Limited(fallback);
        };
        if spec == "unlimited" {
            return KeyPolicy::Unlimited;
        }

        let parsed = spec.split_once('/').and_then(|(count, unit)| {
            if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let window_ms = match unit {
                "minute" => 60_000,
                "hour" => 60 * 60_000,
                "day" => 24 * 60 * 60_000,
                _ => return None,
            };
            count
                .parse()
                .ok()
                .map(|max_requests| RateLimitPolicy::new(max_requests, window_ms))
        });

        match parsed {
            Some(policy) => KeyPolicy::Limited(policy),
            None => {
                tracing::debug!(spec, "Unrecognized rate limit, using default policy");
                KeyPolicy::Limited(fallback)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u64,
    reset_at_ms: u64,
}

/// Per-subject fixed-window counters.
#[derive(Debug, Default)]
pub struct FixedWindowLimiter {
    records: DashMap<String, WindowRecord>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count this request against `subject`, then check it against `policy`.
    ///
    /// The denying call still increments, so the count can exceed the limit.
    pub fn admit_at(&self, subject: &str, policy: RateLimitPolicy, now_ms: u64) -> bool {
        let mut record = self
            .records
            .entry(subject.to_string())
            .or_insert_with(|| WindowRecord {
                count: 0,
                reset_at_ms: now_ms + policy.window_ms,
            });

        if now_ms > record.reset_at_ms {
            record.count = 0;
            record.reset_at_ms = now_ms + policy.window_ms;
        }
        record.count += 1;
        record.count <= policy.max_requests
    }

    /// Remove every record whose window has already closed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| now_ms <= record.reset_at_ms);
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current count for a subject, if it has a record.
    pub fn count(&self, subject: &str) -> Option<u64> {
        self.records.get(subject).map(|r| r.count)
    }
}

/// Anonymous limiter keyed by client IP.
#[derive(Debug)]
pub struct AnonymousLimiter {
    windows: FixedWindowLimiter,
    policy: RateLimitPolicy,
}

impl AnonymousLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            windows: FixedWindowLimiter::new(),
            policy,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(RateLimitPolicy::new(
            config.anonymous_max_requests,
            config.anonymous_window_ms,
        ))
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub fn admit(&self, ip: &str) -> bool {
        self.admit_at(ip, epoch_millis())
    }

    pub fn admit_at(&self, ip: &str, now_ms: u64) -> bool {
        self.windows.admit_at(ip, self.policy, now_ms)
    }

    pub fn sweep(&self, now_ms: u64) -> usize {
        self.windows.sweep(now_ms)
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Keyed limiter whose buckets are `<key>_<window index>`.
#[derive(Debug)]
pub struct ApiKeyLimiter {
    windows: FixedWindowLimiter,
    fallback: RateLimitPolicy,
}

impl ApiKeyLimiter {
    pub fn new(fallback: RateLimitPolicy) -> Self {
        Self {
            windows: FixedWindowLimiter::new(),
            fallback,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(RateLimitPolicy::new(
            config.default_key_max_requests,
            config.default_key_window_ms,
        ))
    }

    pub fn policy_for(&self, spec: Option<&str>) -> KeyPolicy {
        KeyPolicy::parse(spec, self.fallback)
    }

    pub fn admit(&self, key: &str, spec: Option<&str>) -> bool {
        self.admit_at(key, spec, epoch_millis())
    }

    pub fn admit_at(&self, key: &str, spec: Option<&str>, now_ms: u64) -> bool {
        match self.policy_for(spec) {
            KeyPolicy::Unlimited => true,
            KeyPolicy::Limited(policy) => {
                let bucket = format!("{}_{}", key, now_ms / policy.window_ms);
                self.windows.admit_at(&bucket, policy, now_ms)
            }
        }
    }

    /// Drop buckets of windows that have closed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        self.windows.sweep(now_ms)
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Periodically sweep both limiters until shutdown.
///
/// A panicking sweep is logged and the cycle skipped.
pub async fn run_sweeper(
    anonymous: Arc<AnonymousLimiter>,
    keys: Arc<ApiKeyLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    // First tick fires immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = epoch_millis();
                let swept = catch_unwind(AssertUnwindSafe(|| {
                    (anonymous.sweep(now), keys.sweep(now))
                }));
                match swept {
                    Ok((ips, buckets)) => {
                        metrics::record_limiter_size("anonymous", anonymous.tracked());
                        metrics::record_limiter_size("api_key", keys.tracked());
                        tracing::debug!(ips, buckets, "Swept expired rate limit windows");
                    }
                    Err(_) => tracing::error!("Rate limit sweep panicked, skipping cycle"),
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Rate limit sweeper stopping");
                break;
            }
        }
    }
}

/// Anonymous IP stage.
///
/// Skipped for API-like paths while key enforcement is explicitly disabled.
/// Denials always render the 429 page, never JSON.
pub async fn anonymous_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();

    if state.paths.is_api(&path) {
        match state.settings.load() {
            Ok(settings) if settings.keys_disabled() => return next.run(request).await,
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Failed to load settings for rate limiting"),
        }
    }

    let ip = client_ip(&request, state.config.rate_limit.trust_forwarded_for);
    if state.anonymous.admit(&ip) {
        next.run(request).await
    } else {
        tracing::warn!(client = %ip, path = %path, "Anonymous rate limit exceeded");
        metrics::record_rate_limited("anonymous");
        state.pages.page(StatusCode::TOO_MANY_REQUESTS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: u64 = 60_000;

    #[test]
    fn test_anonymous_window_admits_limit_then_denies() {
        let limiter = AnonymousLimiter::new(RateLimitPolicy::default());
        let start = 1_000_000;
        for i in 0..50 {
            assert!(limiter.admit_at("10.0.0.1", start + i), "request {} denied", i + 1);
        }
        assert!(!limiter.admit_at("10.0.0.1", start + 50));
        // Other subjects are unaffected.
        assert!(limiter.admit_at("10.0.0.2", start + 50));
    }

    #[test]
    fn test_anonymous_window_resets_after_expiry() {
        let limiter = AnonymousLimiter::new(RateLimitPolicy::new(50, MINUTE));
        let start = 5_000;
        for _ in 0..51 {
            limiter.admit_at("ip", start);
        }
        assert!(!limiter.admit_at("ip", start + MINUTE));
        assert!(limiter.admit_at("ip", start + MINUTE + 1));
    }

    #[test]
    fn test_denied_call_still_counts() {
        let windows = FixedWindowLimiter::new();
        let policy = RateLimitPolicy::new(1, MINUTE);
        assert!(windows.admit_at("s", policy, 0));
        assert!(!windows.admit_at("s", policy, 1));
        assert!(!windows.admit_at("s", policy, 2));
        assert_eq!(windows.count("s"), Some(3));
    }

    #[test]
    fn test_sweep_removes_only_closed_windows() {
        let limiter = AnonymousLimiter::new(RateLimitPolicy::new(5, MINUTE));
        limiter.admit_at("old", 0);
        limiter.admit_at("new", 30_000);
        assert_eq!(limiter.sweep(MINUTE + 1), 1);
        assert_eq!(limiter.tracked(), 1);
        assert_eq!(limiter.sweep(MINUTE + 30_001), 1);
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_policy_parsing() {
        let fallback = RateLimitPolicy::default();
        assert_eq!(
            KeyPolicy::parse(Some("10/minute"), fallback),
            KeyPolicy::Limited(RateLimitPolicy::new(10, MINUTE))
        );
        assert_eq!(
            KeyPolicy::parse(Some("100/hour"), fallback),
            KeyPolicy::Limited(RateLimitPolicy::new(100, 60 * MINUTE))
        );
        assert_eq!(
            KeyPolicy::parse(Some("1000/day"), fallback),
            KeyPolicy::Limited(RateLimitPolicy::new(1000, 24 * 60 * MINUTE))
        );
        assert_eq!(KeyPolicy::parse(Some("unlimited"), fallback), KeyPolicy::Unlimited);
    }

    #[test]
    fn test_unparseable_policy_falls_back() {
        let fallback = RateLimitPolicy::default();
        for spec in ["abc", "10/week", "/minute", "-1/minute", "10 /minute", "Unlimited"] {
            assert_eq!(
                KeyPolicy::parse(Some(spec), fallback),
                KeyPolicy::Limited(fallback),
                "spec {spec:?}"
            );
        }
        assert_eq!(KeyPolicy::parse(None, fallback), KeyPolicy::Limited(fallback));
    }

    #[test]
    fn test_key_limit_per_minute_bucket() {
        let limiter = ApiKeyLimiter::new(RateLimitPolicy::default());
        let bucket_start = 42 * MINUTE;
        for i in 0..10 {
            assert!(limiter.admit_at("k", Some("10/minute"), bucket_start + i * 1000));
        }
        assert!(!limiter.admit_at("k", Some("10/minute"), bucket_start + 59_999));
        // The next bucket starts fresh regardless of the previous count.
        assert!(limiter.admit_at("k", Some("10/minute"), bucket_start + MINUTE));
    }

    #[test]
    fn test_unlimited_key_keeps_no_records() {
        let limiter = ApiKeyLimiter::new(RateLimitPolicy::default());
        for i in 0..1_000 {
            assert!(limiter.admit_at("vip", Some("unlimited"), i));
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_garbage_spec_behaves_like_default() {
        let limiter = ApiKeyLimiter::new(RateLimitPolicy::default());
        let admitted = (0..60)
            .filter(|i| limiter.admit_at("k", Some("abc"), MINUTE + i))
            .count();
        assert_eq!(admitted, 50);
    }

    #[test]
    fn test_key_sweep_drops_abandoned_buckets() {
        let limiter = ApiKeyLimiter::new(RateLimitPolicy::default());
        limiter.admit_at("k", Some("10/minute"), 0);
        limiter.admit_at("k", Some("10/minute"), MINUTE);
        assert_eq!(limiter.tracked(), 2);
        assert_eq!(limiter.sweep(MINUTE + 1), 1);
        assert_eq!(limiter.tracked(), 1);
    }
}
