//! API key access control.
//!
//! Route modules attach [`require_api_key`] to the routes they want gated.
//! The gate only acts when the settings document explicitly requires keys;
//! a route marked [`RouteAccess::Open`] is never gated.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::config::{Settings, SharedSettingsStore};
use crate::http::envelope;
use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::rate_limit::{epoch_millis, ApiKeyLimiter};

/// Query parameter carrying the key.
pub const APIKEY_PARAM: &str = "apikey";

/// Per-route opt-out, consulted before the global requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Keyed,
    Open,
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    KeyRequired,
    Misconfigured,
    InvalidKey,
    RateLimited,
}

impl Denial {
    pub fn status(self) -> StatusCode {
        match self {
            Denial::KeyRequired => StatusCode::UNAUTHORIZED,
            Denial::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            Denial::InvalidKey => StatusCode::FORBIDDEN,
            Denial::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn error(self) -> &'static str {
        match self {
            Denial::KeyRequired => "API key required",
            Denial::Misconfigured => "Server configuration error",
            Denial::InvalidKey => "Invalid API key",
            Denial::RateLimited => "Rate limit exceeded",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Denial::KeyRequired => "Please provide a valid API key in the query parameters",
            Denial::Misconfigured => "API key validation is not properly configured",
            Denial::InvalidKey => "The provided API key is not valid or does not exist",
            Denial::RateLimited => "You have exceeded the rate limit for this API key",
        }
    }

    /// Metric label.
    pub fn reason(self) -> &'static str {
        match self {
            Denial::KeyRequired => "key_required",
            Denial::Misconfigured => "misconfigured",
            Denial::InvalidKey => "invalid_key",
            Denial::RateLimited => "rate_limited",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(Denial),
}

/// Decides per request whether a key is needed and valid.
#[derive(Clone)]
pub struct AccessGate {
    settings: SharedSettingsStore,
    limiter: Arc<ApiKeyLimiter>,
}

impl AccessGate {
    pub fn new(settings: SharedSettingsStore, limiter: Arc<ApiKeyLimiter>) -> Self {
        Self { settings, limiter }
    }

    pub fn authorize(&self, access: RouteAccess, apikey: Option<&str>) -> AccessDecision {
        self.authorize_at(access, apikey, epoch_millis())
    }

    pub fn authorize_at(
        &self,
        access: RouteAccess,
        apikey: Option<&str>,
        now_ms: u64,
    ) -> AccessDecision {
        if access == RouteAccess::Open {
            return AccessDecision::Allow;
        }

        // Unreadable or unspecified requirement is pass-through.
        match self.settings.load() {
            Ok(settings) if settings.require_apikey() == Some(true) => {}
            Ok(_) => return AccessDecision::Allow,
            Err(e) => {
                tracing::warn!(error = %e, "Settings unavailable, skipping API key check");
                return AccessDecision::Allow;
            }
        }

        let Some(key) = apikey.filter(|k| !k.is_empty()) else {
            return AccessDecision::Deny(Denial::KeyRequired);
        };

        // Validation re-reads the document and fails closed.
        let settings = match self.settings.load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!(error = %e, "Settings unreadable during key validation");
                return AccessDecision::Deny(Denial::Misconfigured);
            }
        };
        let Some(registry) = settings.key_registry() else {
            return AccessDecision::Deny(Denial::Misconfigured);
        };

        match registry.get(key) {
            Some(entry) if entry.enabled => {
                if self
                    .limiter
                    .admit_at(key, entry.rate_limit.as_deref(), now_ms)
                {
                    AccessDecision::Allow
                } else {
                    AccessDecision::Deny(Denial::RateLimited)
                }
            }
            _ => AccessDecision::Deny(Denial::InvalidKey),
        }
    }
}

/// Middleware state: the gate plus this route's access flag.
#[derive(Clone)]
pub struct KeyGuard {
    state: AppState,
    access: RouteAccess,
}

impl KeyGuard {
    pub fn new(state: &AppState, access: RouteAccess) -> Self {
        Self {
            state: state.clone(),
            access,
        }
    }

    pub fn keyed(state: &AppState) -> Self {
        Self::new(state, RouteAccess::Keyed)
    }
}

fn query_apikey(request: &Request<Body>) -> Option<String> {
    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove(APIKEY_PARAM))
}

pub async fn require_api_key(
    State(guard): State<KeyGuard>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let apikey = query_apikey(&request);

    match guard.state.access.authorize(guard.access, apikey.as_deref()) {
        AccessDecision::Allow => next.run(request).await,
        AccessDecision::Deny(denial) => {
            tracing::warn!(
                path = %request.uri().path(),
                request_id = %request.request_id(),
                reason = denial.reason(),
                "API key check failed"
            );
            metrics::record_gate_denial("api_key", denial.reason());
            if denial == Denial::RateLimited {
                metrics::record_rate_limited("api_key");
            }
            let settings = guard.state.settings.load().ok();
            denial_response(denial, &guard.state.attribution(settings.as_deref()))
        }
    }
}

pub fn denial_response(denial: Denial, attribution: &str) -> Response {
    let body = envelope::error_body(attribution, denial.error(), denial.message());
    (denial.status(), Json(body)).into_response()
}

/// Attribution label of a snapshot, or `fallback` when it carries none.
pub fn attribution_of(settings: Option<&Settings>, fallback: &str) -> String {
    settings
        .and_then(Settings::attribution)
        .unwrap_or(fallback)
        .to_string()
}
