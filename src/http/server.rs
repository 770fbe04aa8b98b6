//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared state (settings store, limiters, gates, status pages)
//! - Mount route modules through the registry
//! - Wire up the gate chain in its fixed order
//! - Run the limiter sweeper alongside the server
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{GatewayConfig, Settings, SharedSettingsStore};
use crate::http::envelope::envelope_middleware;
use crate::http::paths::ApiPaths;
use crate::http::request::UuidRequestId;
use crate::http::status::{Rendering, StatusPages};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::RouteRegistry;
use crate::security::access_control::{attribution_of, AccessGate};
use crate::security::blocking::{blocking_middleware, PathBlocklist};
use crate::security::headers::security_headers_middleware;
use crate::security::maintenance::maintenance_middleware;
use crate::security::rate_limit::{
    anonymous_rate_limit_middleware, run_sweeper, AnonymousLimiter, ApiKeyLimiter,
};

/// Application state injected into gates and handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub settings: SharedSettingsStore,
    pub anonymous: Arc<AnonymousLimiter>,
    pub keys: Arc<ApiKeyLimiter>,
    pub access: AccessGate,
    pub paths: Arc<ApiPaths>,
    pub blocklist: Arc<PathBlocklist>,
    pub pages: Arc<StatusPages>,
    pub upstream: reqwest::Client,
}

impl AppState {
    pub fn new(config: GatewayConfig, settings: SharedSettingsStore) -> Self {
        let anonymous = Arc::new(AnonymousLimiter::from_config(&config.rate_limit));
        let keys = Arc::new(ApiKeyLimiter::from_config(&config.rate_limit));
        let access = AccessGate::new(settings.clone(), keys.clone());

        let upstream = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.upstream_secs))
            .user_agent(concat!("api-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default upstream client");
                reqwest::Client::new()
            });

        Self {
            paths: Arc::new(ApiPaths::new(config.api_prefixes.iter().cloned())),
            blocklist: Arc::new(PathBlocklist::new(config.access.blocked_paths.iter().cloned())),
            pages: Arc::new(StatusPages::new(&config.pages.dir)),
            config: Arc::new(config),
            settings,
            anonymous,
            keys,
            access,
            upstream,
        }
    }

    /// Attribution for a snapshot, falling back to the configured default.
    pub fn attribution(&self, settings: Option<&Settings>) -> String {
        attribution_of(settings, &self.config.default_attribution)
    }

    pub fn current_attribution(&self) -> String {
        let settings = self.settings.load().ok();
        self.attribution(settings.as_deref())
    }

    /// JSON for API-like paths, the status page otherwise.
    pub async fn render_status(&self, status: StatusCode, path: &str) -> Response {
        let rendering = if self.paths.is_api(path) {
            Rendering::Json
        } else {
            Rendering::Page
        };
        self.pages
            .render(status, rendering, &self.current_attribution())
            .await
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    mounted: usize,
}

impl HttpServer {
    /// Build state, mount the registry and assemble the gate chain.
    pub fn new(
        config: GatewayConfig,
        settings: SharedSettingsStore,
        registry: &RouteRegistry,
    ) -> Self {
        let state = AppState::new(config, settings);
        let report = registry.discover(&state);
        let mounted = report.mounted_count();

        let routes = report
            .router
            .fallback(not_found_handler)
            .with_state(state.clone());
        let router = Self::build_router(routes, &state);

        Self {
            router,
            state,
            mounted,
        }
    }

    /// Wrap the routes in the gate chain.
    ///
    /// Outermost first: request id, trace, timeout, CORS, security headers,
    /// anonymous limit, maintenance, blocking, envelope.
    #[allow(deprecated)]
    fn build_router(routes: Router, state: &AppState) -> Router {
        routes
            .layer(middleware::from_fn_with_state(state.clone(), envelope_middleware))
            .layer(middleware::from_fn_with_state(state.clone(), blocking_middleware))
            .layer(middleware::from_fn_with_state(state.clone(), maintenance_middleware))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                anonymous_rate_limit_middleware,
            ))
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(metrics::track_requests))
            .layer(CorsLayer::permissive())
            .layer(TimeoutLayer::new(Duration::from_secs(
                state.config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Number of route modules mounted at startup.
    pub fn mounted_routes(&self) -> usize {
        self.mounted
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.mounted,
            "HTTP server starting"
        );

        let sweep_interval =
            Duration::from_millis(self.state.config.rate_limit.anonymous_window_ms);
        tokio::spawn(run_sweeper(
            self.state.anonymous.clone(),
            self.state.keys.clone(),
            sweep_interval,
            shutdown.subscribe(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Unmatched paths: JSON 404 for the API surface, the 404 page otherwise.
async fn not_found_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    tracing::debug!(path = %request.uri().path(), "No route matched");
    state
        .render_status(StatusCode::NOT_FOUND, request.uri().path())
        .await
}
