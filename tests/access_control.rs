//! Per-route API key enforcement through the router.

use axum::{http::StatusCode, middleware, routing, Json, Router};
use serde_json::json;

use api_gateway::config::{FileSettingsStore, MemorySettingsStore};
use api_gateway::HttpServer;
use api_gateway::http::AppState;
use api_gateway::routing::{MountError, RouteModule, RouteRegistry};
use api_gateway::security::access_control::{require_api_key, KeyGuard, RouteAccess};

mod common;
use common::*;

/// `/api/echo` behind the key gate, `/api/open` opted out.
struct EchoModule;

impl RouteModule for EchoModule {
    fn name(&self) -> &str {
        "echo"
    }

    fn mount(
        &self,
        router: Router<AppState>,
        state: &AppState,
    ) -> Result<Router<AppState>, MountError> {
        Ok(router
            .route(
                "/api/echo",
                routing::get(|| async { Json(json!({ "echo": "ok" })) }).route_layer(
                    middleware::from_fn_with_state(KeyGuard::keyed(state), require_api_key),
                ),
            )
            .route(
                "/api/open",
                routing::get(|| async { Json(json!({ "open": true })) }).route_layer(
                    middleware::from_fn_with_state(
                        KeyGuard::new(state, RouteAccess::Open),
                        require_api_key,
                    ),
                ),
            ))
    }
}

const KEYED: &str = r#"{
    "apiSettings": {
        "requireApikey": true,
        "creator": "Ops",
        "apikey": {
            "alpha": { "enabled": true, "rateLimit": "2/minute" },
            "beta": { "enabled": false },
            "gamma": { "enabled": true, "rateLimit": "unlimited" },
            "delta": { "enabled": true, "rateLimit": "lots" }
        }
    }
}"#;

fn router_with(raw: &str) -> Router {
    let registry = RouteRegistry::new().register("test", EchoModule);
    server(test_config(), memory_store(raw), &registry).router()
}

async fn assert_denied(router: &Router, uri: &str, status: StatusCode, error: &str) {
    let response = get(router, uri).await;
    assert_eq!(response.status(), status, "{uri}");
    let body = body_json(response).await;
    assert_eq!(body["status"], false, "{uri}");
    assert_eq!(body["attribution"], "Ops", "{uri}");
    assert_eq!(body["error"], error, "{uri}");
    assert!(body["message"].is_string(), "{uri}");
}

#[tokio::test]
async fn test_missing_key_is_401() {
    let router = router_with(KEYED);
    assert_denied(&router, "/api/echo", StatusCode::UNAUTHORIZED, "API key required").await;
    assert_denied(&router, "/api/echo?apikey=", StatusCode::UNAUTHORIZED, "API key required")
        .await;
}

#[tokio::test]
async fn test_unknown_and_disabled_keys_are_403() {
    let router = router_with(KEYED);
    assert_denied(&router, "/api/echo?apikey=nope", StatusCode::FORBIDDEN, "Invalid API key")
        .await;
    assert_denied(&router, "/api/echo?apikey=beta", StatusCode::FORBIDDEN, "Invalid API key")
        .await;
}

#[tokio::test]
async fn test_valid_key_passes_and_is_enveloped() {
    let router = router_with(KEYED);
    let response = get(&router, "/api/echo?apikey=alpha").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], true);
    assert_eq!(body["attribution"], "Ops");
    assert_eq!(body["echo"], "ok");
}

#[tokio::test]
async fn test_key_rate_limit_is_429() {
    let router = router_with(KEYED);
    for _ in 0..2 {
        let response = get(&router, "/api/echo?apikey=alpha").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_denied(
        &router,
        "/api/echo?apikey=alpha",
        StatusCode::TOO_MANY_REQUESTS,
        "Rate limit exceeded",
    )
    .await;
}

#[tokio::test]
async fn test_unlimited_key_is_never_limited() {
    let router = router_with(KEYED);
    for _ in 0..20 {
        let response = get(&router, "/api/echo?apikey=gamma").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_garbage_rate_limit_falls_back_to_default() {
    let mut config = test_config();
    config.rate_limit.default_key_max_requests = 3;
    let registry = RouteRegistry::new().register("test", EchoModule);
    let router = server(config, memory_store(KEYED), &registry).router();

    for _ in 0..3 {
        let response = get(&router, "/api/echo?apikey=delta").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = get(&router, "/api/echo?apikey=delta").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_missing_registry_is_500() {
    let router = router_with(r#"{"apiSettings": {"requireApikey": true, "creator": "Ops"}}"#);
    assert_denied(
        &router,
        "/api/echo?apikey=alpha",
        StatusCode::INTERNAL_SERVER_ERROR,
        "Server configuration error",
    )
    .await;
}

#[tokio::test]
async fn test_requirement_not_true_passes_through() {
    for raw in [
        r#"{"apiSettings": {"requireApikey": false}}"#,
        r#"{"apiSettings": {}}"#,
        "{}",
    ] {
        let router = router_with(raw);
        let response = get(&router, "/api/echo").await;
        assert_eq!(response.status(), StatusCode::OK, "{raw}");
    }
}

#[tokio::test]
async fn test_unreadable_settings_pass_through() {
    let registry = RouteRegistry::new().register("test", EchoModule);
    let store = std::sync::Arc::new(MemorySettingsStore::empty());
    let router = server(test_config(), store, &registry).router();

    let response = get(&router, "/api/echo").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_open_route_ignores_requirement() {
    let router = router_with(KEYED);
    let response = get(&router, "/api/open").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_settings_changes_apply_without_restart() {
    let registry = RouteRegistry::new().register("test", EchoModule);
    let store = memory_store("{}");
    let router = server(test_config(), store.clone(), &registry).router();

    assert_eq!(get(&router, "/api/echo").await.status(), StatusCode::OK);

    store.replace(settings(KEYED));
    assert_eq!(
        get(&router, "/api/echo").await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_malformed_entry_keeps_keys_enforced() {
    let path = std::env::temp_dir().join(format!("settings-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        r#"{
            "apiSettings": {
                "requireApikey": true,
                "creator": "Ops",
                "apikey": {
                    "good": { "enabled": true, "rateLimit": "10/minute" },
                    "typo": { "enabled": true, "rateLimit": 100 },
                    "loose": { "enabled": "yes" }
                }
            }
        }"#,
    )
    .unwrap();

    let registry = RouteRegistry::new().register("test", EchoModule);
    let store = std::sync::Arc::new(FileSettingsStore::new(&path));
    let router = HttpServer::new(test_config(), store, &registry).router();

    assert_denied(&router, "/api/echo", StatusCode::UNAUTHORIZED, "API key required").await;
    assert_eq!(
        get(&router, "/api/echo?apikey=good").await.status(),
        StatusCode::OK
    );
    // A non-string limit falls back to the default policy.
    assert_eq!(
        get(&router, "/api/echo?apikey=typo").await.status(),
        StatusCode::OK
    );
    assert_denied(
        &router,
        "/api/echo?apikey=loose",
        StatusCode::FORBIDDEN,
        "Invalid API key",
    )
    .await;

    let _ = std::fs::remove_file(&path);
}
