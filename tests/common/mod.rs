//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use api_gateway::config::{MemorySettingsStore, Settings};
use api_gateway::{GatewayConfig, HttpServer, RouteRegistry};

/// Config whose status pages always come from the built-in templates.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.default_attribution = "Test Team".into();
    config.pages.dir = std::env::temp_dir()
        .join(format!("gateway-pages-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    config
}

pub fn settings(raw: &str) -> Settings {
    Settings::from_json(raw).expect("test settings must parse")
}

pub fn memory_store(raw: &str) -> Arc<MemorySettingsStore> {
    Arc::new(MemorySettingsStore::new(settings(raw)))
}

pub fn server(
    config: GatewayConfig,
    store: Arc<MemorySettingsStore>,
    registry: &RouteRegistry,
) -> HttpServer {
    HttpServer::new(config, store, registry)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_from(router: &Router, uri: &str, ip: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap();
    send(router, request).await
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn content_type(response: &Response<Body>) -> String {
    response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Serve `router` on an ephemeral local port.
pub async fn start_mock_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}
