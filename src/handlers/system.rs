//! System endpoints: settings, notifications and liveness.
//!
//! None of these are key-gated. `/api/settings` is also exempt from
//! maintenance so the front-end can show the maintenance banner.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::config::Settings;
use crate::http::server::AppState;
use crate::routing::{MountError, RouteModule};

pub struct SystemModule;

impl RouteModule for SystemModule {
    fn name(&self) -> &str {
        "system"
    }

    fn mount(
        &self,
        router: Router<AppState>,
        _state: &AppState,
    ) -> Result<Router<AppState>, MountError> {
        Ok(router
            .route("/api/settings", get(get_settings))
            .route("/api/notifications", get(get_notifications))
            .route("/health", get(get_health)))
    }
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub version: &'static str,
}

/// Settings document with the key registry stripped.
pub fn public_settings(settings: &Settings) -> Value {
    let mut value = serde_json::to_value(settings).unwrap_or(Value::Null);
    if let Some(api) = value.get_mut("apiSettings").and_then(Value::as_object_mut) {
        api.remove("apikey");
    }
    value
}

async fn get_settings(State(state): State<AppState>) -> Response {
    match state.settings.load() {
        Ok(settings) => Json(public_settings(&settings)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read settings document");
            state.pages.page(StatusCode::INTERNAL_SERVER_ERROR).await
        }
    }
}

async fn get_notifications(State(state): State<AppState>) -> Response {
    let path = &state.config.settings.notifications_path;
    let parsed = match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str::<Value>(&raw).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match parsed {
        Ok(notifications) => Json(notifications).into_response(),
        Err(error) => {
            tracing::error!(path = %path, error = %error, "Failed to read notifications");
            state.pages.page(StatusCode::INTERNAL_SERVER_ERROR).await
        }
    }
}

async fn get_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}
