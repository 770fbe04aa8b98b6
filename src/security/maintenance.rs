//! Maintenance mode gate.
//!
//! # States
//! - Normal: requests fall through
//! - Maintenance: non-exempt requests are answered with 503
//!
//! The state is derived from the settings snapshot on every request; there
//! are no transitions of its own. A settings read failure counts as Normal.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::{Settings, SettingsError};
use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceState {
    Normal,
    Maintenance,
}

impl MaintenanceState {
    /// Fail-open: an unreadable snapshot is Normal.
    pub fn from_snapshot(snapshot: Result<&Settings, &SettingsError>) -> Self {
        match snapshot {
            Ok(settings) if settings.maintenance_enabled() => MaintenanceState::Maintenance,
            Ok(_) => MaintenanceState::Normal,
            Err(e) => {
                tracing::error!(error = %e, "Error checking maintenance mode");
                MaintenanceState::Normal
            }
        }
    }
}

/// True when `path` starts with a configured or settings-provided exemption.
pub fn is_exempt(path: &str, configured: &[String], settings: Option<&Settings>) -> bool {
    let extra = settings.map(Settings::maintenance_exemptions).unwrap_or_default();
    configured
        .iter()
        .chain(extra)
        .any(|prefix| path.starts_with(prefix.as_str()))
}

pub async fn maintenance_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let snapshot = state.settings.load();
    let settings = snapshot.as_deref().ok();
    let mode = MaintenanceState::from_snapshot(snapshot.as_deref());

    let path = request.uri().path().to_owned();
    if mode == MaintenanceState::Normal
        || is_exempt(&path, &state.config.maintenance.exempt_prefixes, settings)
    {
        return next.run(request).await;
    }

    metrics::record_gate_denial("maintenance", "maintenance");
    if state.paths.is_api(&path) {
        tracing::debug!(path = %path, "Maintenance response for API request");
        let body = json!({
            "status": false,
            "attribution": state.attribution(settings),
            "error": "Service temporarily unavailable",
            "message": "The API is currently under maintenance. Please try again later.",
            "maintenance": true,
        });
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    state.pages.maintenance_page().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_follows_snapshot() {
        let on = Settings::from_json(r#"{"maintenance": {"enabled": true}}"#).unwrap();
        let off = Settings::default();
        assert_eq!(
            MaintenanceState::from_snapshot(Ok(&on)),
            MaintenanceState::Maintenance
        );
        assert_eq!(MaintenanceState::from_snapshot(Ok(&off)), MaintenanceState::Normal);
        assert_eq!(
            MaintenanceState::from_snapshot(Err(&SettingsError::Unavailable)),
            MaintenanceState::Normal
        );
    }

    #[test]
    fn test_exemptions_combine_config_and_settings() {
        let configured = vec!["/api/settings".to_string(), "/assets/".to_string()];
        let settings = Settings::from_json(
            r#"{"maintenance": {"enabled": true, "exemptPaths": ["/api/status"]}}"#,
        )
        .unwrap();

        assert!(is_exempt("/api/settings", &configured, None));
        assert!(is_exempt("/assets/app.css", &configured, None));
        assert!(!is_exempt("/api/status", &configured, None));
        assert!(is_exempt("/api/status", &configured, Some(&settings)));
        assert!(!is_exempt("/api/anything", &configured, Some(&settings)));
    }
}
