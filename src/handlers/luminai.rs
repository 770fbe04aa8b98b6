//! `GET /ai/luminai?text=` proxy to the LuminAI chat service.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::http::server::AppState;
use crate::routing::{MountError, RouteModule};
use crate::security::access_control::{require_api_key, KeyGuard};

pub struct LuminaiModule;

impl RouteModule for LuminaiModule {
    fn name(&self) -> &str {
        "luminai"
    }

    fn mount(
        &self,
        router: Router<AppState>,
        state: &AppState,
    ) -> Result<Router<AppState>, MountError> {
        let url = &state.config.upstreams.luminai_url;
        reqwest::Url::parse(url)
            .map_err(|e| MountError::Unavailable(format!("luminai_url '{url}': {e}")))?;

        Ok(router.route(
            "/ai/luminai",
            get(chat).route_layer(middleware::from_fn_with_state(
                KeyGuard::keyed(state),
                require_api_key,
            )),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Error)]
enum UpstreamError {
    #[error("LuminAI request failed: {0}")]
    Request(#[from] reqwest::Error),
}

async fn fetch_reply(state: &AppState, content: &str) -> Result<Value, UpstreamError> {
    let reply: ChatReply = state
        .upstream
        .post(&state.config.upstreams.luminai_url)
        .json(&json!({ "content": content }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(reply.result)
}

async fn chat(State(state): State<AppState>, Query(query): Query<ChatQuery>) -> Response {
    let Some(text) = query.text.filter(|t| !t.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": false, "error": "Text is required" })),
        )
            .into_response();
    };

    match fetch_reply(&state, &text).await {
        Ok(result) => Json(json!({ "status": true, "result": result })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "LuminAI upstream failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
