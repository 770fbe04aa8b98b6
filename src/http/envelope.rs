//! Response envelope normalization.
//!
//! Every JSON object leaving the router is merged onto
//! `{"status": true, "attribution": <label>}`. Handler fields win on key
//! collision, so wrapping an already wrapped body changes nothing.

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::{json, Map, Value};

use crate::http::server::AppState;

/// Bodies above this size are passed through untouched.
const MAX_ENVELOPE_BODY: usize = 8 * 1024 * 1024;

/// Merge `body` onto the base envelope. Non-objects are returned as is.
pub fn wrap(body: Value, attribution: &str) -> Value {
    match body {
        Value::Object(fields) => {
            let mut merged = Map::with_capacity(fields.len() + 2);
            merged.insert("status".into(), Value::Bool(true));
            merged.insert("attribution".into(), Value::String(attribution.to_string()));
            merged.extend(fields);
            Value::Object(merged)
        }
        other => other,
    }
}

/// The uniform error envelope.
pub fn error_body(attribution: &str, error: &str, message: &str) -> Value {
    json!({
        "status": false,
        "attribution": attribution,
        "error": error,
        "message": message,
    })
}

fn fits_envelope(upper: Option<u64>) -> bool {
    upper.is_some_and(|len| len <= MAX_ENVELOPE_BODY as u64)
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

pub async fn envelope_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !is_json(&response) {
        return response;
    }

    // Oversized or unsized bodies stream through unwrapped.
    if !fits_envelope(HttpBody::size_hint(response.body()).upper()) {
        tracing::debug!("JSON response too large to envelope, passing through");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_ENVELOPE_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to buffer JSON response");
            return state.pages.page(StatusCode::INTERNAL_SERVER_ERROR).await;
        }
    };

    let value = match serde_json::from_slice::<Value>(&bytes) {
        Ok(value @ Value::Object(_)) => value,
        _ => return Response::from_parts(parts, Body::from(bytes)),
    };

    let settings = state.settings.load().ok();
    let wrapped = wrap(value, &state.attribution(settings.as_deref()));
    match serde_json::to_vec_pretty(&wrapped) {
        Ok(out) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            Response::from_parts(parts, Body::from(out))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize envelope");
            Response::from_parts(parts, Body::from(bytes))
        }
    }
}
