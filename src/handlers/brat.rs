//! `GET /maker/brat` (PNG) and `GET|HEAD /maker/bratvid` (MP4).
//!
//! The generator answers with a JSON document pointing at the rendered
//! asset, which is fetched and streamed back as-is. Video responses honour
//! a single `Range: bytes=a-b` request.

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
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
use crate::security::rate_limit::epoch_millis;

pub const MAX_TEXT_CHARS: usize = 500;

pub struct BratModule;

impl RouteModule for BratModule {
    fn name(&self) -> &str {
        "brat"
    }

    fn mount(
        &self,
        router: Router<AppState>,
        state: &AppState,
    ) -> Result<Router<AppState>, MountError> {
        let base = &state.config.upstreams.brat_base_url;
        reqwest::Url::parse(base)
            .map_err(|e| MountError::Unavailable(format!("brat_base_url '{base}': {e}")))?;

        let guard = || middleware::from_fn_with_state(KeyGuard::keyed(state), require_api_key);
        Ok(router
            .route("/maker/brat", get(brat_image).route_layer(guard()))
            .route("/maker/bratvid", get(brat_video).route_layer(guard())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Image,
    Video,
}

impl Artifact {
    fn endpoint(self) -> &'static str {
        match self {
            Artifact::Image => "brat",
            Artifact::Video => "bratvid",
        }
    }

    fn url_field(self) -> &'static str {
        match self {
            Artifact::Image => "image_url",
            Artifact::Video => "video_url",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Artifact::Image => "BRAT",
            Artifact::Video => "BRATVID",
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Artifact::Image => "image/png",
            Artifact::Video => "video/mp4",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Artifact::Image => "png",
            Artifact::Video => "mp4",
        }
    }

    fn failure(self) -> &'static str {
        match self {
            Artifact::Image => "Image generation failed",
            Artifact::Video => "Video generation failed",
        }
    }

    /// Video rendering is slower; it gets twice the configured budget.
    fn timeout(self, upstream_secs: u64) -> Duration {
        match self {
            Artifact::Image => Duration::from_secs(upstream_secs),
            Artifact::Video => Duration::from_secs(upstream_secs.saturating_mul(2)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BratQuery {
    pub text: Option<String>,
    pub background: Option<String>,
    pub color: Option<String>,
}

/// Validated generator parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BratParams {
    pub text: String,
    pub background: Option<String>,
    pub color: Option<String>,
}

/// A 400 with its envelope fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub error: &'static str,
    pub message: &'static str,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": false, "error": self.error, "message": self.message })),
        )
            .into_response()
    }
}

fn is_hex_color(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(u8::is_ascii_hexdigit)
}

pub fn validate(query: BratQuery) -> Result<BratParams, Rejection> {
    let text = query.text.filter(|t| !t.is_empty()).ok_or(Rejection {
        error: "Missing required parameter",
        message: "The 'text' parameter is required",
    })?;

    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(Rejection {
            error: "Text too long",
            message: "Text must be 500 characters or less",
        });
    }

    // Empty colour parameters mean "use the generator default".
    let background = query.background.filter(|b| !b.is_empty());
    if background.as_deref().is_some_and(|b| !is_hex_color(b)) {
        return Err(Rejection {
            error: "Invalid background color",
            message: "Background color must be in hex format (e.g., #000000)",
        });
    }

    let color = query.color.filter(|c| !c.is_empty());
    if color.as_deref().is_some_and(|c| !is_hex_color(c)) {
        return Err(Rejection {
            error: "Invalid text color",
            message: "Text color must be in hex format (e.g., #FFFFFF)",
        });
    }

    Ok(BratParams {
        text,
        background,
        color,
    })
}

#[derive(Debug, Error)]
enum GenerateError {
    #[error("Request timeout - {0} API took too long to respond")]
    Timeout(&'static str),
    #[error("{0} API error: {1}")]
    Status(&'static str, StatusCode),
    #[error("Network error - Could not reach {0} API")]
    Network(&'static str),
    #[error("Invalid response from {0} API")]
    InvalidResponse(&'static str),
}

impl GenerateError {
    fn from_reqwest(label: &'static str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerateError::Timeout(label)
        } else if let Some(status) = e.status() {
            GenerateError::Status(label, status)
        } else if e.is_decode() {
            GenerateError::InvalidResponse(label)
        } else {
            GenerateError::Network(label)
        }
    }
}

async fn generate(
    state: &AppState,
    artifact: Artifact,
    params: &BratParams,
) -> Result<Bytes, GenerateError> {
    let label = artifact.label();
    let wrap = |e| GenerateError::from_reqwest(label, e);
    let timeout = artifact.timeout(state.config.timeouts.upstream_secs);

    let mut query = vec![("text", params.text.as_str())];
    if let Some(background) = &params.background {
        query.push(("background", background.as_str()));
    }
    if let Some(color) = &params.color {
        query.push(("color", color.as_str()));
    }

    let base = state.config.upstreams.brat_base_url.trim_end_matches('/');
    let descriptor: Value = state
        .upstream
        .get(format!("{base}/maker/{}", artifact.endpoint()))
        .query(&query)
        .timeout(timeout)
        .send()
        .await
        .map_err(wrap)?
        .error_for_status()
        .map_err(wrap)?
        .json()
        .await
        .map_err(wrap)?;

    let asset_url = descriptor
        .get(artifact.url_field())
        .and_then(Value::as_str)
        .ok_or(GenerateError::InvalidResponse(label))?;

    state
        .upstream
        .get(asset_url)
        .timeout(timeout)
        .send()
        .await
        .map_err(wrap)?
        .error_for_status()
        .map_err(wrap)?
        .bytes()
        .await
        .map_err(wrap)
}

/// Outcome of interpreting a `Range` header against a body length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// No usable range; serve the whole body.
    Full,
    /// Inclusive byte range.
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Interpret a single `bytes=start-[end]` range. Malformed headers and
/// multi-range requests are ignored.
pub fn parse_range(header: Option<&str>, len: u64) -> ByteRange {
    let Some(spec) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return ByteRange::Full;
    };
    if spec.contains(',') {
        return ByteRange::Full;
    }
    let Some((start, end)) = spec.split_once('-') else {
        return ByteRange::Full;
    };
    let Ok(start) = start.trim().parse::<u64>() else {
        return ByteRange::Full;
    };
    let end = match end.trim() {
        "" => len.saturating_sub(1),
        raw => match raw.parse::<u64>() {
            Ok(end) => end.min(len.saturating_sub(1)),
            Err(_) => return ByteRange::Full,
        },
    };

    if len == 0 || start >= len || start > end {
        ByteRange::Unsatisfiable
    } else {
        ByteRange::Partial { start, end }
    }
}

fn asset_headers(artifact: Artifact, len: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(artifact.content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
    let disposition = format!(
        "inline; filename=\"{}_{}.{}\"",
        artifact.endpoint(),
        epoch_millis(),
        artifact.extension()
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if artifact == Artifact::Video {
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    }
    headers
}

fn respond(artifact: Artifact, method: &Method, range: Option<&str>, asset: Bytes) -> Response {
    let len = asset.len() as u64;
    let mut headers = asset_headers(artifact, len);

    if *method == Method::HEAD {
        return (StatusCode::OK, headers, Body::empty()).into_response();
    }
    if artifact == Artifact::Image {
        return (StatusCode::OK, headers, asset).into_response();
    }

    match parse_range(range, len) {
        ByteRange::Full => (StatusCode::OK, headers, asset).into_response(),
        ByteRange::Partial { start, end } => {
            let chunk = asset.slice(start as usize..=end as usize);
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(chunk.len()));
            if let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{len}")) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            (StatusCode::PARTIAL_CONTENT, headers, chunk).into_response()
        }
        ByteRange::Unsatisfiable => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{len}")) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response()
        }
    }
}

async fn serve(
    state: AppState,
    artifact: Artifact,
    method: Method,
    request_headers: HeaderMap,
    query: BratQuery,
) -> Response {
    let params = match validate(query) {
        Ok(params) => params,
        Err(rejection) => return rejection.into_response(),
    };

    match generate(&state, artifact, &params).await {
        Ok(asset) => {
            let range = request_headers
                .get(header::RANGE)
                .and_then(|v| v.to_str().ok());
            respond(artifact, &method, range, asset)
        }
        Err(e) => {
            tracing::error!(artifact = artifact.label(), error = %e, "Generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": false,
                    "error": artifact.failure(),
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn brat_image(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<BratQuery>,
) -> Response {
    serve(state, Artifact::Image, method, headers, query).await
}

async fn brat_video(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<BratQuery>,
) -> Response {
    serve(state, Artifact::Video, method, headers, query).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(text: Option<&str>, background: Option<&str>, color: Option<&str>) -> BratQuery {
        BratQuery {
            text: text.map(String::from),
            background: background.map(String::from),
            color: color.map(String::from),
        }
    }

    #[test]
    fn test_text_is_required() {
        let err = validate(query(None, None, None)).unwrap_err();
        assert_eq!(err.error, "Missing required parameter");
        let err = validate(query(Some(""), None, None)).unwrap_err();
        assert_eq!(err.error, "Missing required parameter");
    }

    #[test]
    fn test_text_length_counts_characters() {
        let limit = "é".repeat(MAX_TEXT_CHARS);
        assert!(validate(query(Some(&limit), None, None)).is_ok());

        let over = "a".repeat(MAX_TEXT_CHARS + 1);
        assert_eq!(
            validate(query(Some(&over), None, None)).unwrap_err().error,
            "Text too long"
        );
    }

    #[test]
    fn test_colors_must_be_hex() {
        assert!(validate(query(Some("hi"), Some("#00ff00"), Some("#FFFFFF"))).is_ok());
        assert_eq!(
            validate(query(Some("hi"), Some("green"), None)).unwrap_err().error,
            "Invalid background color"
        );
        assert_eq!(
            validate(query(Some("hi"), None, Some("#FFF"))).unwrap_err().error,
            "Invalid text color"
        );
    }

    #[test]
    fn test_empty_colors_are_dropped() {
        let params = validate(query(Some("hi"), Some(""), Some(""))).unwrap();
        assert_eq!(params.background, None);
        assert_eq!(params.color, None);
    }

    #[test]
    fn test_range_parsing() {
        assert_eq!(parse_range(None, 100), ByteRange::Full);
        assert_eq!(
            parse_range(Some("bytes=0-9"), 100),
            ByteRange::Partial { start: 0, end: 9 }
        );
        assert_eq!(
            parse_range(Some("bytes=90-"), 100),
            ByteRange::Partial { start: 90, end: 99 }
        );
        assert_eq!(
            parse_range(Some("bytes=50-500"), 100),
            ByteRange::Partial { start: 50, end: 99 }
        );
        assert_eq!(parse_range(Some("bytes=100-"), 100), ByteRange::Unsatisfiable);
        assert_eq!(parse_range(Some("bytes=0-1,4-5"), 100), ByteRange::Full);
        assert_eq!(parse_range(Some("items=0-1"), 100), ByteRange::Full);
    }

    #[test]
    fn test_video_range_response() {
        let asset = Bytes::from_static(b"0123456789");
        let response = respond(Artifact::Video, &Method::GET, Some("bytes=2-5"), asset);
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
    }

    #[test]
    fn test_head_has_no_body_but_full_length() {
        let asset = Bytes::from_static(b"0123456789");
        let response = respond(Artifact::Video, &Method::HEAD, None, asset);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    }
}
