//! Security response headers.
//!
//! # Responsibilities
//! - Forbid MIME sniffing and framing
//! - Enable legacy XSS filtering
//! - Restrict referrer leakage
//!
//! # Design Decisions
//! - Applied outside every gate, so denials carry the headers too
//! - Overwrites whatever a handler set for the same names

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};

const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}
