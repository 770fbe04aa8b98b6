//! Proxy-aware client address resolution.

use std::net::SocketAddr;

use axum::{body::Body, extract::ConnectInfo, http::Request};

/// Identity used by the anonymous limiter.
///
/// With `trust_forwarded` the first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`. Otherwise, or when neither header is usable, the socket
/// address recorded by the server. `"unknown"` when none is available.
pub fn client_ip(request: &Request<Body>, trust_forwarded: bool) -> String {
    let headers = request.headers();

    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_socket(builder: axum::http::request::Builder) -> Request<Body> {
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("192.0.2.7:5000".parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn test_first_forwarded_entry_wins() {
        let req = with_socket(
            Request::builder().header("x-forwarded-for", " 203.0.113.5 , 10.0.0.1, 10.0.0.2"),
        );
        assert_eq!(client_ip(&req, true), "203.0.113.5");
    }

    #[test]
    fn test_untrusted_headers_are_ignored() {
        let req = with_socket(
            Request::builder()
                .header("x-forwarded-for", "203.0.113.5")
                .header("x-real-ip", "203.0.113.6"),
        );
        assert_eq!(client_ip(&req, false), "192.0.2.7");
    }

    #[test]
    fn test_real_ip_then_socket_fallback() {
        let req = with_socket(Request::builder().header("x-real-ip", "203.0.113.6"));
        assert_eq!(client_ip(&req, true), "203.0.113.6");

        let req = with_socket(Request::builder().header("x-forwarded-for", ""));
        assert_eq!(client_ip(&req, true), "192.0.2.7");
    }

    #[test]
    fn test_unknown_without_connect_info() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req, true), "unknown");
    }
}
