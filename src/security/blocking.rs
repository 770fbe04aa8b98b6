//! Path-access blocking.
//!
//! Internal files that sit under publicly routed directories are refused
//! with the 403 page before any handler sees the request.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Debug, Clone, Default)]
pub struct PathBlocklist {
    prefixes: Vec<String>,
    exact: Vec<String>,
}

impl PathBlocklist {
    /// Entries ending in `/` block everything below them; others block
    /// exactly one path.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (prefixes, exact) = entries
            .into_iter()
            .map(Into::into)
            .partition(|entry: &String| entry.ends_with('/'));
        Self { prefixes, exact }
    }

    pub fn is_blocked(&self, path: &str) -> bool {
        self.exact.iter().any(|p| p == path)
            || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

pub async fn blocking_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if state.blocklist.is_blocked(request.uri().path()) {
        tracing::warn!(
            path = %request.uri().path(),
            request_id = %request.request_id(),
            "Blocked path requested"
        );
        metrics::record_gate_denial("blocklist", "forbidden");
        return state.pages.page(StatusCode::FORBIDDEN).await;
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_exact_entries() {
        let blocklist = PathBlocklist::new(["/page/", "/src/settings.json"]);
        assert!(blocklist.is_blocked("/page/"));
        assert!(blocklist.is_blocked("/page/docs/index.html"));
        assert!(blocklist.is_blocked("/src/settings.json"));
        assert!(!blocklist.is_blocked("/src/settings.json.bak"));
        assert!(!blocklist.is_blocked("/src/images/logo.png"));
        assert!(!blocklist.is_blocked("/pages"));
    }
}
