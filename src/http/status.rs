//! Status page resolution.
//!
//! # Responsibilities
//! - Map a status code to its page entry through a lookup table
//! - Choose JSON or page rendering from the request path
//! - Serve pre-authored pages from disk, with a built-in page as fallback
//!
//! # Design Decisions
//! - Unmapped codes >= 500 reuse the 500 entry, others the 400 entry
//! - The response keeps the requested status even when the entry is generic
//! - Missing page files are not errors; the built-in page is rendered

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::http::envelope;

/// Title and description for one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEntry {
    pub code: u16,
    pub title: &'static str,
    pub message: &'static str,
}

const fn entry(code: u16, title: &'static str, message: &'static str) -> PageEntry {
    PageEntry {
        code,
        title,
        message,
    }
}

static PAGES: &[PageEntry] = &[
    entry(400, "Bad Request", "The request could not be understood by the server."),
    entry(401, "Unauthorized", "Authentication is required to access this resource."),
    entry(402, "Payment Required", "Payment is required to access this resource."),
    entry(403, "Forbidden", "You do not have permission to access this resource."),
    entry(404, "Not Found", "The requested resource could not be found."),
    entry(405, "Method Not Allowed", "The request method is not supported for this resource."),
    entry(406, "Not Acceptable", "The resource cannot produce an acceptable response."),
    entry(407, "Proxy Authentication Required", "Authenticate with the proxy first."),
    entry(408, "Request Timeout", "The server timed out waiting for the request."),
    entry(409, "Conflict", "The request conflicts with the current state of the resource."),
    entry(410, "Gone", "The requested resource is no longer available."),
    entry(411, "Length Required", "The request must specify a Content-Length."),
    entry(412, "Precondition Failed", "A precondition in the request was not met."),
    entry(413, "Payload Too Large", "The request body is larger than the server allows."),
    entry(414, "URI Too Long", "The request URI is longer than the server allows."),
    entry(415, "Unsupported Media Type", "The request body format is not supported."),
    entry(416, "Range Not Satisfiable", "The requested range cannot be served."),
    entry(417, "Expectation Failed", "The Expect header could not be satisfied."),
    entry(418, "I'm a teapot", "The server refuses to brew coffee with a teapot."),
    entry(421, "Misdirected Request", "The request was sent to the wrong server."),
    entry(422, "Unprocessable Entity", "The request was well-formed but semantically invalid."),
    entry(423, "Locked", "The resource is locked."),
    entry(424, "Failed Dependency", "A request this one depended on failed."),
    entry(425, "Too Early", "The server is unwilling to process a replayable request."),
    entry(426, "Upgrade Required", "Switch to a different protocol to continue."),
    entry(428, "Precondition Required", "The request must be conditional."),
    entry(429, "Too Many Requests", "You have sent too many requests. Please slow down."),
    entry(431, "Request Header Fields Too Large", "The request headers are too large."),
    entry(451, "Unavailable For Legal Reasons", "The resource is unavailable for legal reasons."),
    entry(500, "Internal Server Error", "The server encountered an unexpected condition."),
    entry(501, "Not Implemented", "The server does not support this functionality."),
    entry(502, "Bad Gateway", "An upstream server returned an invalid response."),
    entry(503, "Service Unavailable", "The service is temporarily unavailable."),
    entry(504, "Gateway Timeout", "An upstream server did not respond in time."),
    entry(505, "HTTP Version Not Supported", "The HTTP version is not supported."),
    entry(506, "Variant Also Negotiates", "The server has a content negotiation loop."),
    entry(507, "Insufficient Storage", "The server cannot store the representation."),
    entry(508, "Loop Detected", "The server detected an infinite loop."),
    entry(510, "Not Extended", "Further extensions are required to fulfil the request."),
    entry(511, "Network Authentication Required", "Authenticate to gain network access."),
];

const MAINTENANCE: PageEntry = entry(
    503,
    "Under Maintenance",
    "We are performing scheduled maintenance. Please check back soon.",
);

/// How a status is rendered for a given request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering {
    Json,
    Page,
}

/// Status code → page lookup plus on-disk page directory.
#[derive(Debug, Clone)]
pub struct StatusPages {
    dir: PathBuf,
    table: HashMap<u16, &'static PageEntry>,
}

impl StatusPages {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            table: PAGES.iter().map(|e| (e.code, e)).collect(),
        }
    }

    /// Entry for `code`, or the generic 4xx/5xx entry when unmapped.
    pub fn entry(&self, code: u16) -> &'static PageEntry {
        if let Some(&entry) = self.table.get(&code) {
            return entry;
        }
        let generic = if code >= 500 { 500 } else { 400 };
        self.table[&generic]
    }

    /// Render `status` as JSON or as a page.
    pub async fn render(
        &self,
        status: StatusCode,
        rendering: Rendering,
        attribution: &str,
    ) -> Response {
        match rendering {
            Rendering::Json => {
                let entry = self.entry(status.as_u16());
                let body = envelope::error_body(attribution, entry.title, entry.message);
                (status, Json(body)).into_response()
            }
            Rendering::Page => self.page(status).await,
        }
    }

    /// Always render the page, even for API-like paths.
    pub async fn page(&self, status: StatusCode) -> Response {
        let entry = self.entry(status.as_u16());
        let class = if entry.code >= 500 { "5xx" } else { "4xx" };
        let file = self.dir.join(class).join(format!("{}.html", entry.code));
        self.serve(status, &file, entry).await
    }

    pub async fn maintenance_page(&self) -> Response {
        let file = self.dir.join("maintenance").join("maintenance.html");
        self.serve(StatusCode::SERVICE_UNAVAILABLE, &file, &MAINTENANCE)
            .await
    }

    async fn serve(&self, status: StatusCode, file: &Path, entry: &PageEntry) -> Response {
        match tokio::fs::read_to_string(file).await {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::trace!(file = %file.display(), error = %e, "Using built-in status page");
                (
                    status,
                    [(header::CACHE_CONTROL, "no-store")],
                    Html(builtin_page(status.as_u16(), entry)),
                )
                    .into_response()
            }
        }
    }
}

fn builtin_page(code: u16, entry: &PageEntry) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{code} {title}</title>\n</head>\n<body>\n<main>\n\
         <h1>{code}</h1>\n<h2>{title}</h2>\n<p>{message}</p>\n\
         <a href=\"/\">Back to home</a>\n</main>\n</body>\n</html>\n",
        code = code,
        title = entry.title,
        message = entry.message,
    )
}
