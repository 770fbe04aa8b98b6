//! API-like path classification.

/// Prefixes marking the programmatic surface.
///
/// Classification decides how errors, maintenance and 429/503 responses are
/// shaped, and where key enforcement applies.
#[derive(Debug, Clone)]
pub struct ApiPaths {
    prefixes: Vec<String>,
}

impl ApiPaths {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_api(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self::new(["/api/", "/ai/", "/maker/", "/random/"])
    }
}
