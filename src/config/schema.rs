//! Configuration schema definitions.
//!
//! This module defines the static configuration structure for the gateway.
//! All types derive Serde traits for deserialization from the TOML file.
//! The externally owned settings document lives in `settings.rs`.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, port search).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Where and how the settings document is read.
    pub settings: SettingsSourceConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Maintenance gate configuration.
    pub maintenance: MaintenanceConfig,

    /// Path-access blocking.
    pub access: AccessConfig,

    /// Path prefixes treated as the programmatic surface.
    pub api_prefixes: Vec<String>,

    /// Status page content.
    pub pages: PagesConfig,

    /// Attribution used when the settings document carries none.
    pub default_attribution: String,

    /// Content-generation services behind the proxy modules.
    pub upstreams: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            settings: SettingsSourceConfig::default(),
            rate_limit: RateLimitConfig::default(),
            maintenance: MaintenanceConfig::default(),
            access: AccessConfig::default(),
            api_prefixes: ["/api/", "/ai/", "/maker/", "/random/"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            pages: PagesConfig::default(),
            default_attribution: "Gateway Team".to_string(),
            upstreams: UpstreamConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Try successive ports when the configured one is taken.
    pub port_search: bool,

    /// How many successive ports to try.
    pub port_search_attempts: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            port_search: true,
            port_search_attempts: 10,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout applied by route handlers to their upstream calls.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 30,
        }
    }
}

/// How the settings document is kept current.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SettingsMode {
    /// Re-read the file on every gate evaluation.
    #[default]
    Fresh,
    /// Cache the document and reload it when the file changes.
    Watch,
}

/// Settings document source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsSourceConfig {
    /// Path to the JSON settings document.
    pub path: String,

    /// Reload strategy.
    pub mode: SettingsMode,

    /// Path to the JSON notifications document served by the system module.
    pub notifications_path: String,
}

impl Default for SettingsSourceConfig {
    fn default() -> Self {
        Self {
            path: "src/settings.json".to_string(),
            mode: SettingsMode::Fresh,
            notifications_path: "src/notifications.json".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum anonymous requests per IP per window.
    pub anonymous_max_requests: u64,

    /// Anonymous window length in milliseconds.
    pub anonymous_window_ms: u64,

    /// Policy used for API keys whose rate limit cannot be parsed.
    pub default_key_max_requests: u64,

    /// Window of the fallback API key policy in milliseconds.
    pub default_key_window_ms: u64,

    /// Use the first `X-Forwarded-For` entry as the client address.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            anonymous_max_requests: 50,
            anonymous_window_ms: 60_000,
            default_key_max_requests: 50,
            default_key_window_ms: 60_000,
            trust_forwarded_for: true,
        }
    }
}

/// Maintenance gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Prefixes that bypass maintenance mode.
    pub exempt_prefixes: Vec<String>,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            exempt_prefixes: [
                "/api/settings",
                "/assets/",
                "/src/",
                "/api/preview-image",
                "/src/sponsor.json",
                "/support",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
        }
    }
}

/// Path-access blocking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Entries ending in `/` block a prefix, others block one exact path.
    pub blocked_paths: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            blocked_paths: [
                "/page/",
                "/src/settings.json",
                "/src/notifications.json",
                "/page/styles.css",
                "/page/script.js",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
        }
    }
}

/// Status page content location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Directory holding `4xx/`, `5xx/` and `maintenance/` pages.
    pub dir: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            dir: "page/status".to_string(),
        }
    }
}

/// Upstream service endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Chat completion endpoint (POST `{"content": ...}`).
    pub luminai_url: String,

    /// Base URL of the brat image/video generator.
    pub brat_base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            luminai_url: "https://luminai.my.id/".to_string(),
            brat_base_url: "https://raolbyte-brat.hf.space".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.rate_limit.anonymous_max_requests, 50);
        assert_eq!(config.rate_limit.anonymous_window_ms, 60_000);
        assert_eq!(config.settings.mode, SettingsMode::Fresh);
        assert_eq!(config.api_prefixes.len(), 4);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: GatewayConfig = toml::from_str(
            r#"
            default_attribution = "Ops"

            [settings]
            mode = "watch"

            [rate_limit]
            anonymous_max_requests = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.default_attribution, "Ops");
        assert_eq!(config.settings.mode, SettingsMode::Watch);
        assert_eq!(config.rate_limit.anonymous_max_requests, 5);
        assert_eq!(config.rate_limit.anonymous_window_ms, 60_000);
    }
}
