//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, limits > 0)
//! - Validate path prefixes are absolute
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address must not be empty")]
    EmptyBindAddress,
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} entry '{value}' must start with '/'")]
    RelativePath { field: &'static str, value: String },
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::EmptyBindAddress);
    }

    let limits = &config.rate_limit;
    for (field, value) in [
        ("rate_limit.anonymous_max_requests", limits.anonymous_max_requests),
        ("rate_limit.anonymous_window_ms", limits.anonymous_window_ms),
        ("rate_limit.default_key_max_requests", limits.default_key_max_requests),
        ("rate_limit.default_key_window_ms", limits.default_key_window_ms),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let path_lists: [(&'static str, &[String]); 3] = [
        ("api_prefixes", &config.api_prefixes),
        ("maintenance.exempt_prefixes", &config.maintenance.exempt_prefixes),
        ("access.blocked_paths", &config.access.blocked_paths),
    ];
    for (field, entries) in path_lists {
        for value in entries.iter().filter(|v| !v.starts_with('/')) {
            errors.push(ValidationError::RelativePath {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
