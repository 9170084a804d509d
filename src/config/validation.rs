//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port range, timeouts, poll interval)
//! - Detect conflicting endpoint paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before a server instance allocates anything

use thiserror::Error;

use crate::config::schema::{normalize_path, ServerConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listen_host must not be empty")]
    EmptyHost,

    #[error("port_range.min must be at least 1")]
    ZeroPort,

    #[error("port_range is empty: min {min} > max {max}")]
    EmptyPortRange { min: u16, max: u16 },

    #[error("{field} must not be empty")]
    EmptyPath { field: &'static str },

    #[error("{field} segment `{segment}` would be read as a route parameter")]
    RouteParameter { field: &'static str, segment: String },

    #[error("webhook_path and health_path are both `{0}`")]
    ConflictingPaths(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen_host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    let range = config.port_range;
    if range.min == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if range.min > range.max {
        errors.push(ValidationError::EmptyPortRange {
            min: range.min,
            max: range.max,
        });
    }

    let webhook = normalize_path(&config.webhook_path);
    let health = normalize_path(&config.health_path);
    if webhook.is_empty() {
        errors.push(ValidationError::EmptyPath { field: "webhook_path" });
    }
    if health.is_empty() {
        errors.push(ValidationError::EmptyPath { field: "health_path" });
    }
    if let Some(segment) = route_parameter(&health) {
        errors.push(ValidationError::RouteParameter {
            field: "health_path",
            segment: segment.to_string(),
        });
    }
    if !webhook.is_empty() && webhook == health {
        errors.push(ValidationError::ConflictingPaths(webhook));
    }

    // A zero interval would turn every timed loop into a busy spin.
    if config.retry_interval_micros == 0 {
        errors.push(ValidationError::Zero { field: "retry_interval_micros" });
    }
    if config.startup_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "startup_timeout_secs" });
    }
    if config.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "max_body_bytes" });
    }
    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "request_timeout_secs" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// First segment of `path` the router would treat as a capture or wildcard.
fn route_parameter(path: &str) -> Option<&str> {
    path.split('/')
        .find(|segment| segment.starts_with([':', '*']) || segment.contains(['{', '}']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PortRange;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = ServerConfig::default();
        config.port_range = PortRange::new(60000, 50000);
        config.retry_interval_micros = 0;
        config.health_path = "/webhook".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::EmptyPortRange { min: 60000, max: 50000 }));
        assert!(errors.contains(&ValidationError::Zero { field: "retry_interval_micros" }));
        assert!(errors.contains(&ValidationError::ConflictingPaths("webhook".to_string())));
    }

    #[test]
    fn test_single_port_range_is_valid() {
        let mut config = ServerConfig::default();
        config.port_range = PortRange::new(55555, 55555);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_zero_port_and_empty_paths() {
        let mut config = ServerConfig::default();
        config.port_range = PortRange::new(0, 10);
        config.webhook_path = "/".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroPort));
        assert!(errors.contains(&ValidationError::EmptyPath { field: "webhook_path" }));
    }

    #[test]
    fn test_rejects_route_parameters_in_health_path() {
        for path in ["/:id", "status/*rest", "{probe}"] {
            let mut config = ServerConfig::default();
            config.health_path = path.to_string();

            let errors = validate_config(&config).unwrap_err();
            assert!(
                matches!(errors.as_slice(), [ValidationError::RouteParameter { field: "health_path", .. }]),
                "{path}: {errors:?}"
            );
        }

        let mut config = ServerConfig::default();
        config.health_path = "status/live".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
