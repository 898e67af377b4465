//! Logging configuration from environment variables.

use std::env;

/// Configuration for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Service name attached to the startup line.
    pub service_name: String,

    /// Filter directive (`info`, `hydrabase=debug,hb_02_peer_protocol=trace`, ...).
    pub log_level: String,

    /// Emit one JSON object per line instead of human-readable output.
    pub json_logs: bool,

    /// Colored output for the human-readable format.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "hydrabase".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `HB_LOG_LEVEL` or `RUST_LOG`: filter directive (default: info)
    /// - `HB_LOG_JSON`: JSON lines (default: false, true in containers)
    /// - `NO_COLOR`: disable colored output when set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();
        let defaults = Self::default();

        Self {
            service_name: defaults.service_name,

            log_level: lookup("HB_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.log_level),

            json_logs: lookup("HB_LOG_JSON")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(is_container),

            ansi: lookup("NO_COLOR").is_none(),
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::from_lookup(lookup(&[]));
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn test_hb_log_level_wins_over_rust_log() {
        let config = LoggingConfig::from_lookup(lookup(&[("HB_LOG_LEVEL", "debug"), ("RUST_LOG", "warn")]));
        assert_eq!(config.log_level, "debug");
        let config = LoggingConfig::from_lookup(lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_json_in_containers() {
        assert!(LoggingConfig::from_lookup(lookup(&[("DOCKER_CONTAINER", "1")])).json_logs);
        assert!(!LoggingConfig::from_lookup(lookup(&[("DOCKER_CONTAINER", "1"), ("HB_LOG_JSON", "false")])).json_logs);
        assert!(LoggingConfig::from_lookup(lookup(&[("HB_LOG_JSON", "TRUE")])).json_logs);
    }
}
