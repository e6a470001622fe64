//! Runtime configuration from environment variables.

use crate::location::providers::{DEFAULT_IPAPI_URL, DEFAULT_NOMINATIM_URL};
use thiserror::Error;

pub const ENV_NOMINATIM_URL: &str = "GEOTAX_NOMINATIM_URL";
pub const ENV_IPAPI_URL: &str = "GEOTAX_IPAPI_URL";
pub const ENV_USER_AGENT: &str = "GEOTAX_USER_AGENT";
pub const ENV_LOG: &str = "GEOTAX_LOG";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub nominatim_url: String,
    pub ipapi_url: String,
    pub user_agent: String,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            ipapi_url: DEFAULT_IPAPI_URL.to_string(),
            user_agent: default_user_agent(),
            log: "info".to_string(),
        }
    }
}

fn default_user_agent() -> String {
    format!("geotax/{} (sales-tax-estimator)", env!("CARGO_PKG_VERSION"))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let nominatim_url = match non_empty(ENV_NOMINATIM_URL) {
            Some(raw) => validate_url(ENV_NOMINATIM_URL, &raw)?,
            None => defaults.nominatim_url,
        };
        let ipapi_url = match non_empty(ENV_IPAPI_URL) {
            Some(raw) => validate_url(ENV_IPAPI_URL, &raw)?,
            None => defaults.ipapi_url,
        };

        Ok(Self {
            nominatim_url,
            ipapi_url,
            user_agent: non_empty(ENV_USER_AGENT).unwrap_or(defaults.user_agent),
            log: non_empty(ENV_LOG).unwrap_or(defaults.log),
        })
    }
}

/// Require an http(s) scheme and drop any trailing slash.
pub fn validate_url(var: &str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("'{}' is not an http(s) URL", trimmed),
        });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = from_map(&[]).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.nominatim_url, "https://nominatim.openstreetmap.org");
        assert!(cfg.user_agent.starts_with("geotax/"));
        assert_eq!(cfg.log, "info");
    }

    #[test]
    fn test_overrides() {
        let cfg = from_map(&[
            (ENV_NOMINATIM_URL, "http://localhost:8080/"),
            (ENV_USER_AGENT, "custom-agent"),
            (ENV_LOG, "geotax=debug"),
        ])
        .unwrap();
        assert_eq!(cfg.nominatim_url, "http://localhost:8080");
        assert_eq!(cfg.user_agent, "custom-agent");
        assert_eq!(cfg.log, "geotax=debug");
        assert_eq!(cfg.ipapi_url, DEFAULT_IPAPI_URL);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let cfg = from_map(&[(ENV_USER_AGENT, "  "), (ENV_IPAPI_URL, "")]).unwrap();
        assert_eq!(cfg.ipapi_url, DEFAULT_IPAPI_URL);
        assert!(cfg.user_agent.starts_with("geotax/"));
    }

    #[test]
    fn test_invalid_url() {
        let err = from_map(&[(ENV_IPAPI_URL, "ftp://example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == ENV_IPAPI_URL));
    }
}
