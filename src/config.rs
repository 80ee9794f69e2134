use crate::constants::{
    APP_CONFIG_ENV_VAR, DEFAULT_APP_CONFIG_PATH, DEFAULT_MAX_RESULTS, DEFAULT_PLUGIN_CONFIG_PATH,
};
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Application configuration read from `config.toml`. Every section and
/// field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub lookup: LookupConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    pub max_results: usize,
    /// Plugin configuration document. A missing file enables every built-in.
    pub plugin_config: PathBuf,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            plugin_config: PathBuf::from(DEFAULT_PLUGIN_CONFIG_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_name: String,
    /// Used when `RUST_LOG` is not set.
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "product-lookup.log".to_string(),
            default_filter: "product_lookup=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics on this address when set.
    pub listen_addr: Option<SocketAddr>,
}

impl AppConfig {
    /// Load from `$PRODUCT_LOOKUP_CONFIG`, falling back to `config.toml`.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(APP_CONFIG_ENV_VAR)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_APP_CONFIG_PATH));
        Self::load_from(path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::parse(
            r#"
            [lookup]
            max_results = 5

            [metrics]
            listen_addr = "127.0.0.1:9898"
            "#,
        )
        .unwrap();

        assert_eq!(config.lookup.max_results, 5);
        assert_eq!(config.lookup.plugin_config, PathBuf::from("plugins.json"));
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(
            config.metrics.listen_addr,
            Some("127.0.0.1:9898".parse().unwrap())
        );
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[lookup\nmax_results = ").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Toml(_))));
    }
}
