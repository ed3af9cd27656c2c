//! Framework Settings Module
//!
//! Provides settings loading for the Trellis runner and endpoints.
//! Supports loading from TOML files with `TRELLIS_` environment overrides.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the JDBC auto-handle query list
/// (semicolon separated patterns).
pub const AUTO_HANDLE_QUERY_ENV: &str = "TRELLIS_JDBC_AUTO_HANDLE_QUERY";

/// Main settings structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct FrameworkSettings {
    /// Framework wide defaults
    pub defaults: DefaultSettings,

    /// Suite runner settings
    pub suite: SuiteSettings,

    /// Embedded database server settings
    pub jdbc: JdbcSettings,

    /// Declarative endpoint definitions
    pub endpoints: HashMap<String, EndpointSettings>,
}

/// Framework wide defaults
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DefaultSettings {
    pub receive_timeout_ms: u64,
    pub polling_interval_ms: u64,
    pub receive_timeout_expectation_ms: u64,
    pub async_completion_timeout_ms: u64,
}

/// Suite runner settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SuiteSettings {
    /// Test cases run concurrently, each with its own context
    pub concurrency: usize,

    /// Directory receiving the JSON suite report
    pub report_dir: Option<PathBuf>,
}

/// Embedded database server settings
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct JdbcSettings {
    /// Semicolon separated auto-handle query patterns
    pub auto_handle_query: Option<String>,

    pub max_connections: Option<usize>,
}

/// Declarative endpoint definition
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EndpointSettings {
    #[serde(rename = "type")]
    pub kind: EndpointKind,

    /// Queue shared between the two sides of a direct endpoint
    pub queue: Option<String>,

    pub timeout_ms: Option<u64>,
    pub polling_interval_ms: Option<u64>,

    /// Custom correlation, default is the message id
    pub correlator: Option<CorrelatorSettings>,
}

/// Supported endpoint kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// One-way in-memory queue
    Direct,
    /// Request/reply over an in-memory queue and reply store
    DirectSync,
}

/// Header based correlation
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CorrelatorSettings {
    pub headers: Vec<String>,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            receive_timeout_ms: defaults::endpoint::TIMEOUT_MS,
            polling_interval_ms: defaults::endpoint::POLLING_INTERVAL_MS,
            receive_timeout_expectation_ms: defaults::actions::RECEIVE_TIMEOUT_EXPECTATION_MS,
            async_completion_timeout_ms: defaults::actions::ASYNC_COMPLETION_TIMEOUT_MS,
        }
    }
}

impl Default for SuiteSettings {
    fn default() -> Self {
        Self {
            concurrency: defaults::runner::SUITE_CONCURRENCY,
            report_dir: None,
        }
    }
}

impl DefaultSettings {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn async_completion_timeout(&self) -> Duration {
        Duration::from_millis(self.async_completion_timeout_ms)
    }
}

impl JdbcSettings {
    /// Resolve the effective auto-handle patterns.
    ///
    /// Precedence: `TRELLIS_JDBC_AUTO_HANDLE_QUERY`, then the settings file,
    /// then the patterns configured on the server itself.
    pub fn auto_handle_queries(&self, configured: &[String]) -> Vec<String> {
        let raw = std::env::var(AUTO_HANDLE_QUERY_ENV)
            .ok()
            .or_else(|| self.auto_handle_query.clone());

        match raw {
            Some(list) => split_patterns(&list),
            None => configured
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

impl EndpointSettings {
    pub fn timeout(&self, defaults: &DefaultSettings) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(defaults.receive_timeout_ms))
    }

    pub fn polling_interval(&self, defaults: &DefaultSettings) -> Duration {
        Duration::from_millis(
            self.polling_interval_ms
                .unwrap_or(defaults.polling_interval_ms),
        )
    }
}

impl FrameworkSettings {
    /// Load settings from an optional TOML file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let expanded = expand_path(path)?;
            info!("Loading framework settings: {:?}", expanded);
            builder = builder.add_source(File::from(expanded).required(true));
        }

        // Override with environment variables (TRELLIS_ prefix, `__` separates sections)
        builder = builder.add_source(
            Environment::with_prefix("TRELLIS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder
            .build()
            .context("Failed to build framework settings")?
            .try_deserialize()
            .context("Failed to deserialize framework settings")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from an inline TOML document (no environment overrides)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .context("Failed to parse framework settings")?
            .try_deserialize()
            .context("Failed to deserialize framework settings")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate value ranges and endpoint definitions
    pub fn validate(&self) -> Result<()> {
        if self.defaults.polling_interval_ms == 0 {
            bail!("polling_interval_ms must be greater than 0");
        }

        if self.suite.concurrency == 0 {
            bail!("suite concurrency must be greater than 0");
        }

        for (name, endpoint) in &self.endpoints {
            if endpoint.queue.as_deref().map_or(true, str::is_empty) {
                bail!("endpoint '{}' requires a queue name", name);
            }
            if endpoint.polling_interval_ms == Some(0) {
                bail!("endpoint '{}' polling_interval_ms must be greater than 0", name);
            }
            if let Some(correlator) = &endpoint.correlator {
                if correlator.headers.is_empty() {
                    bail!("endpoint '{}' correlator requires at least one header", name);
                }
            }
        }

        debug!("Validated settings with {} endpoints", self.endpoints.len());
        Ok(())
    }

    /// Get a declared endpoint
    pub fn endpoint(&self, name: &str) -> Option<&EndpointSettings> {
        self.endpoints.get(name)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).context("Failed to expand settings path")?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Convenience function to load settings from an optional file
pub fn load_settings(path: Option<&Path>) -> Result<FrameworkSettings> {
    FrameworkSettings::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let settings = FrameworkSettings::from_toml_str("").unwrap();

        assert_eq!(settings.defaults.receive_timeout_ms, 5_000);
        assert_eq!(settings.defaults.polling_interval_ms, 500);
        assert_eq!(settings.suite.concurrency, 1);
        assert!(settings.endpoints.is_empty());
    }

    #[test]
    fn test_load_settings_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trellis.toml");

        let content = r#"
[defaults]
receive_timeout_ms = 2000
polling_interval_ms = 50

[suite]
concurrency = 4

[endpoints.orders]
type = "direct_sync"
queue = "orders.inbound"
timeout_ms = 300

[endpoints.orders.correlator]
headers = ["operation", "sequence"]
"#;
        fs::write(&path, content).unwrap();

        let settings = FrameworkSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.defaults.polling_interval_ms, 50);
        assert_eq!(settings.suite.concurrency, 4);

        let orders = settings.endpoint("orders").unwrap();
        assert_eq!(orders.kind, EndpointKind::DirectSync);
        assert_eq!(orders.timeout(&settings.defaults), Duration::from_millis(300));
        assert_eq!(
            orders.polling_interval(&settings.defaults),
            Duration::from_millis(50)
        );
        assert_eq!(
            orders.correlator.as_ref().unwrap().headers,
            vec!["operation".to_string(), "sequence".to_string()]
        );
    }

    #[test]
    fn test_endpoint_without_queue_is_rejected() {
        let content = r#"
[endpoints.broken]
type = "direct"
"#;
        let err = FrameworkSettings::from_toml_str(content).unwrap_err();
        assert!(err.to_string().contains("requires a queue name"));
    }

    #[test]
    fn test_zero_polling_interval_is_rejected() {
        let content = r#"
[defaults]
polling_interval_ms = 0
"#;
        assert!(FrameworkSettings::from_toml_str(content).is_err());
    }

    #[test]
    fn test_auto_handle_queries_from_settings() {
        let jdbc = JdbcSettings {
            auto_handle_query: Some("SELECT 1; ;VALUES 1 ".to_string()),
            max_connections: None,
        };

        if std::env::var(AUTO_HANDLE_QUERY_ENV).is_err() {
            assert_eq!(
                jdbc.auto_handle_queries(&["ignored".to_string()]),
                vec!["SELECT 1".to_string(), "VALUES 1".to_string()]
            );
        }
    }

    #[test]
    fn test_auto_handle_queries_fall_back_to_configured() {
        let jdbc = JdbcSettings::default();

        if std::env::var(AUTO_HANDLE_QUERY_ENV).is_err() {
            let configured = vec![" SELECT 1 ".to_string(), String::new()];
            assert_eq!(jdbc.auto_handle_queries(&configured), vec!["SELECT 1".to_string()]);
        }
    }
}
