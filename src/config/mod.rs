//! Configuration management for stockwatch
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::DEFAULT_INTERVAL_MINUTES;
use crate::notifications::WebhookConfig;
use crate::scheduler::RegistryConfig;

/// Desktop browser user agent sent by the renderer
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Monitoring engine configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Page renderer configuration
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Notification gateway configuration
    pub notification: NotificationConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP API configuration
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Monitoring engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Maximum number of checks running at once
    pub max_concurrent: usize,

    /// Interval for items without a positive interval, in minutes
    pub default_interval_minutes: i64,

    /// Upper bound on a single render, in seconds
    pub render_timeout_secs: u64,
}

/// Page renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Rate limit (requests per second)
    pub requests_per_second: u32,

    /// User agent string
    pub user_agent: String,

    /// Query parameter that carries the location filter, if any
    pub location_param: Option<String>,
}

/// Notification gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Gateway endpoint
    pub api_url: String,

    /// Gateway API key
    pub api_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_notification_timeout")]
    pub timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required by protected endpoints
    pub api_key: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

fn default_notification_timeout() -> u64 {
    10
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

fn default_port() -> u16 {
    3000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            default_interval_minutes: DEFAULT_INTERVAL_MINUTES,
            render_timeout_secs: 90,
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            requests_per_second: 2,
            user_agent: String::from(DEFAULT_USER_AGENT),
            location_param: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/stock-checker.db"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Fails listing every missing required variable at once.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
            value.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
        }

        let defaults = Self::default();
        let mut missing = Vec::new();
        let mut required = |key: &'static str| match lookup(key).filter(|v| !v.trim().is_empty()) {
            Some(value) => value,
            None => {
                missing.push(key);
                String::new()
            }
        };

        let api_url = required("NOTIFICATION_API_URL");
        let notification_key = required("NOTIFICATION_API_KEY");
        let server_key = required("API_KEY");

        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            );
        }

        Ok(Self {
            monitor: MonitorConfig {
                max_concurrent: parsed(
                    lookup("STOCKWATCH_MAX_CONCURRENT"),
                    defaults.monitor.max_concurrent,
                ),
                default_interval_minutes: parsed(
                    lookup("STOCKWATCH_DEFAULT_INTERVAL"),
                    defaults.monitor.default_interval_minutes,
                ),
                render_timeout_secs: parsed(
                    lookup("STOCKWATCH_RENDER_TIMEOUT"),
                    defaults.monitor.render_timeout_secs,
                ),
            },
            renderer: RendererConfig {
                request_timeout_secs: parsed(
                    lookup("STOCKWATCH_REQUEST_TIMEOUT"),
                    defaults.renderer.request_timeout_secs,
                ),
                requests_per_second: parsed(
                    lookup("STOCKWATCH_RATE_LIMIT"),
                    defaults.renderer.requests_per_second,
                ),
                user_agent: lookup("STOCKWATCH_USER_AGENT")
                    .unwrap_or(defaults.renderer.user_agent),
                location_param: lookup("STOCKWATCH_LOCATION_PARAM").filter(|v| !v.is_empty()),
            },
            notification: NotificationConfig {
                api_url,
                api_key: notification_key,
                timeout_secs: parsed(
                    lookup("NOTIFICATION_TIMEOUT"),
                    default_notification_timeout(),
                ),
            },
            database: DatabaseConfig {
                sqlite_path: lookup("STOCKWATCH_SQLITE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.database.sqlite_path),
            },
            server: ServerConfig {
                host: lookup("HOST").unwrap_or(defaults.server.host),
                port: parsed(lookup("PORT"), defaults.server.port),
                api_key: server_key,
            },
            logging: LoggingConfig {
                level: lookup("STOCKWATCH_LOG_LEVEL").unwrap_or(defaults.logging.level),
                format: lookup("STOCKWATCH_LOG_FORMAT").unwrap_or(defaults.logging.format),
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.monitor.max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be greater than 0");
        }

        if self.monitor.default_interval_minutes <= 0 {
            anyhow::bail!("default_interval_minutes must be positive");
        }

        if self.monitor.render_timeout_secs == 0 {
            anyhow::bail!("render_timeout_secs must be greater than 0");
        }

        if self.renderer.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.renderer.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        self.webhook()
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid notification config: {e}"))?;

        if self.server.api_key.is_empty() {
            anyhow::bail!("server api_key must not be empty");
        }

        Ok(())
    }

    /// Get render timeout as Duration
    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.render_timeout_secs)
    }

    /// Registry settings derived from the monitor section
    #[must_use]
    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            max_concurrent: self.monitor.max_concurrent,
            default_interval_minutes: self.monitor.default_interval_minutes,
        }
    }

    /// Gateway settings derived from the notification section
    #[must_use]
    pub fn webhook(&self) -> WebhookConfig {
        WebhookConfig::new(&self.notification.api_url, &self.notification.api_key)
            .with_timeout(self.notification.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("NOTIFICATION_API_URL", "https://sms.example.com/send"),
        ("NOTIFICATION_API_KEY", "gateway-key"),
        ("API_KEY", "server-key"),
    ];

    #[test]
    fn test_defaults_from_env() {
        let config = Config::from_lookup(lookup(REQUIRED)).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitor.max_concurrent, 3);
        assert_eq!(config.monitor.default_interval_minutes, 5);
        assert_eq!(config.render_timeout(), Duration::from_secs(90));
        assert_eq!(config.notification.timeout_secs, 10);
        assert_eq!(config.server.port, 3000);
        assert_eq!(
            config.database.sqlite_path,
            PathBuf::from("data/stock-checker.db")
        );
    }

    #[test]
    fn test_all_missing_required_vars_reported() {
        let err = Config::from_lookup(lookup(&[("API_KEY", "x")])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("NOTIFICATION_API_URL"));
        assert!(message.contains("NOTIFICATION_API_KEY"));
        assert!(!message.contains("API_KEY,"));
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("STOCKWATCH_MAX_CONCURRENT", "8"));
        vars.push(("PORT", "not-a-port"));
        vars.push(("STOCKWATCH_LOCATION_PARAM", "pincode"));

        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.monitor.max_concurrent, 8);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.renderer.location_param.as_deref(), Some("pincode"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = Config::from_lookup(lookup(REQUIRED)).unwrap();

        let mut config = base.clone();
        config.monitor.max_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.notification.api_url = "ftp://sms.example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = base;
        config.renderer.requests_per_second = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_needs_credentials() {
        assert!(Config::default().validate().is_err());
    }
}
