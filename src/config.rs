use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, WebhookError};
use crate::utils::{get_env_with_prefix, vars_with_prefix};

/// Default request body limit (1MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Environment variable prefix for receiver secrets, followed by the
/// receiver name (e.g. `TIDEHOOK_WEBHOOK_RECEIVER_SECRET_GITHUB`)
pub const RECEIVER_SECRET_ENV_PREFIX: &str = "WEBHOOK_RECEIVER_SECRET_";

/// Main configuration for a webhook receiver application
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum webhook body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    /// Path the receiver routes are nested under
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
    /// Per-request timeout in seconds; 0 disables it
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Receiver name to secret configuration (`secret0, id1=secret1`)
    #[serde(default)]
    pub receivers: HashMap<String, String>,
}

// receiver secrets are listed by name only
impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut receivers: Vec<&String> = self.receivers.keys().collect();
        receivers.sort();
        f.debug_struct("WebhookConfig")
            .field("path_prefix", &self.path_prefix)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("receivers", &receivers)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path_prefix: default_path_prefix(),
            timeout_seconds: default_timeout_seconds(),
            receivers: HashMap::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

fn default_path_prefix() -> String {
    "/webhooks/incoming".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl WebhookConfig {
    /// Request timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.server.max_body_size = max_body_size;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.webhooks.path_prefix = prefix.into();
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.webhooks.timeout_seconds = seconds;
        self
    }

    /// Set the secret configuration string for a receiver
    pub fn with_receiver_secret(mut self, receiver: impl AsRef<str>, secrets: impl Into<String>) -> Self {
        self.config
            .webhooks
            .receivers
            .insert(receiver.as_ref().to_ascii_lowercase(), secrets.into());
        self
    }

    /// Load configuration from environment variables with TIDEHOOK_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = get_env_with_prefix("PORT") {
            if let Ok(p) = port.parse() {
                self.config.server.port = p;
            }
        }
        if let Some(max_body_size) = get_env_with_prefix("MAX_BODY_SIZE") {
            if let Ok(size) = max_body_size.parse() {
                self.config.server.max_body_size = size;
            }
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Some(prefix) = get_env_with_prefix("WEBHOOK_PATH_PREFIX") {
            self.config.webhooks.path_prefix = prefix;
        }
        if let Some(seconds) = get_env_with_prefix("WEBHOOK_TIMEOUT_SECONDS") {
            if let Ok(s) = seconds.parse() {
                self.config.webhooks.timeout_seconds = s;
            }
        }

        for (name, secrets) in vars_with_prefix(RECEIVER_SECRET_ENV_PREFIX) {
            self.config
                .webhooks
                .receivers
                .insert(name.to_ascii_lowercase(), secrets);
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid server address, log
    /// level, port, body size or path prefix. Receiver secrets are checked
    /// when the application is built, against each receiver's own bounds.
    pub fn build(self) -> Result<Config> {
        self.config.server.addr().map_err(|e| {
            WebhookError::configuration(format!(
                "Invalid server address {}:{} - {}",
                self.config.server.host, self.config.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(WebhookError::configuration(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.config.server.port == 0 {
            return Err(WebhookError::configuration("Server port must be greater than 0"));
        }

        if self.config.server.max_body_size == 0 {
            return Err(WebhookError::configuration(
                "Maximum body size must be greater than 0",
            ));
        }

        let prefix = &self.config.webhooks.path_prefix;
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            return Err(WebhookError::configuration(format!(
                "Webhook path prefix must start with '/' and not end with '/', got: {}",
                prefix
            )));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
