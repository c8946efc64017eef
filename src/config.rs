//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::upstream::{ReconnectPolicy, Topic, TopicError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream MQTT broker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Capacity of the MQTT client's request queue
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_broker_host() -> String {
    "44.223.43.74".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_topic() -> String {
    "/TEF/posture001/attrs/jsonObject".to_string()
}

fn default_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("posture-relay-{}", &id[..8])
}

fn default_keep_alive() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_channel_capacity() -> usize {
    16
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            topic: default_topic(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl BrokerConfig {
    /// Broker address as `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Relay server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the dashboard files, served at `/`
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// First existing file among the default config locations
    pub fn discover() -> Option<PathBuf> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("posture-relay").join("config.toml")),
            Some(PathBuf::from("/etc/posture-relay/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        config_paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Validated upstream topic
    pub fn topic(&self) -> Result<Topic, ConfigError> {
        Topic::new(self.broker.topic.as_str()).map_err(ConfigError::Topic)
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Broker overrides
        if let Some(host) = lookup("POSTURE_RELAY_BROKER_HOST") {
            self.broker.host = host;
        }
        if let Some(port) = lookup("POSTURE_RELAY_BROKER_PORT") {
            if let Ok(p) = port.parse() {
                self.broker.port = p;
            }
        }
        if let Some(topic) = lookup("POSTURE_RELAY_TOPIC") {
            self.broker.topic = topic;
        }
        if let Some(client_id) = lookup("POSTURE_RELAY_CLIENT_ID") {
            self.broker.client_id = client_id;
        }

        // Server overrides
        if let Some(host) = lookup("POSTURE_RELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("POSTURE_RELAY_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(dir) = lookup("POSTURE_RELAY_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(dir));
        }

        // Logging overrides
        if let Some(level) = lookup("POSTURE_RELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("POSTURE_RELAY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid broker topic: {0}")]
    Topic(#[from] TopicError),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Posture Relay Configuration
#
# Environment variables override these settings:
# - POSTURE_RELAY_BROKER_HOST
# - POSTURE_RELAY_BROKER_PORT
# - POSTURE_RELAY_TOPIC
# - POSTURE_RELAY_CLIENT_ID
# - POSTURE_RELAY_HOST
# - POSTURE_RELAY_PORT
# - POSTURE_RELAY_STATIC_DIR
# - POSTURE_RELAY_LOG_LEVEL
# - POSTURE_RELAY_LOG_FORMAT

[broker]
# MQTT broker address
host = "44.223.43.74"
port = 1883

# Topic carrying the posture readings
topic = "/TEF/posture001/attrs/jsonObject"

# MQTT client id (random when omitted)
# client_id = "posture-relay"

# Keep-alive interval (seconds)
keep_alive_secs = 30

# Give up on a connect/subscribe attempt after this long (seconds)
connect_timeout_secs = 10

[server]
# Address the dashboard server listens on
host = "0.0.0.0"
port = 3000

# Directory with the dashboard files, served at /
# static_dir = "./public"

[reconnect]
# Delay before the first reconnect attempt (ms)
initial_delay_ms = 1000

# Upper bound for any single delay (ms)
max_delay_ms = 30000

# Growth per failed attempt; 1.0 keeps the delay fixed
multiplier = 2.0

# Random variation of each delay, 0.0 - 1.0
jitter_factor = 0.2

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.broker.host, "44.223.43.74");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.topic, "/TEF/posture001/attrs/jsonObject");
        assert!(config.broker.client_id.starts_with("posture-relay-"));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.addr(), "0.0.0.0:3000");
        assert!(config.server.static_dir.is_none());
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert!(config.topic().is_ok());
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.broker.endpoint(), "44.223.43.74:1883");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[broker]
host = "localhost"
topic = "chairs/42"

[server]
port = 8080
static_dir = "public"

[reconnect]
initial_delay_ms = 5000
multiplier = 1.0
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.topic().unwrap().as_str(), "chairs/42");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.static_dir, Some(PathBuf::from("public")));
        assert_eq!(config.reconnect.initial_delay_ms, 5000);
        assert_eq!(config.reconnect.multiplier, 1.0);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/posture-relay.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a port\"").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("POSTURE_RELAY_BROKER_HOST", "mqtt.local"),
            ("POSTURE_RELAY_BROKER_PORT", "8883"),
            ("POSTURE_RELAY_TOPIC", "chairs/7"),
            ("POSTURE_RELAY_PORT", "not-a-number"),
            ("POSTURE_RELAY_STATIC_DIR", "/srv/dashboard"),
            ("POSTURE_RELAY_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.broker.endpoint(), "mqtt.local:8883");
        assert_eq!(config.broker.topic, "chairs/7");
        // Unparseable values leave the previous setting in place
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.static_dir, Some(PathBuf::from("/srv/dashboard")));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_topic() {
        let mut config = Config::default();
        config.broker.topic = "chairs/#".to_string();
        assert!(matches!(config.topic(), Err(ConfigError::Topic(TopicError::Wildcard(_)))));
    }
}
