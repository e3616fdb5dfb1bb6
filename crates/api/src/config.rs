use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use iot_health_core::registry::ChannelRegistry;
use iot_health_mqtt::{Credentials, MqttOptions};

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: IpAddr,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory served under `/static/icons`.
    pub icons_dir: PathBuf,
    /// JSON document listing the monitored topics.
    pub topics_file: PathBuf,
    /// Broker connection settings.
    pub mqtt: MqttOptions,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `5000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5000`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `ICONS_DIR`            | `icons`                    |
    /// | `MQTT_HOST`            | `localhost`                |
    /// | `MQTT_PORT`            | `1883`                     |
    /// | `MQTT_USER`            | unset                      |
    /// | `MQTT_PASSWORD`        | unset                      |
    /// | `MQTT_CLIENT_ID`       | `iot-health-<pid>`         |
    /// | `MQTT_KEEP_ALIVE_SECS` | `60`                       |
    /// | `MQTT_TOPICS_FILE`     | `topics.json`              |
    ///
    /// The binary layers command-line flags over the broker keys; see
    /// [`Args`](crate::cli::Args).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host: IpAddr = parse_var("HOST", var("HOST", "0.0.0.0"), "IP address")?;
        let port: u16 = parse_var("PORT", var("PORT", "5000"), "u16")?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|o| o.parse::<HeaderValue>().is_err())
        {
            return Err(ConfigError::InvalidCorsOrigin(bad.clone()));
        }

        let request_timeout_secs: u64 = parse_var(
            "REQUEST_TIMEOUT_SECS",
            var("REQUEST_TIMEOUT_SECS", "30"),
            "u64",
        )?;

        let mqtt_port: u16 = parse_var("MQTT_PORT", var("MQTT_PORT", "1883"), "u16")?;
        let keep_alive_secs: u16 = parse_var(
            "MQTT_KEEP_ALIVE_SECS",
            var("MQTT_KEEP_ALIVE_SECS", "60"),
            "u16",
        )?;
        let client_id = lookup("MQTT_CLIENT_ID")
            .unwrap_or_else(|| format!("iot-health-{}", std::process::id()));

        let mut mqtt = MqttOptions::new(var("MQTT_HOST", "localhost"), mqtt_port, client_id)
            .with_keep_alive(Duration::from_secs(u64::from(keep_alive_secs)));
        // Credentials are only sent when both halves are present.
        if let (Some(user), Some(password)) = (lookup("MQTT_USER"), lookup("MQTT_PASSWORD")) {
            mqtt = mqtt.with_credentials(Credentials::new(user, password));
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            icons_dir: PathBuf::from(var("ICONS_DIR", "icons")),
            topics_file: PathBuf::from(var("MQTT_TOPICS_FILE", "topics.json")),
            mqtt,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<T: FromStr>(
    var: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        })
}

/// Load the channel registry, degrading to an empty set on any error.
pub fn load_registry(path: &Path) -> ChannelRegistry {
    match ChannelRegistry::load(path) {
        Ok(registry) => {
            tracing::info!(path = %path.display(), channels = registry.len(), "Loaded topic configuration");
            registry
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not load topic configuration, monitoring no topics");
            ChannelRegistry::empty()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
