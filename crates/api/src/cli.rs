//! Command-line flags for the broker connection and topics file.
//!
//! Every flag falls back to its environment variable, and anything left
//! unset falls back to the [`ServerConfig`] default.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, ServerConfig};

#[derive(Parser)]
#[command(name = "iot-health-api")]
#[command(version, about = "MQTT IoT topic health checker", long_about = None)]
pub struct Args {
    /// MQTT broker hostname or IP (default: localhost).
    #[arg(long, env = "MQTT_HOST")]
    pub host: Option<String>,

    /// MQTT broker port (default: 1883).
    #[arg(long, env = "MQTT_PORT")]
    pub port: Option<u16>,

    /// MQTT broker username.
    #[arg(long, env = "MQTT_USER")]
    pub user: Option<String>,

    /// MQTT broker password.
    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// JSON file containing the topics to monitor (default: topics.json).
    #[arg(long, env = "MQTT_TOPICS_FILE")]
    pub topics_file: Option<PathBuf>,
}

impl Args {
    /// Value given on the command line (or its env var) for a config key.
    pub fn value_for(&self, key: &str) -> Option<String> {
        match key {
            "MQTT_HOST" => self.host.clone(),
            "MQTT_PORT" => self.port.map(|p| p.to_string()),
            "MQTT_USER" => self.user.clone(),
            "MQTT_PASSWORD" => self.password.clone(),
            "MQTT_TOPICS_FILE" => self
                .topics_file
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            _ => None,
        }
    }

    /// Build the server configuration: flags first, then the environment.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        ServerConfig::from_lookup(|key| self.value_for(key).or_else(|| std::env::var(key).ok()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn flags_parse_into_broker_settings() {
        let args = Args::try_parse_from([
            "iot-health-api",
            "--host",
            "broker.lan",
            "--port",
            "8883",
            "--user",
            "monitor",
            "--password",
            "s3cret",
            "--topics-file",
            "/etc/iot/topics.json",
        ])
        .unwrap();

        let config = ServerConfig::from_lookup(|key| args.value_for(key)).unwrap();

        assert_eq!(config.mqtt.host, "broker.lan");
        assert_eq!(config.mqtt.port, 8883);
        let creds = config.mqtt.credentials.as_ref().unwrap();
        assert_eq!(creds.username, "monitor");
        assert_eq!(creds.password(), "s3cret");
        assert_eq!(config.topics_file, Path::new("/etc/iot/topics.json"));
    }

    #[test]
    fn flags_only_cover_broker_keys() {
        let args = Args::try_parse_from(["iot-health-api", "--host", "broker.lan"]).unwrap();

        assert_eq!(args.value_for("MQTT_HOST").as_deref(), Some("broker.lan"));
        assert_eq!(args.value_for("PORT"), None);
        assert_eq!(args.value_for("HOST"), None);
    }

    #[test]
    fn invalid_port_flag_is_rejected() {
        assert!(Args::try_parse_from(["iot-health-api", "--port", "70000"]).is_err());
    }
}
