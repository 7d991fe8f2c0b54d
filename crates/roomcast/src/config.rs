//! Relay configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Where the broker lives and which channel namespace the relay uses.
///
/// Every process that should share rooms must use the same broker and the
/// same `channel_namespace`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Broker host name or address.
    pub broker_host: String,

    /// Broker port, kept as a string the way it appears in options maps.
    pub broker_port: String,

    /// Prefix of every relay channel (`<namespace>#<origin>`).
    pub channel_namespace: String,
}

impl RelayConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: &'static str = "6379";
    pub const DEFAULT_NAMESPACE: &'static str = "socket.io";

    /// Builds a config from a string options map.
    ///
    /// Recognized keys are `host`, `port`, and `prefix`. Missing keys fall
    /// back to the defaults; values are taken as-is.
    pub fn from_options(options: &HashMap<String, String>) -> Self {
        let pick = |key: &str, default: &str| {
            options
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_owned())
        };
        Self {
            broker_host: pick("host", Self::DEFAULT_HOST),
            broker_port: pick("port", Self::DEFAULT_PORT),
            channel_namespace: pick("prefix", Self::DEFAULT_NAMESPACE),
        }
    }

    /// The broker address as `host:port`.
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }

    /// The broker address as a Redis connection URL.
    pub fn broker_url(&self) -> String {
        format!("redis://{}/", self.broker_addr())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            broker_host: Self::DEFAULT_HOST.to_owned(),
            broker_port: Self::DEFAULT_PORT.to_owned(),
            channel_namespace: Self::DEFAULT_NAMESPACE.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.broker_host, "127.0.0.1");
        assert_eq!(config.broker_port, "6379");
        assert_eq!(config.channel_namespace, "socket.io");
        assert_eq!(config.broker_addr(), "127.0.0.1:6379");
        assert_eq!(config.broker_url(), "redis://127.0.0.1:6379/");
    }

    #[test]
    fn test_from_options_reads_known_keys() {
        let options = HashMap::from([
            ("host".to_string(), "redis.internal".to_string()),
            ("port".to_string(), "7000".to_string()),
            ("prefix".to_string(), "chat".to_string()),
        ]);
        let config = RelayConfig::from_options(&options);
        assert_eq!(config.broker_addr(), "redis.internal:7000");
        assert_eq!(config.channel_namespace, "chat");
    }

    #[test]
    fn test_from_options_falls_back_per_key() {
        let options = HashMap::from([("port".to_string(), "6380".to_string())]);
        let config = RelayConfig::from_options(&options);
        assert_eq!(config.broker_host, "127.0.0.1");
        assert_eq!(config.broker_port, "6380");
        assert_eq!(config.channel_namespace, "socket.io");
    }

    #[test]
    fn test_from_options_does_not_validate_values() {
        let options = HashMap::from([("port".to_string(), "not-a-port".to_string())]);
        assert_eq!(RelayConfig::from_options(&options).broker_port, "not-a-port");
    }

    #[test]
    fn test_deserialize_missing_fields_use_defaults() {
        let config: RelayConfig =
            serde_json::from_str(r#"{"channel_namespace": "games"}"#).unwrap();
        assert_eq!(config.channel_namespace, "games");
        assert_eq!(config.broker_port, "6379");
    }
}
