//! Network configuration.

use std::time::Duration;

use duetnet_protocol::Role;
use duetnet_transport::LinkConfig;
use serde::{Deserialize, Serialize};

use crate::NetError;

/// Everything a [`NetManager`](crate::NetManager) needs to start.
///
/// Missing fields take their defaults when parsed from JSON, so a config
/// file only lists what it changes:
///
/// ```json
/// { "role": "client", "host": "192.168.1.20" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    pub role: Role,

    /// Server: address to bind. Client: server to connect to.
    pub host: String,

    pub port: u16,

    /// How often dirty agents are collected and sent.
    pub sync_interval: Duration,

    /// How often a client pings the server. Servers never ping.
    pub ping_interval: Duration,

    /// How fast ghost agents close the gap to their last received state,
    /// as a fraction per second.
    pub interpolation_rate: f32,

    /// Unacknowledged payloads allowed in flight per connection.
    pub reliability_window: u16,

    pub resend_timeout: Duration,

    /// Silence after which a connection counts as dropped.
    pub disconnect_timeout: Duration,

    pub heartbeat_interval: Duration,

    /// Largest datagram put on the wire. Messages that do not fit are
    /// refused at send time.
    pub max_datagram: usize,

    /// Resends of one payload before its connection is dropped.
    pub max_resends: u32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            role: Role::Server,
            host: "127.0.0.1".to_string(),
            port: 9000,
            sync_interval: Duration::from_millis(100),
            ping_interval: Duration::from_secs(5),
            interpolation_rate: 2.0,
            reliability_window: 32,
            resend_timeout: Duration::from_millis(100),
            disconnect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(1),
            max_datagram: 8 * 1024,
            max_resends: 50,
        }
    }
}

impl NetConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    /// [`NetError::Config`] if the JSON is malformed or a field has the
    /// wrong type.
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        Ok(serde_json::from_str(json)?)
    }

    /// `host:port`, as handed to the UDP driver.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The transport tuning part of the config.
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            window: self.reliability_window,
            resend_timeout: self.resend_timeout,
            disconnect_timeout: self.disconnect_timeout,
            heartbeat_interval: self.heartbeat_interval,
            max_datagram: self.max_datagram,
            max_resends: self.max_resends,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NetConfig::default();
        assert_eq!(config.role, Role::Server);
        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(config.sync_interval, Duration::from_millis(100));
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.link_config(), LinkConfig::default());
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = NetConfig::from_json(r#"{ "role": "client", "port": 7777 }"#).unwrap();
        assert_eq!(config.role, Role::Client);
        assert_eq!(config.port, 7777);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.interpolation_rate, 2.0);
    }

    #[test]
    fn test_link_limits_reach_the_driver_config() {
        let config = NetConfig::from_json(r#"{ "max_datagram": 1200, "max_resends": 5 }"#).unwrap();
        let link = config.link_config();
        assert_eq!(link.max_datagram, 1200);
        assert_eq!(link.max_resends, 5);
    }

    #[test]
    fn test_from_json_durations() {
        let config =
            NetConfig::from_json(r#"{ "sync_interval": { "secs": 0, "nanos": 50000000 } }"#)
                .unwrap();
        assert_eq!(config.sync_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_from_json_rejects_bad_role() {
        let err = NetConfig::from_json(r#"{ "role": "observer" }"#).unwrap_err();
        assert!(matches!(err, NetError::Config(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let config = NetConfig {
            role: Role::Client,
            host: "example.org".into(),
            ..NetConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(NetConfig::from_json(&json).unwrap(), config);
    }
}
