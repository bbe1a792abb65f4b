//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::identity::{ProcessIdentity, PRODUCT};

/// Default listen address for router peers
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:55672";

/// Product tag declared by router peers that get synced
pub const ROUTER_PRODUCT: &str = "qpid-dispatch-router";

/// Entity type of the managed units
pub const DEFAULT_ENTITY_TYPE: &str = "org.apache.qpid.dispatch.vhost";

/// Configuration for the poligent daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Address to accept router connections on
    pub bind_address: String,

    /// Desired-state document to watch
    pub desired_state_path: PathBuf,

    /// How often the desired-state document's mtime is checked
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Only peers declaring this product are registered and synced
    pub expected_product: String,

    /// Product tag advertised to peers
    pub product: String,

    /// Container id advertised to peers (defaults to `$HOSTNAME`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,

    /// Management entity type of a unit
    pub entity_type: String,

    /// Timeout for a single management request
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// How long a new connection may take to send its `open` frame
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,

    /// Give up a cycle after this many passes that still had work to do.
    /// Unset means keep rechecking until the peer converges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sync_passes: Option<u32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            desired_state_path: PathBuf::from("desired.json"),
            poll_interval: Duration::from_secs(1),
            expected_product: ROUTER_PRODUCT.to_string(),
            product: PRODUCT.to_string(),
            container_id: None,
            entity_type: DEFAULT_ENTITY_TYPE.to_string(),
            request_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
            max_sync_passes: None,
        }
    }
}

impl OrchestratorConfig {
    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("poll_interval", self.poll_interval),
            ("request_timeout", self.request_timeout),
            ("handshake_timeout", self.handshake_timeout),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be at least 1 second", field)));
            }
        }
        Ok(())
    }

    /// Identity advertised in our `open` frame
    pub fn process_identity(&self) -> ProcessIdentity {
        ProcessIdentity::resolve(self.container_id.as_deref(), self.product.clone())
    }
}

// Durations are written as whole seconds
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:55672");
        assert_eq!(config.expected_product, "qpid-dispatch-router");
        assert_eq!(config.product, "poligent");
        assert_eq!(config.desired_state_path, PathBuf::from("desired.json"));
        assert!(config.max_sync_passes.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            bind_address = "127.0.0.1:5673"
            poll_interval = 5
            max_sync_passes = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:5673");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_sync_passes, Some(20));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.entity_type, DEFAULT_ENTITY_TYPE);
    }

    #[test]
    fn test_container_id_override() {
        let config = OrchestratorConfig {
            container_id: Some("poligent-a".to_string()),
            ..Default::default()
        };
        let identity = config.process_identity();
        assert_eq!(identity.container_id, "poligent-a");
        assert_eq!(identity.product, "poligent");
    }

    #[test]
    fn test_zero_poll_interval_is_invalid() {
        let config: OrchestratorConfig = toml::from_str("poll_interval = 0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("poll_interval")));

        assert!(OrchestratorConfig::default().validate().is_ok());
    }
}
