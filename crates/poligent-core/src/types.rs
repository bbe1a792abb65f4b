//! Core domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A configuration unit, either desired or observed (e.g. a vhost)
pub type Unit = Map<String, Value>;

/// Attribute holding a unit's name
pub const NAME_FIELD: &str = "name";

/// Name of a unit, if it carries a string `name` attribute
pub fn unit_name(unit: &Unit) -> Option<&str> {
    unit.get(NAME_FIELD).and_then(Value::as_str)
}

/// Stable identifier for a router peer (its container id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    /// Create a new peer ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Listener-assigned identifier of one transport connection
///
/// A peer that reconnects keeps its `PeerId` but gets a new `ConnectionId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identity a peer declares when it connects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Container id reported by the peer
    pub container_id: String,
    /// Product tag from the connection properties
    pub product: Option<String>,
}

impl PeerIdentity {
    /// Create a new identity
    pub fn new(container_id: impl Into<String>, product: Option<String>) -> Self {
        Self {
            container_id: container_id.into(),
            product,
        }
    }

    /// Registry key for this peer
    pub fn peer_id(&self) -> PeerId {
        PeerId::new(self.container_id.clone())
    }

    /// Whether the peer declared the given product
    pub fn is_product(&self, product: &str) -> bool {
        self.product.as_deref() == Some(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unit_name() {
        let unit: Unit = serde_json::from_value(json!({"name": "a", "x": 1})).unwrap();
        assert_eq!(unit_name(&unit), Some("a"));

        let unit: Unit = serde_json::from_value(json!({"name": 3})).unwrap();
        assert_eq!(unit_name(&unit), None);
    }

    #[test]
    fn test_peer_identity_product_match() {
        let identity = PeerIdentity::new("router-1", Some("qpid-dispatch-router".to_string()));
        assert!(identity.is_product("qpid-dispatch-router"));
        assert!(!identity.is_product("poligent"));
        assert_eq!(identity.peer_id(), PeerId::new("router-1"));

        let anonymous = PeerIdentity::new("client", None);
        assert!(!anonymous.is_product("qpid-dispatch-router"));
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(format!("{}", ConnectionId(4)), "conn-4");
    }
}
