//! Correlation identifier type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier pairing a management request with its response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    /// Create a new correlation ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The ID following this one
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

impl From<u64> for CorrelationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_display() {
        assert_eq!(format!("{}", CorrelationId::new(7)), "req-7");
    }

    #[test]
    fn test_correlation_id_next_wraps() {
        assert_eq!(CorrelationId::new(u64::MAX).next(), CorrelationId::new(0));
    }

    #[test]
    fn test_correlation_id_serializes_as_number() {
        let json = serde_json::to_string(&CorrelationId::new(12)).unwrap();
        assert_eq!(json, "12");
    }
}
