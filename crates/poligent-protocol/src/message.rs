//! Frame types for the poligent management protocol
//!
//! # Message Flow
//!
//! 1. Peer connects and sends `Open` with its container id and connection
//!    properties (the `product` property declares its role)
//! 2. poligent responds with its own `Open`
//! 3. poligent sends `Request` frames (QUERY, CREATE, UPDATE, DELETE)
//! 4. The peer answers each with a `Response` echoing the correlation id
//! 5. Either side may send `Close` before dropping the connection

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::correlation::CorrelationId;

/// Connection property naming the peer's product (its role)
pub const PRODUCT_PROPERTY: &str = "product";

/// Connection properties exchanged in `Open` frames
pub type Properties = Map<String, Value>;

/// Management operation carried by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// List all entities of a type
    Query,
    /// Create a named entity
    Create,
    /// Update a named entity
    Update,
    /// Delete a named entity
    Delete,
}

impl Operation {
    /// Wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Query => "QUERY",
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    /// Connection opened; identifies the sender
    Open {
        /// Stable identifier of the sending container
        container_id: String,
        /// Free-form connection properties
        #[serde(default)]
        properties: Properties,
    },

    /// Management request
    Request {
        correlation_id: CorrelationId,
        operation: Operation,
        /// Entity type the operation targets
        #[serde(rename = "type")]
        entity_type: String,
        /// Entity name (absent for QUERY)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Entity attributes (absent for QUERY and DELETE)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },

    /// Management response
    Response {
        correlation_id: CorrelationId,
        /// HTTP-style status; 2xx is success
        status_code: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_description: Option<String>,
        #[serde(default)]
        body: Value,
    },

    /// Connection closing
    Close {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl Frame {
    /// Build an `Open` frame advertising a product and container id
    pub fn open(container_id: impl Into<String>, product: impl Into<String>) -> Self {
        let mut properties = Properties::new();
        properties.insert(PRODUCT_PROPERTY.to_string(), Value::String(product.into()));
        Frame::Open {
            container_id: container_id.into(),
            properties,
        }
    }

    /// Short frame kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Open { .. } => "open",
            Frame::Request { .. } => "request",
            Frame::Response { .. } => "response",
            Frame::Close { .. } => "close",
        }
    }
}

/// Read the declared product from connection properties
pub fn product_of(properties: &Properties) -> Option<&str> {
    properties.get(PRODUCT_PROPERTY).and_then(Value::as_str)
}

/// Whether a response status code denotes success
pub fn is_success(status_code: u16) -> bool {
    (200..300).contains(&status_code)
}
