//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame exceeds the maximum line length
    #[error("Frame too large: exceeds maximum of {max} bytes")]
    FrameTooLarge { max: usize },

    /// Frame was not valid JSON or did not match any frame shape
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Query response body could not be turned into records
    #[error("Invalid query result: {0}")]
    InvalidQueryResult(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
