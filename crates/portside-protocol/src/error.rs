//! Error types for protocol encoding and decoding

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding protocol frames
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame payload is not valid JSON or does not match the expected shape
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}
