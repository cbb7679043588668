//! Error types for the plugin runtime
//!
//! The taxonomy mirrors how errors are handled: transport errors are retried
//! up to a budget and then fatal to the owning worker; protocol and logic
//! errors are replied as diagnostic text and never crash the process; user
//! plugin errors are caught at the symbol-runtime boundary.

use thiserror::Error;

/// Result type alias for plugin runtime operations
pub type Result<T> = std::result::Result<T, PluginError>;

/// Main error type for the plugin runtime
#[derive(Debug, Error)]
pub enum PluginError {
    /// Configuration error (bad start payload, invalid options)
    #[error("configuration error: {0}")]
    Config(String),

    /// Dial or listen exhausted its retry budget, or a send/receive failed
    #[error("connection error: {0}")]
    Connection(String),

    /// The channel was closed under an in-flight send or receive
    #[error("channel closed")]
    ChannelClosed,

    /// A send did not complete within the configured deadline
    #[error("timeout: {0}")]
    Timeout(String),

    /// A frame exceeded the maximum allowed size
    #[error("frame too large: {len} bytes (max: {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// Symbol lookup or lifecycle error (unknown symbol, already running)
    #[error("{0}")]
    Symbol(String),

    /// Error raised by user plugin code
    #[error("plugin error: {0}")]
    Plugin(String),

    /// Malformed wire payload
    #[error(transparent)]
    Protocol(#[from] portside_protocol::ProtocolError),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a symbol lifecycle error
    pub fn symbol(msg: impl Into<String>) -> Self {
        Self::Symbol(msg.into())
    }

    /// Create a user-plugin error
    pub fn plugin(msg: impl Into<String>) -> Self {
        Self::Plugin(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginError::symbol("symbol not found");
        assert_eq!(err.to_string(), "symbol not found");

        let err = PluginError::FrameTooLarge { len: 10, max: 4 };
        assert_eq!(err.to_string(), "frame too large: 10 bytes (max: 4)");
    }
}
