//! Error types for the ublast-debug MCP server

use thiserror::Error;

/// Main error type for the ublast-debug MCP server
#[derive(Error, Debug)]
pub enum UblastError {
    #[error("JTAG chain enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("Invalid device pattern: {0}")]
    InvalidPattern(String),

    #[error("GDB server launch failed: {0}")]
    LaunchFailed(String),

    #[error("GDB server did not report ready within {0}s")]
    ServerTimeout(u64),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<regex::Error> for UblastError {
    fn from(error: regex::Error) -> Self {
        UblastError::InvalidPattern(error.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, UblastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UblastError::EnumerationFailed("jtagconfig exited with 1".to_string());
        assert!(err.to_string().contains("JTAG chain enumeration failed"));

        let err = UblastError::ServerTimeout(10);
        assert_eq!(err.to_string(), "GDB server did not report ready within 10s");
    }

    #[test]
    fn test_regex_error_conversion() {
        let err: UblastError = regex::Regex::new("10CX(").unwrap_err().into();
        assert!(matches!(err, UblastError::InvalidPattern(_)));
    }
}
