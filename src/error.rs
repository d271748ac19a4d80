//! Error types for gridload
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while driving map tests
#[derive(Debug, Error)]
pub enum GridloadError {
    /// Missing or invalid runner configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Operation invoked in the wrong lifecycle phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Remote map access failed (acquire, get, set, remove, destroy)
    #[error("Remote error: {0}")]
    Remote(String),

    /// A key that was just written came back empty
    #[error("value for key '{0}' was missing -- it might have been evicted or expired")]
    MissingValue(String),

    /// A value read back from the grid is not a valid element
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// Remote call exceeded its deadline
    #[error("Timed out after {0} ms: {1}")]
    Timeout(u64, String),

    /// Remote call aborted by the cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for gridload operations
pub type Result<T> = std::result::Result<T, GridloadError>;
