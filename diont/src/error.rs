//! Error types for a diont instance

use thiserror::Error;

/// Result type alias for diont operations
pub type Result<T> = std::result::Result<T, DiontError>;

/// Errors surfaced to callers of the local API
#[derive(Debug, Error)]
pub enum DiontError {
    /// The record had no host and none could be resolved from the interfaces
    #[error("No announceable host address")]
    NoAnnounceableAddress,

    /// A required service field is empty
    #[error("Invalid service: missing {0}")]
    InvalidService(String),

    /// The instance task has stopped
    #[error("Diont instance has been shut down")]
    Shutdown,

    /// Socket setup failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
