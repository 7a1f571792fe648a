//! Error types for ipexempt.

use thiserror::Error;

/// Error type for ipexempt operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CIDR pattern in a file source or the remote feed
    #[error("invalid CIDR pattern: {0}")]
    InvalidCidrPattern(String),

    /// Invalid IP address passed to a membership query
    #[error("invalid IP address: {0}")]
    InvalidIpAddress(String),

    /// Remote feed error (transport, HTTP status, or malformed payload)
    #[error("range feed error: {0}")]
    Feed(String),

    /// Query issued before the first exception set was published
    #[error("exception set not yet published")]
    NotReady,

    /// Background refresh task terminated abnormally
    #[error("refresh task failed: {0}")]
    Refresh(String),
}

/// Result type alias for ipexempt operations.
pub type Result<T> = std::result::Result<T, Error>;
