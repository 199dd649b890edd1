//! Common error types for Lyrix

use thiserror::Error;

/// Common result type for Lyrix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Lyrix crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file unreadable, malformed or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Payload could not be decoded into a model type
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
