//! Error types for lyrix-central
//!
//! The dispatcher itself never fails; errors arise at the edges: registration,
//! payload decoding and script replay.

use thiserror::Error;

/// Main error type for lyrix-central
#[derive(Error, Debug)]
pub enum Error {
    /// Source descriptor rejected during the registration handshake
    #[error("Registration rejected: {0}")]
    Registration(String),

    /// Errors from the shared model/config layer (decode, config, I/O)
    #[error(transparent)]
    Common(#[from] lyrix_common::Error),

    /// Malformed or inconsistent event script
    #[error("Script error at line {line}: {message}")]
    Script { line: usize, message: String },

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using lyrix-central Error
pub type Result<T> = std::result::Result<T, Error>;
