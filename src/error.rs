//! Centralized error types for mailscrub.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailscrub library.
#[derive(Error, Debug)]
pub enum ScrubError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The input bytes do not form a structurally valid message.
    #[error("Not a valid RFC 5322 message: {0}")]
    Parse(String),

    /// The assembled output tree is structurally invalid.
    ///
    /// This indicates a bug in the reconstruction step, never an
    /// input-dependent failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A replacement date string could not be parsed.
    #[error("Invalid date '{0}' (expected RFC 3339 or RFC 2822)")]
    InvalidDate(String),
}

/// Convenience alias for `Result<T, ScrubError>`.
pub type Result<T> = std::result::Result<T, ScrubError>;

impl ScrubError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `ScrubError`
/// when no path context is available (rare — prefer `ScrubError::io`).
impl From<std::io::Error> for ScrubError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
