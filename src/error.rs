//! Centralized error types for emlview.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the emlview library.
///
/// The parse path itself is `Option`-shaped (see [`crate::parser::parse_message`]):
/// malformed mail degrades instead of erroring. These variants cover the
/// edges where a caller-facing failure is the right answer — file access,
/// a buffer that is not text at all, a named attachment that does not exist.
#[derive(Error, Debug)]
pub enum EmlError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The buffer cannot be interpreted as UTF-8 or ASCII text.
    #[error("Input is not decodable as text (neither UTF-8 nor ASCII)")]
    NotText,

    /// An attachment requested by name was not found in the message.
    #[error("Attachment '{0}' not found in message")]
    AttachmentNotFound(String),
}

/// Convenience alias for `Result<T, EmlError>`.
pub type Result<T> = std::result::Result<T, EmlError>;

impl EmlError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `EmlError`
/// when no path context is available (rare — prefer `EmlError::io`).
impl From<std::io::Error> for EmlError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
