//! Error types for access code format checks.

use thiserror::Error;

/// Errors produced while checking the structure and integrity of a code.
///
/// `ChecksumMismatch` is kept apart from the structural errors: a code that
/// is well formed but fails its checksum is almost always a typo, while a
/// structural failure usually means the input is not a code at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid access code format: {0}")]
    InvalidFormat(String),

    #[error("unknown access code type prefix: {0}")]
    UnknownTypePrefix(String),

    #[error("access code checksum mismatch")]
    ChecksumMismatch,
}

/// Result type for format operations.
pub type Result<T> = std::result::Result<T, FormatError>;
