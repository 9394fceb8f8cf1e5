//! Error types for the engine.

use std::time::Duration;

use thiserror::Error;

use entitle_core::FormatError;
use entitle_store::{DeactivationReason, StoreError};

/// How a caller should react to a rejected code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The input was mistyped; the user can fix it and resubmit.
    Correctable,
    /// The code will never validate again.
    Terminal,
    /// A local fault; the whole validation may be retried.
    Retryable,
}

/// Why a code was rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Structural or checksum failure. The store was not consulted.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The code was redeemed before and has since been deactivated.
    #[error("code is no longer active")]
    CodeInactive {
        reason: Option<DeactivationReason>,
    },

    /// The validity window closed at the given time (Unix ms).
    #[error("code expired at {0}")]
    CodeExpired(i64),

    /// Every permitted use has been consumed.
    #[error("code usage limit of {0} reached")]
    UsageLimitReached(u32),

    /// Redemption state could not be read or written.
    #[error("code store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Validation did not finish within the configured bound.
    #[error("validation timed out after {0:?}")]
    TimedOut(Duration),
}

impl ValidationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ValidationError::Format(_) => ErrorClass::Correctable,
            ValidationError::CodeInactive { .. }
            | ValidationError::CodeExpired(_)
            | ValidationError::UsageLimitReached(_) => ErrorClass::Terminal,
            ValidationError::StoreUnavailable(_) | ValidationError::TimedOut(_) => {
                ErrorClass::Retryable
            }
        }
    }

    /// Whether retrying the same input may succeed.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

/// Errors from engine operations other than redemption.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
