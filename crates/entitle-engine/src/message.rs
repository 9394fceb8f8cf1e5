//! User-facing text for rejected codes.
//!
//! Every rejection gets its own message and a recovery step. Storage faults
//! are described only as "try again"; no internal detail reaches the user.

use chrono::{DateTime, Utc};

use entitle_core::FormatError;
use entitle_store::DeactivationReason;

use crate::error::ValidationError;

impl ValidationError {
    /// A short, specific explanation of what went wrong.
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::Format(FormatError::InvalidFormat(_)) => {
                "That doesn't look like an access code. Codes are 12 letters and numbers."
                    .to_string()
            }
            ValidationError::Format(FormatError::UnknownTypePrefix(_)) => {
                "This access code isn't one we recognize.".to_string()
            }
            ValidationError::Format(FormatError::ChecksumMismatch) => {
                "This access code doesn't check out. It may contain a typo.".to_string()
            }
            ValidationError::CodeInactive { reason } => match reason {
                Some(DeactivationReason::Expired) => "This access code has expired.".to_string(),
                Some(DeactivationReason::UsageExhausted) => {
                    "This access code has already been used.".to_string()
                }
                Some(DeactivationReason::Revoked) => {
                    "This access code has been withdrawn.".to_string()
                }
                None => "This access code is no longer active.".to_string(),
            },
            ValidationError::CodeExpired(expires_at) => match format_date(*expires_at) {
                Some(date) => format!("This access code expired on {}.", date),
                None => "This access code has expired.".to_string(),
            },
            ValidationError::UsageLimitReached(1) => {
                "This access code has already been used.".to_string()
            }
            ValidationError::UsageLimitReached(limit) => {
                format!("This access code has been used the maximum of {} times.", limit)
            }
            ValidationError::StoreUnavailable(_) | ValidationError::TimedOut(_) => {
                "We couldn't check your code right now.".to_string()
            }
        }
    }

    /// What the user can do about it.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ValidationError::Format(FormatError::InvalidFormat(_)) => {
                "Enter all 12 characters exactly as shown. Dashes and spaces are optional."
            }
            ValidationError::Format(FormatError::UnknownTypePrefix(_)) => {
                "Make sure you entered the code from your invitation, starting with its first two letters."
            }
            ValidationError::Format(FormatError::ChecksumMismatch) => {
                "Check for typos. Codes never contain 0, O, 1 or I."
            }
            ValidationError::CodeInactive { .. }
            | ValidationError::CodeExpired(_)
            | ValidationError::UsageLimitReached(_) => {
                "Contact the person who gave you this code for a new one."
            }
            ValidationError::StoreUnavailable(_) | ValidationError::TimedOut(_) => {
                "Please try again in a moment."
            }
        }
    }
}

fn format_date(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.format("%B %-d, %Y").to_string())
}
