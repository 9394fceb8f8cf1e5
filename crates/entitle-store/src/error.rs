//! Error types for the store module.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during store operations.
///
/// Callers see two broad classes: `Unavailable` may clear up on retry,
/// everything else will not.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or did not complete the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Persisted data could not be interpreted.
    #[error("store data corrupted: {0}")]
    Corrupted(String),

    /// A record with this code already exists.
    #[error("record already exists for code {0}")]
    Duplicate(String),

    /// No record exists for this code.
    #[error("no record for code {0}")]
    NotFound(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl StoreError {
    /// Whether retrying the whole operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::Utf8Error(_) => StoreError::Corrupted(e.to_string()),
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase
                ) =>
            {
                StoreError::Corrupted(e.to_string())
            }
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_transient() {
        assert!(StoreError::Unavailable("busy".into()).is_transient());
        assert!(!StoreError::Corrupted("bad row".into()).is_transient());
        assert!(!StoreError::Duplicate("RV".into()).is_transient());
        assert!(!StoreError::NotFound("RV".into()).is_transient());
    }

    #[test]
    fn test_rusqlite_conversion_classes() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(StoreError::from(busy), StoreError::Unavailable(_)));

        let corrupt = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CORRUPT),
            None,
        );
        assert!(matches!(StoreError::from(corrupt), StoreError::Corrupted(_)));

        let bad_column = rusqlite::Error::InvalidColumnType(
            0,
            "usage_count".into(),
            rusqlite::types::Type::Text,
        );
        assert!(matches!(StoreError::from(bad_column), StoreError::Corrupted(_)));
    }
}
