//! Error types for the ledger module.

use thiserror::Error;

/// Reasons a verified transaction cannot become a grant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The product id is not in the catalog.
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// A subscription arrived without an expiration date.
    #[error("subscription {0} has no expiration date")]
    MissingExpiration(String),

    /// The transaction has been refunded or revoked.
    #[error("transaction {0} was revoked")]
    Revoked(u64),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
