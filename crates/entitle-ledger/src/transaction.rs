//! Verified purchase transactions as delivered by the platform.

use serde::{Deserialize, Serialize};

/// A purchase transaction whose signature has already been verified upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedTransaction {
    /// Platform transaction identifier. Updates to a transaction reuse it.
    pub transaction_id: u64,

    /// Store product identifier.
    pub product_id: String,

    /// Unix milliseconds.
    pub purchase_date: i64,

    /// End of the paid period for subscriptions.
    pub expiration_date: Option<i64>,

    /// Set once the purchase has been refunded or revoked.
    pub revocation_date: Option<i64>,
}

impl VerifiedTransaction {
    /// A new, unrevoked transaction.
    pub fn new(transaction_id: u64, product_id: impl Into<String>, purchase_date: i64) -> Self {
        Self {
            transaction_id,
            product_id: product_id.into(),
            purchase_date,
            expiration_date: None,
            revocation_date: None,
        }
    }

    pub fn expiring_at(mut self, expiration_date: i64) -> Self {
        self.expiration_date = Some(expiration_date);
        self
    }

    pub fn revoked_at(mut self, revocation_date: i64) -> Self {
        self.revocation_date = Some(revocation_date);
        self
    }

    /// Whether the transaction has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.revocation_date.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_json_shape() {
        let json = r#"{
            "transactionId": 2000000123,
            "productId": "com.qtm.magicalstories.premium.yearly",
            "purchaseDate": 1700000000000,
            "expirationDate": 1731536000000,
            "revocationDate": null
        }"#;

        let tx: VerifiedTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.transaction_id, 2_000_000_123);
        assert_eq!(tx.expiration_date, Some(1_731_536_000_000));
        assert!(!tx.is_revoked());
    }
}
