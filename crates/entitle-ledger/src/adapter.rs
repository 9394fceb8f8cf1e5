//! Mapping from verified transactions to grants.
//!
//! Pure functions: no persistence, no side effects beyond logging.

use entitle_core::Grant;

use crate::catalog::{ProductCatalog, ProductKind};
use crate::error::{LedgerError, Result};
use crate::transaction::VerifiedTransaction;

/// Convert a transaction into a grant, explaining why when it cannot be.
///
/// Revoked transactions never produce a grant. Subscriptions expire at the
/// transaction's expiration date; non-consumables never expire.
pub fn try_to_grant(tx: &VerifiedTransaction, catalog: &ProductCatalog) -> Result<Grant> {
    if tx.is_revoked() {
        return Err(LedgerError::Revoked(tx.transaction_id));
    }

    let product = catalog
        .get(&tx.product_id)
        .ok_or_else(|| LedgerError::UnknownProduct(tx.product_id.clone()))?;

    let expires_at = match product.kind {
        ProductKind::NonConsumable => None,
        ProductKind::Subscription => Some(
            tx.expiration_date
                .ok_or_else(|| LedgerError::MissingExpiration(tx.product_id.clone()))?,
        ),
    };

    Ok(Grant::purchase(
        tx.product_id.clone(),
        product.features.clone(),
        expires_at,
    ))
}

/// Convert a transaction into a grant, or `None` if it confers nothing.
pub fn to_grant(tx: &VerifiedTransaction, catalog: &ProductCatalog) -> Option<Grant> {
    match try_to_grant(tx, catalog) {
        Ok(grant) => Some(grant),
        Err(LedgerError::Revoked(id)) => {
            tracing::debug!(transaction_id = id, "revoked transaction yields no grant");
            None
        }
        Err(e) => {
            tracing::warn!(transaction_id = tx.transaction_id, error = %e, "transaction ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PREMIUM_LIFETIME, PREMIUM_MONTHLY, THEMES};
    use entitle_core::{PremiumFeature, DAY_MS};

    #[test]
    fn test_subscription_expires_with_transaction() {
        let tx = VerifiedTransaction::new(1, PREMIUM_MONTHLY, 0).expiring_at(30 * DAY_MS);
        let grant = to_grant(&tx, &ProductCatalog::default()).unwrap();

        assert_eq!(grant.expires_at, Some(30 * DAY_MS));
        assert!(grant.includes(PremiumFeature::UnlimitedStoryGeneration));
        assert!(!grant.is_revoked);
    }

    #[test]
    fn test_non_consumable_never_expires() {
        // A stray expiration date on a one-time purchase is ignored.
        let tx = VerifiedTransaction::new(2, PREMIUM_LIFETIME, 0).expiring_at(5);
        let grant = to_grant(&tx, &ProductCatalog::default()).unwrap();

        assert_eq!(grant.expires_at, None);
        assert_eq!(grant.features, PremiumFeature::all());
    }

    #[test]
    fn test_revoked_transaction_has_no_grant() {
        let tx = VerifiedTransaction::new(3, THEMES, 0).revoked_at(10);

        assert!(to_grant(&tx, &ProductCatalog::default()).is_none());
        assert_eq!(
            try_to_grant(&tx, &ProductCatalog::default()),
            Err(LedgerError::Revoked(3))
        );
    }

    #[test]
    fn test_unknown_product_has_no_grant() {
        let tx = VerifiedTransaction::new(4, "com.example.coins", 0);

        assert!(to_grant(&tx, &ProductCatalog::default()).is_none());
        assert_eq!(
            try_to_grant(&tx, &ProductCatalog::default()),
            Err(LedgerError::UnknownProduct("com.example.coins".into()))
        );
    }

    #[test]
    fn test_subscription_without_expiration_is_rejected() {
        let tx = VerifiedTransaction::new(5, PREMIUM_MONTHLY, 0);

        assert_eq!(
            try_to_grant(&tx, &ProductCatalog::default()),
            Err(LedgerError::MissingExpiration(PREMIUM_MONTHLY.into()))
        );
        assert!(to_grant(&tx, &ProductCatalog::default()).is_none());
    }
}
