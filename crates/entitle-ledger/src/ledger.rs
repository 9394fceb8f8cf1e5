//! Latest known state of every transaction.
//!
//! The platform re-delivers a transaction whenever it changes (renewal,
//! refund, revocation). The ledger keeps the most recent delivery per
//! transaction id and derives grants from those.

use std::collections::BTreeMap;

use entitle_core::Grant;

use crate::adapter::to_grant;
use crate::catalog::ProductCatalog;
use crate::transaction::VerifiedTransaction;

/// What applying a transaction did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
    /// First delivery of this transaction id.
    Added,
    /// A different version replaced the previous one.
    Updated,
    /// Identical to what was already held.
    Unchanged,
}

impl LedgerChange {
    /// Whether entitlements need recomputing.
    pub fn is_change(self) -> bool {
        !matches!(self, LedgerChange::Unchanged)
    }
}

/// Transactions keyed by transaction id.
#[derive(Debug, Clone, Default)]
pub struct TransactionLedger {
    transactions: BTreeMap<u64, VerifiedTransaction>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delivery, replacing any earlier version of the same transaction.
    pub fn apply(&mut self, tx: VerifiedTransaction) -> LedgerChange {
        match self.transactions.get(&tx.transaction_id) {
            Some(existing) if *existing == tx => LedgerChange::Unchanged,
            Some(_) => {
                self.transactions.insert(tx.transaction_id, tx);
                LedgerChange::Updated
            }
            None => {
                self.transactions.insert(tx.transaction_id, tx);
                LedgerChange::Added
            }
        }
    }

    pub fn get(&self, transaction_id: u64) -> Option<&VerifiedTransaction> {
        self.transactions.get(&transaction_id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VerifiedTransaction> {
        self.transactions.values()
    }

    /// Grants for every transaction that still confers access, in id order.
    pub fn grants(&self, catalog: &ProductCatalog) -> Vec<Grant> {
        self.transactions
            .values()
            .filter_map(|tx| to_grant(tx, catalog))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ILLUSTRATIONS, PREMIUM_LIFETIME, PREMIUM_MONTHLY};
    use entitle_core::resolve;
    use entitle_core::PremiumFeature;
    use proptest::prelude::*;

    #[test]
    fn test_apply_reports_changes() {
        let mut ledger = TransactionLedger::new();
        let tx = VerifiedTransaction::new(7, ILLUSTRATIONS, 100);

        assert_eq!(ledger.apply(tx.clone()), LedgerChange::Added);
        assert_eq!(ledger.apply(tx.clone()), LedgerChange::Unchanged);
        assert_eq!(ledger.apply(tx.revoked_at(200)), LedgerChange::Updated);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get(7).unwrap().is_revoked());
    }

    #[test]
    fn test_revocation_removes_only_its_features() {
        let catalog = ProductCatalog::default();
        let mut ledger = TransactionLedger::new();
        ledger.apply(VerifiedTransaction::new(1, ILLUSTRATIONS, 0));
        ledger.apply(VerifiedTransaction::new(2, PREMIUM_MONTHLY, 0).expiring_at(1_000_000));

        let before = resolve(&ledger.grants(&catalog), 10);
        assert!(before.has_access(PremiumFeature::AdvancedIllustrations));
        assert!(before.has_access(PremiumFeature::UnlimitedStoryGeneration));

        ledger.apply(VerifiedTransaction::new(1, ILLUSTRATIONS, 0).revoked_at(20));

        let after = resolve(&ledger.grants(&catalog), 30);
        assert!(!after.has_access(PremiumFeature::AdvancedIllustrations));
        assert!(after.has_access(PremiumFeature::UnlimitedStoryGeneration));
    }

    #[test]
    fn test_overlapping_sources_survive_revocation() {
        let catalog = ProductCatalog::default();
        let mut ledger = TransactionLedger::new();
        ledger.apply(VerifiedTransaction::new(1, ILLUSTRATIONS, 0));
        ledger.apply(VerifiedTransaction::new(2, PREMIUM_LIFETIME, 0));
        ledger.apply(VerifiedTransaction::new(1, ILLUSTRATIONS, 0).revoked_at(5));

        let state = resolve(&ledger.grants(&catalog), 10);
        assert!(state.has_access(PremiumFeature::AdvancedIllustrations));
        assert_eq!(ledger.grants(&catalog).len(), 1);
    }

    proptest! {
        #[test]
        fn test_last_delivery_wins(revoke in proptest::collection::vec(any::<bool>(), 1..10)) {
            let mut ledger = TransactionLedger::new();
            for (i, r) in revoke.iter().enumerate() {
                let tx = VerifiedTransaction::new(1, ILLUSTRATIONS, i as i64);
                ledger.apply(if *r { tx.revoked_at(i as i64) } else { tx });
            }

            let last_revoked = *revoke.last().unwrap();
            prop_assert_eq!(ledger.len(), 1);
            prop_assert_eq!(
                ledger.grants(&ProductCatalog::default()).is_empty(),
                last_revoked
            );
        }
    }
}
