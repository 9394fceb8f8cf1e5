//! Property tests across code issuance, resolution and the purchase ledger.

use proptest::prelude::*;

use entitle_core::{
    compute_checksum, resolve, validate_format, FeatureSet, FormatError, ALPHABET, CODE_LEN,
};
use entitle_ledger::{to_grant, TransactionLedger};
use entitle_testkit::generators::{
    alphabet_char, catalog_transaction, default_catalog, grants, timestamp, valid_code,
};

proptest! {
    #[test]
    fn issued_codes_validate_with_their_type((code_type, code) in valid_code()) {
        let parsed = validate_format(&code).unwrap();
        prop_assert_eq!(parsed.code_type(), code_type);
        prop_assert_eq!(parsed.code(), code.as_str());
        prop_assert_eq!(parsed.granted_features(), &code_type.default_features());
        prop_assert_eq!(parsed.duration_days(), code_type.duration_days());
    }

    #[test]
    fn lowercase_and_separators_normalize((_, code) in valid_code()) {
        let messy = format!(" {}-{} ", code[..6].to_lowercase(), &code[6..]);
        let parsed = validate_format(&messy).unwrap();
        prop_assert_eq!(parsed.code(), code.as_str());
    }

    #[test]
    fn checksum_is_two_alphabet_chars((_, code) in valid_code()) {
        let checksum = compute_checksum(&code[..10]);
        prop_assert_eq!(checksum.len(), 2);
        prop_assert!(checksum.bytes().all(|b| ALPHABET.contains(&b)));
        prop_assert!(checksum.ends_with('A') || checksum.ends_with('B'));
        prop_assert_eq!(&code[10..], checksum.as_str());
    }

    #[test]
    fn changed_checksum_is_rejected((_, code) in valid_code(), replacement in alphabet_char()) {
        let first = code.chars().nth(10).unwrap();
        prop_assume!(replacement != first);
        let tampered = format!("{}{}{}", &code[..10], replacement, &code[11..]);
        prop_assert!(matches!(
            validate_format(&tampered),
            Err(FormatError::ChecksumMismatch)
        ));
    }

    #[test]
    fn truncated_codes_are_malformed((_, code) in valid_code(), keep in 0usize..CODE_LEN) {
        prop_assert!(matches!(
            validate_format(&code[..keep]),
            Err(FormatError::InvalidFormat(_))
        ));
    }

    #[test]
    fn resolution_is_a_union_of_active_grants(list in grants(8), now in timestamp()) {
        let state = resolve(&list, now);
        let expected: FeatureSet = list
            .iter()
            .filter(|g| g.is_active(now))
            .flat_map(|g| g.features.iter().copied())
            .collect();
        prop_assert_eq!(&state.active_features, &expected);
        prop_assert!(state.active_grants.iter().all(|g| g.is_active(now)));
        prop_assert_eq!(state.last_recomputed_at, now);
    }

    #[test]
    fn resolution_ignores_grant_order(list in grants(8), now in timestamp()) {
        let mut reversed = list.clone();
        reversed.reverse();
        prop_assert_eq!(
            resolve(&list, now).active_features,
            resolve(&reversed, now).active_features
        );
    }

    #[test]
    fn resolution_is_idempotent(list in grants(8), now in timestamp()) {
        let once = resolve(&list, now);
        let twice = resolve(&once.active_grants, now);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn later_resolution_never_gains_features(
        list in grants(8),
        now in timestamp(),
        later in 0i64..1_000_000_000_000,
    ) {
        let before = resolve(&list, now);
        let after = resolve(&list, now + later);
        prop_assert!(after.active_features.is_subset(&before.active_features));
    }

    #[test]
    fn revoked_transactions_never_grant(tx in catalog_transaction()) {
        let catalog = default_catalog();
        match to_grant(&tx, &catalog) {
            Some(grant) => {
                prop_assert!(!tx.is_revoked());
                prop_assert!(!grant.is_revoked);
                prop_assert!(!grant.features.is_empty());
            }
            None => prop_assert!(tx.is_revoked() || tx.expiration_date.is_none()),
        }
    }

    #[test]
    fn ledger_replay_is_order_independent(
        txs in prop::collection::vec(catalog_transaction(), 0..12),
    ) {
        let catalog = default_catalog();
        let mut forward = TransactionLedger::new();
        let mut backward = TransactionLedger::new();
        // Distinct ids, so last-delivery-wins cannot depend on order.
        let txs: Vec<_> = txs
            .into_iter()
            .enumerate()
            .map(|(i, mut tx)| {
                tx.transaction_id = i as u64;
                tx
            })
            .collect();
        for tx in txs.iter().cloned() {
            forward.apply(tx);
        }
        for tx in txs.iter().rev().cloned() {
            backward.apply(tx);
        }
        prop_assert_eq!(forward.grants(&catalog), backward.grants(&catalog));
    }
}
