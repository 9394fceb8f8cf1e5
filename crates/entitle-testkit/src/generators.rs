//! Proptest generators for property-based testing.

use proptest::prelude::*;

use entitle_core::{
    issue_code_with_payload, CodeType, FeatureSet, Grant, PremiumFeature, ALPHABET, PAYLOAD_LEN,
};
use entitle_ledger::{ProductCatalog, VerifiedTransaction};

/// Generate a code type.
pub fn code_type() -> impl Strategy<Value = CodeType> {
    prop::sample::select(CodeType::ALL.to_vec())
}

/// Generate one alphabet character.
pub fn alphabet_char() -> impl Strategy<Value = char> {
    prop::sample::select(ALPHABET.iter().map(|&b| b as char).collect::<Vec<_>>())
}

/// Generate an 8-character payload from the code alphabet.
pub fn payload() -> impl Strategy<Value = String> {
    prop::collection::vec(alphabet_char(), PAYLOAD_LEN)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Generate a valid, normalized code together with its type.
pub fn valid_code() -> impl Strategy<Value = (CodeType, String)> {
    (code_type(), payload()).prop_map(|(code_type, payload)| {
        let code = issue_code_with_payload(code_type, &payload)
            .unwrap_or_else(|e| panic!("payload from the alphabet rejected: {e}"));
        (code_type, code)
    })
}

/// Generate a premium feature.
pub fn premium_feature() -> impl Strategy<Value = PremiumFeature> {
    prop::sample::select(PremiumFeature::ALL.to_vec())
}

/// Generate a feature set (possibly empty).
pub fn feature_set() -> impl Strategy<Value = FeatureSet> {
    prop::collection::btree_set(premium_feature(), 0..=PremiumFeature::ALL.len())
}

/// Generate a timestamp within a few years of the epoch used by fixtures.
pub fn timestamp() -> impl Strategy<Value = i64> {
    1_600_000_000_000i64..1_900_000_000_000i64
}

/// Generate a grant from either source, sometimes expired or revoked.
pub fn grant() -> impl Strategy<Value = Grant> {
    (
        prop_oneof![
            "[a-z]{1,8}".prop_map(|p| format!("com.qtm.magicalstories.{p}")),
            valid_code().prop_map(|(_, code)| code),
        ],
        any::<bool>(),
        feature_set(),
        prop::option::of(timestamp()),
        prop::bool::weighted(0.2),
    )
        .prop_map(|(id, is_purchase, features, expires_at, revoked)| {
            let grant = if is_purchase {
                Grant::purchase(id, features, expires_at)
            } else {
                Grant {
                    source: entitle_core::GrantSource::AccessCode { code: id },
                    features,
                    expires_at,
                    is_revoked: false,
                }
            };
            if revoked {
                grant.revoked()
            } else {
                grant
            }
        })
}

/// Generate a list of grants.
pub fn grants(max: usize) -> impl Strategy<Value = Vec<Grant>> {
    prop::collection::vec(grant(), 0..=max)
}

/// Generate a transaction for one of the default catalog's products.
pub fn catalog_transaction() -> impl Strategy<Value = VerifiedTransaction> {
    let products = [
        entitle_ledger::catalog::PREMIUM_MONTHLY,
        entitle_ledger::catalog::PREMIUM_YEARLY,
        entitle_ledger::catalog::PREMIUM_LIFETIME,
        entitle_ledger::catalog::ILLUSTRATIONS,
        entitle_ledger::catalog::THEMES,
    ];
    (
        any::<u64>(),
        prop::sample::select(products.to_vec()),
        timestamp(),
        prop::option::of(timestamp()),
        prop::option::of(timestamp()),
    )
        .prop_map(|(id, product, purchased, expires, revoked)| {
            let mut tx = VerifiedTransaction::new(id, product, purchased);
            tx.expiration_date = expires;
            tx.revocation_date = revoked;
            tx
        })
}

/// The default catalog, for pairing with [`catalog_transaction`].
pub fn default_catalog() -> ProductCatalog {
    ProductCatalog::default()
}
