//! Grants: the common shape of every proof of entitlement.
//!
//! A purchase and a redeemed access code look nothing alike on the way in,
//! but both end up as a [`Grant`]: a set of features, a source, an optional
//! expiry, and a revocation flag.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::code::{redact, AccessCode};
use crate::feature::{FeatureSet, PremiumFeature};

/// Where a grant came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GrantSource {
    /// A verified platform purchase.
    PurchaseTransaction {
        /// The purchased product.
        product_id: String,
    },

    /// A redeemed access code.
    AccessCode {
        /// The normalized code.
        code: String,
    },
}

impl fmt::Display for GrantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantSource::PurchaseTransaction { product_id } => write!(f, "purchase:{}", product_id),
            GrantSource::AccessCode { code } => write!(f, "code:{}", redact(code)),
        }
    }
}

/// A time-bounded, revocable set of features attributed to one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// The proof this grant was derived from.
    pub source: GrantSource,

    /// What the grant unlocks.
    pub features: FeatureSet,

    /// When the grant lapses (Unix milliseconds). `None` never lapses.
    pub expires_at: Option<i64>,

    /// Whether the source has been revoked.
    pub is_revoked: bool,
}

impl Grant {
    /// A grant backed by a purchase.
    pub fn purchase(
        product_id: impl Into<String>,
        features: FeatureSet,
        expires_at: Option<i64>,
    ) -> Self {
        Self {
            source: GrantSource::PurchaseTransaction {
                product_id: product_id.into(),
            },
            features,
            expires_at,
            is_revoked: false,
        }
    }

    /// A grant backed by an activated access code.
    pub fn access_code(code: &AccessCode, expires_at: Option<i64>) -> Self {
        Self {
            source: GrantSource::AccessCode {
                code: code.code().to_string(),
            },
            features: code.granted_features().clone(),
            expires_at,
            is_revoked: false,
        }
    }

    /// Mark the grant revoked.
    pub fn revoked(mut self) -> Self {
        self.is_revoked = true;
        self
    }

    /// Whether the grant has lapsed. Expiry is strict: a grant is still
    /// live at exactly `expires_at`.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires) if now > expires)
    }

    /// Whether the grant currently confers its features.
    pub fn is_active(&self, now: i64) -> bool {
        !self.is_revoked && !self.is_expired(now)
    }

    /// Whether this grant includes a feature (ignoring validity).
    pub fn includes(&self, feature: PremiumFeature) -> bool {
        self.features.contains(&feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::validate_format;

    fn features(list: &[PremiumFeature]) -> FeatureSet {
        list.iter().copied().collect()
    }

    #[test]
    fn test_expiration_is_strict() {
        let grant = Grant::purchase(
            "monthly",
            features(&[PremiumFeature::OfflineReading]),
            Some(1000),
        );

        assert!(grant.is_active(500)); // Before expiration
        assert!(grant.is_active(1000)); // At expiration
        assert!(!grant.is_active(1001)); // After expiration
    }

    #[test]
    fn test_revoked_grant_is_inactive() {
        let grant = Grant::purchase("lifetime", PremiumFeature::all(), None).revoked();
        assert!(!grant.is_active(0));
        assert!(!grant.is_expired(i64::MAX));
    }

    #[test]
    fn test_access_code_grant_takes_code_features() {
        let code = validate_format("RV3F7K9P2QHB").unwrap();
        let grant = Grant::access_code(&code, Some(42));

        assert_eq!(grant.features, PremiumFeature::all());
        assert_eq!(grant.expires_at, Some(42));
        assert!(grant.includes(PremiumFeature::ParentalAnalytics));
        assert_eq!(grant.source.to_string(), "code:RV********HB");
    }
}
