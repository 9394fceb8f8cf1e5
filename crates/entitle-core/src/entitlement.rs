//! Entitlement resolution.
//!
//! The entitlement state is always recomputed from the full list of grants,
//! never patched in place. Features accumulate from every live source; there
//! is no tier ordering and no "highest grant wins".

use serde::{Deserialize, Serialize};

use crate::feature::{FeatureSet, PremiumFeature};
use crate::grant::Grant;

/// The resolved set of features this installation may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementState {
    /// Union of the features of every live grant.
    pub active_features: FeatureSet,

    /// The live grants, in input order.
    pub active_grants: Vec<Grant>,

    /// When this state was computed (Unix milliseconds).
    pub last_recomputed_at: i64,
}

impl EntitlementState {
    /// A state with no entitlements.
    pub fn empty(now: i64) -> Self {
        Self {
            active_features: FeatureSet::new(),
            active_grants: Vec::new(),
            last_recomputed_at: now,
        }
    }

    /// Whether a feature is unlocked.
    pub fn has_access(&self, feature: PremiumFeature) -> bool {
        self.active_features.contains(&feature)
    }

    /// Whether nothing is unlocked.
    pub fn is_free_tier(&self) -> bool {
        self.active_features.is_empty()
    }

    /// Grants that contribute a given feature.
    pub fn sources_of(&self, feature: PremiumFeature) -> impl Iterator<Item = &Grant> {
        self.active_grants.iter().filter(move |g| g.includes(feature))
    }

    /// Earliest time at which a live grant lapses, if any grant can lapse.
    pub fn next_expiry(&self) -> Option<i64> {
        self.active_grants.iter().filter_map(|g| g.expires_at).min()
    }
}

/// Merge grants into an entitlement state as of `now`.
///
/// Drops revoked and expired grants and unions the features of the rest.
pub fn resolve(grants: &[Grant], now: i64) -> EntitlementState {
    let active_grants: Vec<Grant> = grants
        .iter()
        .filter(|g| g.is_active(now))
        .cloned()
        .collect();

    let active_features = active_grants
        .iter()
        .flat_map(|g| g.features.iter().copied())
        .collect();

    EntitlementState {
        active_features,
        active_grants,
        last_recomputed_at: now,
    }
}
