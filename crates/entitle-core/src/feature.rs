//! Premium features and their compact bitmask encoding.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A capability that requires an entitlement.
///
/// This is a closed set: feature gates match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PremiumFeature {
    UnlimitedStoryGeneration,
    GrowthPathCollections,
    AdvancedIllustrations,
    MultipleChildProfiles,
    PriorityGeneration,
    ParentalAnalytics,
    OfflineReading,
    CustomThemes,
}

/// A set of features. Ordered so that iteration and encoding are deterministic.
pub type FeatureSet = BTreeSet<PremiumFeature>;

impl PremiumFeature {
    /// Every feature, in declaration order.
    pub const ALL: [PremiumFeature; 8] = [
        PremiumFeature::UnlimitedStoryGeneration,
        PremiumFeature::GrowthPathCollections,
        PremiumFeature::AdvancedIllustrations,
        PremiumFeature::MultipleChildProfiles,
        PremiumFeature::PriorityGeneration,
        PremiumFeature::ParentalAnalytics,
        PremiumFeature::OfflineReading,
        PremiumFeature::CustomThemes,
    ];

    /// The bit this feature occupies in the persisted bitmask.
    ///
    /// These values are part of the storage format and must never be reordered.
    pub const fn bit(self) -> u32 {
        match self {
            PremiumFeature::UnlimitedStoryGeneration => 1 << 0,
            PremiumFeature::GrowthPathCollections => 1 << 1,
            PremiumFeature::AdvancedIllustrations => 1 << 2,
            PremiumFeature::MultipleChildProfiles => 1 << 3,
            PremiumFeature::PriorityGeneration => 1 << 4,
            PremiumFeature::ParentalAnalytics => 1 << 5,
            PremiumFeature::OfflineReading => 1 << 6,
            PremiumFeature::CustomThemes => 1 << 7,
        }
    }

    /// Stable identifier used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            PremiumFeature::UnlimitedStoryGeneration => "unlimitedStoryGeneration",
            PremiumFeature::GrowthPathCollections => "growthPathCollections",
            PremiumFeature::AdvancedIllustrations => "advancedIllustrations",
            PremiumFeature::MultipleChildProfiles => "multipleChildProfiles",
            PremiumFeature::PriorityGeneration => "priorityGeneration",
            PremiumFeature::ParentalAnalytics => "parentalAnalytics",
            PremiumFeature::OfflineReading => "offlineReading",
            PremiumFeature::CustomThemes => "customThemes",
        }
    }

    /// All features as a set.
    pub fn all() -> FeatureSet {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for PremiumFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode a feature set as a bitmask.
pub fn features_to_bitmask(features: &FeatureSet) -> u32 {
    features.iter().fold(0, |mask, f| mask | f.bit())
}

/// Decode a bitmask into a feature set.
///
/// Returns `None` if any bit does not correspond to a known feature.
pub fn features_from_bitmask(mask: u32) -> Option<FeatureSet> {
    let known = PremiumFeature::ALL.iter().fold(0, |m, f| m | f.bit());
    if mask & !known != 0 {
        return None;
    }

    Some(
        PremiumFeature::ALL
            .into_iter()
            .filter(|f| mask & f.bit() != 0)
            .collect(),
    )
}
