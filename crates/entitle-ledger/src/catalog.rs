//! Product-to-feature table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use entitle_core::{FeatureSet, PremiumFeature};

/// Namespace shared by every default product id.
pub const PRODUCT_NAMESPACE: &str = "com.qtm.magicalstories";

pub const PREMIUM_MONTHLY: &str = "com.qtm.magicalstories.premium.monthly";
pub const PREMIUM_YEARLY: &str = "com.qtm.magicalstories.premium.yearly";
pub const PREMIUM_LIFETIME: &str = "com.qtm.magicalstories.premium.lifetime";
pub const ILLUSTRATIONS: &str = "com.qtm.magicalstories.illustrations";
pub const THEMES: &str = "com.qtm.magicalstories.themes";

/// How a product's grant is bounded in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductKind {
    /// Access ends at the transaction's expiration date.
    Subscription,
    /// Access never expires.
    NonConsumable,
}

/// What a product unlocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub kind: ProductKind,
    pub features: FeatureSet,
}

/// Static mapping from store product id to features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCatalog {
    products: HashMap<String, Product>,
}

impl ProductCatalog {
    /// A catalog with no products.
    pub fn empty() -> Self {
        Self {
            products: HashMap::new(),
        }
    }

    /// Add or replace a product.
    pub fn with_product(
        mut self,
        product_id: impl Into<String>,
        kind: ProductKind,
        features: impl IntoIterator<Item = PremiumFeature>,
    ) -> Self {
        self.products.insert(
            product_id.into(),
            Product {
                kind,
                features: features.into_iter().collect(),
            },
        );
        self
    }

    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id)
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.products.contains_key(product_id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        use PremiumFeature::*;

        Self::empty()
            .with_product(
                PREMIUM_MONTHLY,
                ProductKind::Subscription,
                [UnlimitedStoryGeneration],
            )
            .with_product(
                PREMIUM_YEARLY,
                ProductKind::Subscription,
                [
                    UnlimitedStoryGeneration,
                    GrowthPathCollections,
                    MultipleChildProfiles,
                    OfflineReading,
                ],
            )
            .with_product(PREMIUM_LIFETIME, ProductKind::NonConsumable, PremiumFeature::ALL)
            .with_product(ILLUSTRATIONS, ProductKind::NonConsumable, [AdvancedIllustrations])
            .with_product(THEMES, ProductKind::NonConsumable, [CustomThemes])
    }
}
