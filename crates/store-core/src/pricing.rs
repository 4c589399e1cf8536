//! # Tiered Pricing Resolver
//!
//! Maps (catalog item, quantity) to a unit price by applying per-category
//! volume breakpoints. Breakpoints are evaluated highest-quantity-first and
//! the first match wins. A tier can only lower the price: the resolved
//! price is clamped to the item's base price, so volume pricing is
//! discount-only and the result is monotonically non-increasing in
//! quantity.

use crate::catalog::CatalogItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single volume breakpoint: orders of at least `min_quantity` units
/// price at `unit_price_cents`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceBreak {
    pub min_quantity: u32,
    pub unit_price_cents: i64,
}

/// Volume tiers for one pricing category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub category: String,
    pub breaks: Vec<PriceBreak>,
}

/// Resolves unit prices against the configured tier tables.
#[derive(Debug, Clone, Default)]
pub struct TierPricer {
    // breaks sorted by min_quantity descending so the first match wins
    tiers: HashMap<String, Vec<PriceBreak>>,
}

impl TierPricer {
    /// A pricer with no tiers; every item prices at its base price.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured tiers (catalog TOML `[[tiers]]` blocks).
    pub fn from_tiers(configs: Vec<TierConfig>) -> Self {
        let mut tiers: HashMap<String, Vec<PriceBreak>> = HashMap::new();
        for config in configs {
            let entry = tiers.entry(config.category).or_default();
            entry.extend(config.breaks);
            entry.sort_by(|a, b| b.min_quantity.cmp(&a.min_quantity));
        }
        Self { tiers }
    }

    /// The built-in table for the garment bag line, used when the catalog
    /// file does not configure its own tiers.
    pub fn default_table() -> Self {
        Self::from_tiers(vec![TierConfig {
            category: "Garment Bags".to_string(),
            breaks: vec![
                PriceBreak {
                    min_quantity: 20,
                    unit_price_cents: 3699,
                },
                PriceBreak {
                    min_quantity: 15,
                    unit_price_cents: 3799,
                },
                PriceBreak {
                    min_quantity: 10,
                    unit_price_cents: 3899,
                },
            ],
        }])
    }

    /// Resolve the unit price for `quantity` units of `item`.
    ///
    /// Falls back to the item's base price when no breakpoint matches, and
    /// never returns a price above the base or below zero.
    pub fn unit_price_cents(&self, item: &CatalogItem, quantity: u32) -> i64 {
        let base = item.base_price_cents.max(0);
        let Some(breaks) = self.tiers.get(&item.category) else {
            return base;
        };
        for tier in breaks {
            if quantity >= tier.min_quantity {
                return tier.unit_price_cents.clamp(0, base);
            }
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Currency;

    fn garment_bag(base_price_cents: i64) -> CatalogItem {
        CatalogItem {
            id: "GB-54".into(),
            name: "Garment Bag 54\"".into(),
            description: None,
            base_price_cents,
            currency: Currency::CAD,
            category: "Garment Bags".into(),
            stock: 100,
        }
    }

    #[test]
    fn breakpoints_apply_highest_first() {
        let pricer = TierPricer::default_table();
        let item = garment_bag(4299);

        assert_eq!(pricer.unit_price_cents(&item, 1), 4299);
        assert_eq!(pricer.unit_price_cents(&item, 9), 4299);
        assert_eq!(pricer.unit_price_cents(&item, 10), 3899);
        assert_eq!(pricer.unit_price_cents(&item, 15), 3799);
        assert_eq!(pricer.unit_price_cents(&item, 19), 3799);
        assert_eq!(pricer.unit_price_cents(&item, 20), 3699);
        assert_eq!(pricer.unit_price_cents(&item, 22), 3699);
        assert_eq!(pricer.unit_price_cents(&item, 500), 3699);
    }

    #[test]
    fn price_is_monotonically_non_increasing() {
        let pricer = TierPricer::default_table();
        let item = garment_bag(4299);

        let mut previous = i64::MAX;
        for quantity in 1..=60 {
            let price = pricer.unit_price_cents(&item, quantity);
            assert!(
                price <= previous,
                "qty {} priced {} above previous {}",
                quantity,
                price,
                previous
            );
            assert!(price >= 3699, "price fell below the lowest tier");
            previous = price;
        }
    }

    #[test]
    fn tiers_never_raise_the_price_above_base() {
        let pricer = TierPricer::default_table();
        // base below every tier: volume pricing must not make it pricier
        let cheap = garment_bag(1000);

        assert_eq!(pricer.unit_price_cents(&cheap, 1), 1000);
        assert_eq!(pricer.unit_price_cents(&cheap, 25), 1000);
    }

    #[test]
    fn unknown_category_prices_at_base() {
        let pricer = TierPricer::default_table();
        let item = CatalogItem {
            id: "TAG-1".into(),
            name: "Price Tags".into(),
            description: None,
            base_price_cents: 899,
            currency: Currency::CAD,
            category: "Accessories".into(),
            stock: 10,
        };

        assert_eq!(pricer.unit_price_cents(&item, 100), 899);
    }

    #[test]
    fn configured_tiers_override_nothing_when_absent() {
        let pricer = TierPricer::new();
        let item = garment_bag(4299);
        assert_eq!(pricer.unit_price_cents(&item, 50), 4299);
    }

    #[test]
    fn negative_base_price_clamps_to_zero() {
        let pricer = TierPricer::new();
        let item = garment_bag(-5);
        assert_eq!(pricer.unit_price_cents(&item, 1), 0);
    }
}
