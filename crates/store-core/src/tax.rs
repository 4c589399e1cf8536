//! # Destination Tax Calculator
//!
//! Pure function mapping (subtotal, destination region) to a tax
//! breakdown. Canadian provinces and territories are covered by a static
//! table; an unknown region yields zero tax rather than an error, since
//! the storefront also quotes for destinations it cannot tax-rate.
//!
//! Each component is rounded half-up independently and the total is the
//! sum of the rounded components (see [`crate::money::apply_rate`]).

use crate::money::apply_rate;
use serde::{Deserialize, Serialize};

/// Rate table entry. Rates are thousandths of a percent
/// ([`crate::money::RATE_SCALE`]); `secondary_rate` carries Quebec's QST.
struct RegionRate {
    code: &'static str,
    label: &'static str,
    rate: u32,
    secondary_rate: Option<u32>,
}

const REGION_RATES: &[RegionRate] = &[
    RegionRate { code: "ON", label: "HST 13%", rate: 13_000, secondary_rate: None },
    RegionRate { code: "NS", label: "HST 15%", rate: 15_000, secondary_rate: None },
    RegionRate { code: "NB", label: "HST 15%", rate: 15_000, secondary_rate: None },
    RegionRate { code: "NL", label: "HST 15%", rate: 15_000, secondary_rate: None },
    RegionRate { code: "PE", label: "HST 15%", rate: 15_000, secondary_rate: None },
    RegionRate { code: "AB", label: "GST 5%", rate: 5_000, secondary_rate: None },
    RegionRate { code: "BC", label: "GST 5%", rate: 5_000, secondary_rate: None },
    RegionRate { code: "SK", label: "GST 5%", rate: 5_000, secondary_rate: None },
    RegionRate { code: "MB", label: "GST 5%", rate: 5_000, secondary_rate: None },
    RegionRate { code: "QC", label: "GST 5% + QST 9.975%", rate: 5_000, secondary_rate: Some(9_975) },
    RegionRate { code: "YT", label: "GST 5%", rate: 5_000, secondary_rate: None },
    RegionRate { code: "NT", label: "GST 5%", rate: 5_000, secondary_rate: None },
    RegionRate { code: "NU", label: "GST 5%", rate: 5_000, secondary_rate: None },
];

/// Tax charged on an order, broken into rate components.
///
/// Invariant: `total_cents == gst_cents + qst_cents`. `qst_cents` is zero
/// everywhere except Quebec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    /// Human label for the applied rate (e.g. "HST 13%")
    pub label: String,

    /// Primary component (GST or HST)
    pub gst_cents: i64,

    /// Secondary component (QST), zero outside Quebec
    pub qst_cents: i64,

    /// Sum of components
    pub total_cents: i64,
}

impl TaxBreakdown {
    /// Zero tax with a generic label, used for unrated regions
    pub fn zero() -> Self {
        Self {
            label: "Tax".to_string(),
            gst_cents: 0,
            qst_cents: 0,
            total_cents: 0,
        }
    }
}

/// Compute the tax owed on `subtotal_cents` shipped to `region_code`.
///
/// The region code is matched case-insensitively after trimming. Unknown
/// regions (and non-positive subtotals) produce a zero breakdown.
pub fn calculate_tax(subtotal_cents: i64, region_code: &str) -> TaxBreakdown {
    let normalized = region_code.trim().to_ascii_uppercase();
    let Some(entry) = REGION_RATES.iter().find(|r| r.code == normalized) else {
        return TaxBreakdown::zero();
    };

    let gst_cents = apply_rate(subtotal_cents, entry.rate);
    let qst_cents = entry
        .secondary_rate
        .map(|rate| apply_rate(subtotal_cents, rate))
        .unwrap_or(0);

    TaxBreakdown {
        label: entry.label.to_string(),
        gst_cents,
        qst_cents,
        total_cents: gst_cents + qst_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ontario_hst_matches_the_quoted_scenario() {
        // round(81378 * 0.13) = 10579
        let tax = calculate_tax(81_378, "ON");
        assert_eq!(tax.gst_cents, 10_579);
        assert_eq!(tax.qst_cents, 0);
        assert_eq!(tax.total_cents, 10_579);
        assert_eq!(tax.label, "HST 13%");
    }

    #[test]
    fn quebec_charges_both_components_rounded_separately() {
        let tax = calculate_tax(10_000, "QC");
        assert_eq!(tax.gst_cents, 500); // 5%
        assert_eq!(tax.qst_cents, 998); // 9.975% = 997.5, rounds up
        assert_eq!(tax.total_cents, 1_498);
    }

    #[test]
    fn components_always_sum_to_total() {
        for region in ["ON", "NS", "NB", "NL", "PE", "AB", "BC", "SK", "MB", "QC", "YT", "NT", "NU", "XX", ""] {
            for subtotal in [0_i64, 1, 99, 4_299, 81_378, 1_000_000] {
                let tax = calculate_tax(subtotal, region);
                assert_eq!(
                    tax.total_cents,
                    tax.gst_cents + tax.qst_cents,
                    "components drifted for {} @ {}",
                    region,
                    subtotal
                );
            }
        }
    }

    #[test]
    fn unknown_region_is_zero_not_an_error() {
        let tax = calculate_tax(50_000, "NY");
        assert_eq!(tax.total_cents, 0);
        assert_eq!(tax.label, "Tax");
    }

    #[test]
    fn region_codes_normalize() {
        assert_eq!(calculate_tax(10_000, " on ").total_cents, 1_300);
        assert_eq!(calculate_tax(10_000, "On").total_cents, 1_300);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let a = calculate_tax(81_378, "ON");
        let b = calculate_tax(81_378, "ON");
        assert_eq!(a, b);
    }
}
