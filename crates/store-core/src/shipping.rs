//! # Shipping Zone Calculator
//!
//! Pure function mapping a destination postal code to a shipping zone and
//! cost. Only the Greater Toronto Area has a real (free) quote; everywhere
//! else the cost is undetermined and a human follows up. "Undetermined" is
//! a distinct state, not a zero: it bills as zero so order totals stay
//! exact, but the distinction is preserved on the order snapshot.

use serde::{Deserialize, Serialize};

/// Shipping zone derived from the postal prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShippingZone {
    /// Greater Toronto Area (postal prefixes M and L)
    #[serde(rename = "GTA")]
    Gta,
    /// Rest of Canada
    Canada,
    /// Destination could not be classified (empty/garbage postal code)
    Unknown,
}

impl ShippingZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingZone::Gta => "GTA",
            ShippingZone::Canada => "Canada",
            ShippingZone::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ShippingZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shipping cost: either an actual quote or "we will contact you".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingCost {
    /// A genuine quote in minor currency units
    Quoted(i64),
    /// No quote exists; a human follows up. Bills as zero.
    Undetermined,
}

impl ShippingCost {
    /// The amount actually charged on the order total
    pub fn billable_cents(&self) -> i64 {
        match self {
            ShippingCost::Quoted(cents) => *cents,
            ShippingCost::Undetermined => 0,
        }
    }

    pub fn is_undetermined(&self) -> bool {
        matches!(self, ShippingCost::Undetermined)
    }
}

/// Result of a shipping quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingQuote {
    pub zone: ShippingZone,
    pub label: String,
    pub cost: ShippingCost,
}

/// Uppercase and strip everything that is not ASCII alphanumeric
fn normalize_postal(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Quote shipping for a destination postal code.
///
/// The zone is a pure function of the normalized postal prefix: `M` and
/// `L` map to the GTA (free standard delivery), any other non-empty code
/// maps to the Canada-wide zone, and an empty/unusable code maps to the
/// Unknown zone. The two non-GTA zones carry an undetermined cost.
pub fn quote_shipping(destination: &str) -> ShippingQuote {
    let clean = normalize_postal(destination);
    if clean.is_empty() {
        return ShippingQuote {
            zone: ShippingZone::Unknown,
            label: "Delivery charges - Contact us".to_string(),
            cost: ShippingCost::Undetermined,
        };
    }

    match clean.as_bytes()[0] {
        b'M' | b'L' => ShippingQuote {
            zone: ShippingZone::Gta,
            label: "Standard delivery (GTA) - Free".to_string(),
            cost: ShippingCost::Quoted(0),
        },
        _ => ShippingQuote {
            zone: ShippingZone::Canada,
            label: "Delivery charges - Contact us".to_string(),
            cost: ShippingCost::Undetermined,
        },
    }
}
