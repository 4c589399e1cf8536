//! # Catalog Types
//!
//! Catalog items for the storefront. The catalog itself is owned by an
//! external store (see [`crate::stores::CatalogStore`]); these types are
//! the shape of what it serves, plus the TOML file format used to seed
//! the in-memory store (`config/products.toml`).

use crate::pricing::TierConfig;
use serde::{Deserialize, Serialize};

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    CAD,
    USD,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::CAD => "CAD",
            Currency::USD => "USD",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::CAD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An item in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Unique item identifier (e.g., "GB-54")
    pub id: String,

    /// Display name
    pub name: String,

    /// Short description (denormalized onto order lines)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Base unit price in minor currency units
    pub base_price_cents: i64,

    /// Currency
    #[serde(default)]
    pub currency: Currency,

    /// Pricing category (drives volume tiers)
    pub category: String,

    /// Units currently available
    #[serde(default)]
    pub stock: u32,
}

/// Catalog file contents (loaded from `config/products.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub items: Vec<CatalogItem>,

    /// Per-category volume tiers; when absent the built-in table applies
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Find an item by ID
    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Load a catalog from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
