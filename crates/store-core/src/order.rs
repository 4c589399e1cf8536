//! # Order Types
//!
//! The canonical order record. Lines are denormalized copies of catalog
//! data taken at assembly time; an order is immune to later catalog edits
//! and is never re-priced after creation.

use crate::catalog::{CatalogItem, Currency};
use crate::money::format_cents;
use crate::processor::ProcessorEnvironment;
use crate::shipping::{ShippingQuote, ShippingZone};
use crate::tax::TaxBreakdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an order line represents.
///
/// Assigned at creation; downstream consumers (the invoice engine in
/// particular) partition by this tag instead of re-inferring it from
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Product,
    Shipping,
    Tax,
}

/// A denormalized order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    /// Catalog item ID (or a synthetic id for shipping/tax lines)
    pub item_id: String,

    /// Display name at time of order
    pub name: String,

    /// Description at time of order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Unit price in minor currency units at time of order
    pub unit_price_cents: i64,

    /// Quantity
    pub quantity: u32,

    /// Line classification
    pub kind: LineKind,
}

impl OrderLine {
    /// Build a product line from a resolved catalog item at a resolved
    /// unit price (tier pricing already applied by the caller).
    pub fn from_catalog_item(item: &CatalogItem, unit_price_cents: i64, quantity: u32) -> Self {
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            unit_price_cents,
            quantity,
            kind: LineKind::Product,
        }
    }

    /// Total for this line
    pub fn total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity as i64
    }
}

/// Customer snapshot captured on the order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_notes: Option<String>,
}

/// Shipping as captured on the order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingSnapshot {
    pub zone: ShippingZone,
    pub label: String,

    /// Amount actually billed (zero when undetermined)
    pub cost_cents: i64,

    /// True when no real quote existed; a human follows up on delivery
    /// charges and the zero above is a placeholder, not a price
    #[serde(default)]
    pub undetermined: bool,
}

impl From<&ShippingQuote> for ShippingSnapshot {
    fn from(quote: &ShippingQuote) -> Self {
        Self {
            zone: quote.zone,
            label: quote.label.clone(),
            cost_cents: quote.cost.billable_cents(),
            undetermined: quote.cost.is_undetermined(),
        }
    }
}

/// Tax as captured on the order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSnapshot {
    pub label: String,
    pub gst_cents: i64,
    pub qst_cents: i64,
    pub total_cents: i64,
}

impl From<&TaxBreakdown> for TaxSnapshot {
    fn from(tax: &TaxBreakdown) -> Self {
        Self {
            label: tax.label.clone(),
            gst_cents: tax.gst_cents,
            qst_cents: tax.qst_cents,
            total_cents: tax.total_cents,
        }
    }
}

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Invoice later; the order is fulfilled manually
    PayLater,
    /// Hosted card checkout through the payment processor
    Card,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::PayLater => "pay_later",
            PaymentMethod::Card => "card",
        };
        write!(f, "{}", s)
    }
}

/// Order lifecycle status.
///
/// `pending -> paid | canceled`; pay-later orders may instead go
/// `pending -> fulfilled`. All three non-pending states are terminal
/// (refunds are not modeled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Canceled,
    Fulfilled,
}

impl OrderStatus {
    /// Whether `self -> next` is an allowed transition for an order paid
    /// by `method`.
    pub fn can_transition_to(self, next: OrderStatus, method: PaymentMethod) -> bool {
        match (self, next) {
            (OrderStatus::Pending, OrderStatus::Paid) => true,
            (OrderStatus::Pending, OrderStatus::Canceled) => true,
            (OrderStatus::Pending, OrderStatus::Fulfilled) => {
                method == PaymentMethod::PayLater
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Fulfilled => "fulfilled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// External payment-processor identifiers attached after a checkout
/// session is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorRefs {
    /// Hosted checkout session / payment link id
    pub session_id: String,

    /// Processor-side order id (what reconciliation queries)
    pub processor_order_id: String,

    /// Which credential environment created the session
    pub environment: ProcessorEnvironment,
}

/// The canonical order record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID (e.g. `ORD-1756147200000-9F3A2C`)
    pub id: String,

    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub customer: CustomerInfo,

    /// Denormalized lines (self-contained; never re-read from catalog)
    pub lines: Vec<OrderLine>,

    pub shipping: ShippingSnapshot,
    pub tax: TaxSnapshot,

    /// Sum of line totals
    pub subtotal_cents: i64,

    /// `subtotal + shipping.cost + tax.total`, tolerance zero
    pub total_cents: i64,

    pub currency: Currency,

    /// Set by the payment session broker, nullable until then
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<ProcessorRefs>,

    /// Set by the invoice sync engine, nullable until then
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Generate a fresh order id: millisecond timestamp for rough
    /// ordering plus a random suffix for uniqueness.
    pub fn generate_id(now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "ORD-{}-{}",
            now.timestamp_millis(),
            suffix[..6].to_uppercase()
        )
    }

    /// Sum of line totals (all kinds)
    pub fn lines_subtotal_cents(&self) -> i64 {
        self.lines.iter().map(|l| l.total_cents()).sum()
    }

    /// Checks the total invariant:
    /// `total == subtotal(lines) + shipping.cost + tax.total`.
    pub fn totals_consistent(&self) -> bool {
        self.subtotal_cents == self.lines_subtotal_cents()
            && self.total_cents
                == self.subtotal_cents + self.shipping.cost_cents + self.tax.total_cents
    }

    /// Lines tagged as products
    pub fn product_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|l| l.kind == LineKind::Product)
    }

    /// Total units across all product lines
    pub fn item_count(&self) -> u32 {
        self.product_lines().map(|l| l.quantity).sum()
    }

    /// One-line human summary of the products, for notifications and the
    /// ledger mirror (e.g. `22 x Garment Bag 54" @ $36.99`)
    pub fn line_summary(&self) -> String {
        self.product_lines()
            .map(|l| {
                format!(
                    "{} x {} @ {}",
                    l.quantity,
                    l.name,
                    format_cents(l.unit_price_cents)
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
