//! # Order Assembler
//!
//! Combines cart lines with the pricing, tax, and shipping calculators
//! into the canonical order record. This is the single place order totals
//! are computed; nothing downstream ever re-prices.
//!
//! The assembler is pure: catalog items are resolved by the caller and
//! passed in, and the staged stock decrements are returned for the caller
//! to apply (order insert first, then decrements; see the placement
//! service).

use crate::catalog::{CatalogItem, Currency};
use crate::error::{StoreError, StoreResult};
use crate::order::{CustomerInfo, LineKind, Order, OrderLine, OrderStatus, PaymentMethod};
use crate::pricing::TierPricer;
use crate::shipping::quote_shipping;
use crate::tax::calculate_tax;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A cart line as submitted by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: String,

    pub quantity: u32,

    /// Client-side price snapshot; used only when the catalog lookup
    /// misses, never preferred over live data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_snapshot_cents: Option<i64>,

    /// Client-side name snapshot, same fallback rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_snapshot: Option<String>,
}

/// Where the order ships
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Destination {
    /// Province/territory code (drives tax)
    pub region: String,

    /// Postal code (drives the shipping zone)
    pub postal_code: String,
}

/// A staged inventory write: set `item_id`'s stock to `next_stock`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUpdate {
    pub item_id: String,
    pub next_stock: u32,
}

/// Assembly result: the order plus the inventory writes it implies
#[derive(Debug, Clone)]
pub struct AssembledOrder {
    pub order: Order,
    pub stock_updates: Vec<StockUpdate>,
}

/// Assemble a canonical order from cart lines.
///
/// `resolved` holds the catalog items the caller managed to fetch, keyed
/// by id. A line whose item is missing from the map falls back to its
/// client snapshot (the line survives, the order does not fail); a line
/// with neither live data nor a snapshot price cannot be priced and
/// rejects the order.
pub fn assemble(
    cart: &[CartLine],
    customer: CustomerInfo,
    destination: &Destination,
    method: PaymentMethod,
    resolved: &HashMap<String, CatalogItem>,
    pricer: &TierPricer,
) -> StoreResult<AssembledOrder> {
    if customer.email.trim().is_empty() {
        return Err(StoreError::validation("customer email is required"));
    }
    if cart.is_empty() {
        return Err(StoreError::validation("order has no items"));
    }

    let mut lines = Vec::with_capacity(cart.len());
    let mut stock_updates = Vec::new();
    let mut currency: Option<Currency> = None;

    for cart_line in cart {
        if cart_line.quantity == 0 {
            return Err(StoreError::validation(format!(
                "quantity for item {} must be at least 1",
                cart_line.item_id
            )));
        }

        match resolved.get(&cart_line.item_id) {
            Some(item) => {
                let unit_price_cents = pricer.unit_price_cents(item, cart_line.quantity);
                lines.push(OrderLine::from_catalog_item(
                    item,
                    unit_price_cents,
                    cart_line.quantity,
                ));
                currency.get_or_insert(item.currency);
                stock_updates.push(StockUpdate {
                    item_id: item.id.clone(),
                    next_stock: item.stock.saturating_sub(cart_line.quantity),
                });
            }
            None => {
                let Some(snapshot_cents) = cart_line.price_snapshot_cents else {
                    return Err(StoreError::validation(format!(
                        "item {} is unavailable and carries no price snapshot",
                        cart_line.item_id
                    )));
                };
                lines.push(OrderLine {
                    item_id: cart_line.item_id.clone(),
                    name: cart_line
                        .name_snapshot
                        .clone()
                        .unwrap_or_else(|| cart_line.item_id.clone()),
                    description: None,
                    unit_price_cents: snapshot_cents.max(0),
                    quantity: cart_line.quantity,
                    kind: LineKind::Product,
                });
            }
        }
    }

    let subtotal_cents: i64 = lines.iter().map(|l| l.total_cents()).sum();
    let tax = calculate_tax(subtotal_cents, &destination.region);
    let shipping = quote_shipping(&destination.postal_code);
    let total_cents = subtotal_cents + shipping.cost.billable_cents() + tax.total_cents;

    let now = Utc::now();
    let order = Order {
        id: Order::generate_id(now),
        status: OrderStatus::Pending,
        payment_method: method,
        customer,
        lines,
        shipping: (&shipping).into(),
        tax: (&tax).into(),
        subtotal_cents,
        total_cents,
        currency: currency.unwrap_or_default(),
        processor: None,
        invoice_id: None,
        created_at: now,
    };

    debug_assert!(order.totals_consistent());

    Ok(AssembledOrder {
        order,
        stock_updates,
    })
}
