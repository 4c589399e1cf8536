//! # Ledger Rows
//!
//! Row shapes for the back-office ledger mirror: one append-only "Orders"
//! tab and a fully-replaced "Products" tab. The transport is the
//! `store_core::LedgerMirror` collaborator; the runtime impl here logs,
//! and a spreadsheet transport can be dropped in without touching the row
//! builders.

use async_trait::async_trait;
use chrono::Utc;
use store_core::money::format_cents;
use store_core::{CatalogItem, LedgerMirror, Order, StoreResult};
use tracing::info;

pub const ORDERS_TAB: &str = "Orders";
pub const PRODUCTS_TAB: &str = "Products";

/// One "Orders" row, appended at placement time
pub fn order_row(order: &Order) -> Vec<String> {
    vec![
        order.created_at.to_rfc3339(),
        order.id.clone(),
        order.customer.name.clone(),
        order.customer.email.clone(),
        order.status.to_string(),
        order.payment_method.to_string(),
        order.line_summary(),
        format_cents(order.total_cents),
    ]
}

/// Full "Products" tab contents, header row first
pub fn catalog_rows(items: &[CatalogItem]) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(items.len() + 1);
    rows.push(
        ["Updated At", "Item ID", "Name", "Category", "Price", "Currency", "Stock"]
            .map(String::from)
            .into(),
    );

    let updated_at = Utc::now().to_rfc3339();
    for item in items {
        rows.push(vec![
            updated_at.clone(),
            item.id.clone(),
            item.name.clone(),
            item.category.clone(),
            format_cents(item.base_price_cents),
            item.currency.to_string(),
            item.stock.to_string(),
        ]);
    }
    rows
}

/// Runtime mirror: structured log lines instead of a spreadsheet write
pub struct TracingLedger;

#[async_trait]
impl LedgerMirror for TracingLedger {
    async fn append_row(&self, tab: &str, row: &[String]) -> StoreResult<()> {
        info!(tab, row = %row.join(" | "), "Ledger row appended");
        Ok(())
    }

    async fn replace_sheet(&self, tab: &str, rows: &[Vec<String>]) -> StoreResult<()> {
        info!(tab, rows = rows.len(), "Ledger sheet replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use store_core::order::{
        CustomerInfo, LineKind, OrderLine, OrderStatus, PaymentMethod, ShippingSnapshot,
        TaxSnapshot,
    };
    use store_core::{Currency, ShippingZone};

    fn sample_order() -> Order {
        Order {
            id: "ORD-1756147200000-9F3A2C".into(),
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::PayLater,
            customer: CustomerInfo {
                name: "Ada Test".into(),
                email: "ada@example.com".into(),
                ..Default::default()
            },
            lines: vec![OrderLine {
                item_id: "GB-54".into(),
                name: "Garment Bag 54\"".into(),
                description: None,
                unit_price_cents: 3699,
                quantity: 22,
                kind: LineKind::Product,
            }],
            shipping: ShippingSnapshot {
                zone: ShippingZone::Gta,
                label: "Standard delivery (GTA) - Free".into(),
                cost_cents: 0,
                undetermined: false,
            },
            tax: TaxSnapshot {
                label: "HST 13%".into(),
                gst_cents: 10_579,
                qst_cents: 0,
                total_cents: 10_579,
            },
            subtotal_cents: 81_378,
            total_cents: 91_957,
            currency: Currency::CAD,
            processor: None,
            invoice_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn order_row_field_order_is_stable() {
        let row = order_row(&sample_order());
        assert_eq!(row.len(), 8);
        assert_eq!(row[1], "ORD-1756147200000-9F3A2C");
        assert_eq!(row[4], "pending");
        assert_eq!(row[5], "pay_later");
        assert_eq!(row[6], "22 x Garment Bag 54\" @ $36.99");
        assert_eq!(row[7], "$919.57");
    }

    #[test]
    fn catalog_rows_lead_with_the_header() {
        let items = vec![CatalogItem {
            id: "GB-54".into(),
            name: "Garment Bag 54\"".into(),
            description: None,
            base_price_cents: 4299,
            currency: Currency::CAD,
            category: "Garment Bags".into(),
            stock: 120,
        }];

        let rows = catalog_rows(&items);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], "Item ID");
        assert_eq!(rows[1][1], "GB-54");
        assert_eq!(rows[1][4], "$42.99");
        assert_eq!(rows[1][6], "120");
    }
}
