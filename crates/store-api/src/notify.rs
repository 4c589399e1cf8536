//! # Notification Content
//!
//! Plain-text builders for the two outbound messages (customer receipt,
//! admin alert) and the runtime `Notifier` that logs instead of sending.
//! Real delivery lives behind the `store_core::Notifier` trait; swapping
//! in a mail transport touches nothing here but the impl.

use async_trait::async_trait;
use store_core::money::format_cents;
use store_core::{Message, Notifier, Order, OrderStatus, StoreResult};
use tracing::info;

/// Customer receipt: lines with unit prices, shipping, tax, total, and
/// the delivery address we captured
pub fn receipt_message(order: &Order) -> Message {
    let mut body = String::new();

    body.push_str(&format!("Thanks for your order, {}!\n\n", order.customer.name));
    body.push_str(&format!("Order {}\n", order.id));

    for line in order.product_lines() {
        body.push_str(&format!(
            "  {} x {} @ {}\n",
            line.quantity,
            line.name,
            format_cents(line.unit_price_cents)
        ));
    }

    if order.shipping.cost_cents > 0 {
        body.push_str(&format!(
            "Shipping: {} - {}\n",
            order.shipping.label,
            format_cents(order.shipping.cost_cents)
        ));
    } else {
        body.push_str(&format!("Shipping: {}\n", order.shipping.label));
    }

    if order.tax.total_cents > 0 {
        body.push_str(&format!(
            "{}: {}\n",
            order.tax.label,
            format_cents(order.tax.total_cents)
        ));
    }

    body.push_str(&format!(
        "Total: {} {}\n",
        format_cents(order.total_cents),
        order.currency
    ));

    let address = delivery_address(order);
    if !address.is_empty() {
        body.push_str(&format!("\nDelivery address:\n{}\n", address));
    }

    Message {
        to: order.customer.email.clone(),
        subject: format!("Order {} confirmed", order.id),
        body,
    }
}

/// Admin alert: who ordered what, how they pay, where it stands
pub fn admin_message(order: &Order, to: &str) -> Message {
    let subject = match order.status {
        OrderStatus::Paid => format!("Order {} paid", order.id),
        OrderStatus::Fulfilled => format!("Order {} fulfilled", order.id),
        _ => format!("New {} order {}", order.payment_method, order.id),
    };

    let body = format!(
        "Order {}\nStatus: {}\nPayment: {}\nItems: {}\nTotal: {} {}\nCustomer: {} <{}>{}\n",
        order.id,
        order.status,
        order.payment_method,
        order.line_summary(),
        format_cents(order.total_cents),
        order.currency,
        order.customer.name,
        order.customer.email,
        order
            .customer
            .phone
            .as_deref()
            .map(|p| format!(" / {}", p))
            .unwrap_or_default(),
    );

    Message {
        to: to.to_string(),
        subject,
        body,
    }
}

fn delivery_address(order: &Order) -> String {
    let customer = &order.customer;
    let mut parts = Vec::new();
    if let Some(address) = customer.address.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(address.to_string());
    }
    let city_line: Vec<&str> = [
        customer.city.as_deref(),
        customer.region.as_deref(),
        customer.postal_code.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.trim().is_empty())
    .collect();
    if !city_line.is_empty() {
        parts.push(city_line.join(", "));
    }
    parts.join("\n")
}

/// Runtime notifier: structured log lines instead of real delivery
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, message: &Message) -> StoreResult<()> {
        info!(to = %message.to, subject = %message.subject, "Notification dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use store_core::order::{
        CustomerInfo, LineKind, OrderLine, PaymentMethod, ShippingSnapshot, TaxSnapshot,
    };
    use store_core::{Currency, ShippingZone};

    fn paid_order() -> Order {
        Order {
            id: "ORD-1756147200000-9F3A2C".into(),
            status: OrderStatus::Paid,
            payment_method: PaymentMethod::Card,
            customer: CustomerInfo {
                name: "Ada Test".into(),
                email: "ada@example.com".into(),
                phone: Some("416-555-0100".into()),
                address: Some("100 Queen St W".into()),
                city: Some("Toronto".into()),
                region: Some("ON".into()),
                postal_code: Some("M5H 2N2".into()),
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
    fn receipt_carries_lines_totals_and_address() {
        let message = receipt_message(&paid_order());

        assert_eq!(message.to, "ada@example.com");
        assert_eq!(message.subject, "Order ORD-1756147200000-9F3A2C confirmed");
        assert!(message.body.contains("22 x Garment Bag 54\" @ $36.99"));
        assert!(message.body.contains("Standard delivery (GTA) - Free"));
        assert!(message.body.contains("HST 13%: $105.79"));
        assert!(message.body.contains("Total: $919.57 CAD"));
        assert!(message.body.contains("Toronto, ON, M5H 2N2"));
    }

    #[test]
    fn free_shipping_renders_the_label_without_an_amount() {
        let message = receipt_message(&paid_order());
        assert!(!message.body.contains("Free - $"));
    }

    #[test]
    fn admin_subject_tracks_the_order_status() {
        let order = paid_order();
        assert_eq!(
            admin_message(&order, "ops@northstarpackaging.ca").subject,
            "Order ORD-1756147200000-9F3A2C paid"
        );

        let mut placed = paid_order();
        placed.status = OrderStatus::Pending;
        placed.payment_method = PaymentMethod::PayLater;
        assert_eq!(
            admin_message(&placed, "ops@northstarpackaging.ca").subject,
            "New pay_later order ORD-1756147200000-9F3A2C"
        );
    }

    #[test]
    fn admin_body_carries_the_customer_contact() {
        let message = admin_message(&paid_order(), "ops@northstarpackaging.ca");
        assert_eq!(message.to, "ops@northstarpackaging.ca");
        assert!(message.body.contains("Ada Test <ada@example.com> / 416-555-0100"));
        assert!(message.body.contains("Total: $919.57 CAD"));
    }
}
