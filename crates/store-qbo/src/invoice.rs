//! # Invoice Sync Engine
//!
//! Idempotent mirror of storefront orders into QuickBooks invoices.
//!
//! The order id is written into the invoice's `DocNumber`, and every sync
//! first queries by that DocNumber, so running the sync any number of
//! times yields exactly one invoice per order. Amounts cross from integer
//! cents to decimal dollars here and nowhere else.

use crate::client::QboClient;
use crate::config::{QboConfig, TaxStrategy};
use crate::oauth::TokenManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store_core::money::cents_to_decimal;
use store_core::order::{CustomerInfo, LineKind, Order};
use store_core::{StoreError, StoreResult};
use tracing::{info, instrument, warn};

/// What an upsert produced: the QuickBooks invoice id and whether an
/// existing invoice was found instead of created
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSyncOutcome {
    pub invoice_id: String,
    pub reused: bool,
}

pub struct InvoiceEngine {
    config: QboConfig,
    client: QboClient,
}

impl InvoiceEngine {
    pub fn new(config: QboConfig, tokens: Arc<TokenManager>) -> Self {
        let client = QboClient::new(config.clone(), tokens);
        Self { config, client }
    }

    /// Create (or find) the QuickBooks invoice for `order`.
    ///
    /// Config and input checks run before any network call. `send_email`
    /// overrides the configured default when set; emailing is best-effort
    /// either way and never fails the sync.
    #[instrument(skip(self, order, send_email), fields(order_id = %order.id))]
    pub async fn upsert_invoice(
        &self,
        order: &Order,
        send_email: Option<bool>,
    ) -> StoreResult<InvoiceSyncOutcome> {
        let default_item = self
            .config
            .default_item_id
            .as_deref()
            .ok_or_else(|| StoreError::not_configured("QBO_DEFAULT_ITEM_ID"))?;

        let email = order.customer.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(StoreError::validation(
                "customer email is required for invoice sync",
            ));
        }

        let send = send_email.unwrap_or(self.config.email_invoices);

        let bill_addr = build_bill_addr(&order.customer);
        let customer_id = self
            .find_or_create_customer(&order.customer, &email, bill_addr.clone())
            .await?;

        // DocNumber idempotency: reuse before create
        let statement = format!(
            "select Id, DocNumber from Invoice where DocNumber = '{}'",
            sql_string(&order.id)
        );
        let existing: InvoiceQueryEnvelope = self.client.query(&statement).await?;
        if let Some(found) = existing.body.invoices.into_iter().next() {
            info!(invoice_id = %found.id, "Invoice already exists for this order, reusing");
            if send {
                self.send_invoice(&found.id, &email).await;
            }
            return Ok(InvoiceSyncOutcome {
                invoice_id: found.id,
                reused: true,
            });
        }

        let lines = self.build_lines(order, default_item);
        if lines.is_empty() {
            return Err(StoreError::validation("order has no lines to invoice"));
        }

        let payload = InvoicePayload {
            doc_number: order.id.clone(),
            customer_ref: Ref::new(customer_id),
            bill_email: EmailAddress {
                address: email.clone(),
            },
            private_note: format!("Northstar Packaging order {}", order.id),
            lines,
            currency_ref: Ref::new(order.currency.as_str()),
            bill_addr,
        };

        let created: InvoiceCreateEnvelope = self.client.create("invoice", &payload).await?;
        info!(invoice_id = %created.invoice.id, "Invoice created");

        if send {
            self.send_invoice(&created.invoice.id, &email).await;
        }

        Ok(InvoiceSyncOutcome {
            invoice_id: created.invoice.id,
            reused: false,
        })
    }

    async fn find_or_create_customer(
        &self,
        customer: &CustomerInfo,
        email: &str,
        bill_addr: Option<BillingAddress>,
    ) -> StoreResult<String> {
        let statement = format!(
            "select Id, DisplayName, PrimaryEmailAddr from Customer where PrimaryEmailAddr = '{}'",
            sql_string(email)
        );
        let found: CustomerQueryEnvelope = self.client.query(&statement).await?;
        if let Some(existing) = found.body.customers.into_iter().next() {
            return Ok(existing.id);
        }

        let payload = CustomerPayload {
            display_name: display_name(customer, email),
            primary_email: EmailAddress {
                address: email.to_string(),
            },
            primary_phone: customer.phone.as_ref().map(|phone| Phone {
                free_form_number: phone.clone(),
            }),
            bill_addr,
        };
        let created: CustomerCreateEnvelope = self.client.create("customer", &payload).await?;
        info!(customer_id = %created.customer.id, "QuickBooks customer created");
        Ok(created.customer.id)
    }

    /// Emailing the invoice is best-effort; a failure is logged and the
    /// sync outcome stands.
    async fn send_invoice(&self, invoice_id: &str, send_to: &str) {
        let path = format!("invoice/{}/send", invoice_id);
        if let Err(err) = self.client.post_empty(&path, &[("sendTo", send_to)]).await {
            warn!(invoice_id, error = %err, "Failed to email invoice");
        }
    }

    /// Invoice lines: tagged product lines, then shipping, then tax per
    /// the configured strategy. Shipping and tax fall back to the order
    /// snapshots when no tagged line exists; zero amounts post nothing.
    fn build_lines(&self, order: &Order, default_item: &str) -> Vec<InvoiceLine> {
        let mut lines: Vec<InvoiceLine> = order
            .product_lines()
            .map(|line| {
                sales_line(
                    line.name.clone(),
                    line.quantity.max(1),
                    line.unit_price_cents.max(0),
                    default_item,
                )
            })
            .collect();

        let shipping_item = self
            .config
            .shipping_item_id
            .as_deref()
            .unwrap_or(default_item);
        let (shipping_label, shipping_cents) = match order
            .lines
            .iter()
            .find(|l| l.kind == LineKind::Shipping)
        {
            Some(line) => (line.name.clone(), line.total_cents()),
            None => (order.shipping.label.clone(), order.shipping.cost_cents),
        };
        if shipping_cents > 0 {
            lines.push(sales_line(shipping_label, 1, shipping_cents, shipping_item));
        }

        match self.config.tax_strategy {
            TaxStrategy::Qbo => {
                if let Some(code) = self.config.tax_code_id.as_deref() {
                    for line in &mut lines {
                        line.detail.tax_code_ref = Some(Ref::new(code));
                    }
                }
            }
            TaxStrategy::Line => {
                let tax_item = self.config.tax_item_id.as_deref().unwrap_or(default_item);
                let (tax_label, tax_cents) =
                    match order.lines.iter().find(|l| l.kind == LineKind::Tax) {
                        Some(line) => (line.name.clone(), line.total_cents()),
                        None => (order.tax.label.clone(), order.tax.total_cents),
                    };
                if tax_cents > 0 {
                    lines.push(sales_line(tax_label, 1, tax_cents, tax_item));
                }
            }
            TaxStrategy::None => {}
        }

        lines
    }
}

/// QuickBooks query literals escape single quotes by doubling them
fn sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// DisplayName: customer name, else email, else a generic placeholder;
/// QuickBooks caps the field at 100 characters
fn display_name(customer: &CustomerInfo, email: &str) -> String {
    let name = customer.name.trim();
    let name = if name.is_empty() { email } else { name };
    let name = if name.is_empty() { "Customer" } else { name };
    name.chars().take(100).collect()
}

fn build_bill_addr(customer: &CustomerInfo) -> Option<BillingAddress> {
    let trimmed = |field: &Option<String>| {
        field
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let line1 = trimmed(&customer.address);
    let city = trimmed(&customer.city);
    let region = trimmed(&customer.region);
    let postal_code = trimmed(&customer.postal_code);

    if line1.is_none() && city.is_none() && region.is_none() && postal_code.is_none() {
        return None;
    }

    Some(BillingAddress {
        line1,
        city,
        region,
        postal_code,
        country: trimmed(&customer.country).unwrap_or_else(|| "Canada".to_string()),
    })
}

fn sales_line(description: String, qty: u32, unit_cents: i64, item_ref: &str) -> InvoiceLine {
    InvoiceLine {
        detail_type: "SalesItemLineDetail",
        amount: cents_to_decimal(unit_cents * qty as i64),
        description: Some(description),
        detail: SalesItemDetail {
            item_ref: Ref::new(item_ref),
            qty,
            unit_price: cents_to_decimal(unit_cents),
            tax_code_ref: None,
        },
    }
}

// =============================================================================
// QuickBooks wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct CustomerPayload {
    #[serde(rename = "DisplayName")]
    display_name: String,
    #[serde(rename = "PrimaryEmailAddr")]
    primary_email: EmailAddress,
    #[serde(rename = "PrimaryPhone", skip_serializing_if = "Option::is_none")]
    primary_phone: Option<Phone>,
    #[serde(rename = "BillAddr", skip_serializing_if = "Option::is_none")]
    bill_addr: Option<BillingAddress>,
}

#[derive(Debug, Clone, Serialize)]
struct EmailAddress {
    #[serde(rename = "Address")]
    address: String,
}

#[derive(Debug, Serialize)]
struct Phone {
    #[serde(rename = "FreeFormNumber")]
    free_form_number: String,
}

#[derive(Debug, Clone, Serialize)]
struct BillingAddress {
    #[serde(rename = "Line1", skip_serializing_if = "Option::is_none")]
    line1: Option<String>,
    #[serde(rename = "City", skip_serializing_if = "Option::is_none")]
    city: Option<String>,
    #[serde(rename = "CountrySubDivisionCode", skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(rename = "PostalCode", skip_serializing_if = "Option::is_none")]
    postal_code: Option<String>,
    #[serde(rename = "Country")]
    country: String,
}

#[derive(Debug, Serialize)]
struct InvoicePayload {
    #[serde(rename = "DocNumber")]
    doc_number: String,
    #[serde(rename = "CustomerRef")]
    customer_ref: Ref,
    #[serde(rename = "BillEmail")]
    bill_email: EmailAddress,
    #[serde(rename = "PrivateNote")]
    private_note: String,
    #[serde(rename = "Line")]
    lines: Vec<InvoiceLine>,
    #[serde(rename = "CurrencyRef")]
    currency_ref: Ref,
    #[serde(rename = "BillAddr", skip_serializing_if = "Option::is_none")]
    bill_addr: Option<BillingAddress>,
}

#[derive(Debug, Serialize)]
struct InvoiceLine {
    #[serde(rename = "DetailType")]
    detail_type: &'static str,
    #[serde(rename = "Amount")]
    amount: f64,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "SalesItemLineDetail")]
    detail: SalesItemDetail,
}

#[derive(Debug, Serialize)]
struct SalesItemDetail {
    #[serde(rename = "ItemRef")]
    item_ref: Ref,
    #[serde(rename = "Qty")]
    qty: u32,
    #[serde(rename = "UnitPrice")]
    unit_price: f64,
    #[serde(rename = "TaxCodeRef", skip_serializing_if = "Option::is_none")]
    tax_code_ref: Option<Ref>,
}

#[derive(Debug, Clone, Serialize)]
struct Ref {
    value: String,
}

impl Ref {
    fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CustomerQueryEnvelope {
    #[serde(rename = "QueryResponse", default)]
    body: CustomerQueryBody,
}

#[derive(Debug, Default, Deserialize)]
struct CustomerQueryBody {
    #[serde(rename = "Customer", default)]
    customers: Vec<EntityRef>,
}

#[derive(Debug, Deserialize)]
struct InvoiceQueryEnvelope {
    #[serde(rename = "QueryResponse", default)]
    body: InvoiceQueryBody,
}

#[derive(Debug, Default, Deserialize)]
struct InvoiceQueryBody {
    #[serde(rename = "Invoice", default)]
    invoices: Vec<EntityRef>,
}

#[derive(Debug, Deserialize)]
struct CustomerCreateEnvelope {
    #[serde(rename = "Customer")]
    customer: EntityRef,
}

#[derive(Debug, Deserialize)]
struct InvoiceCreateEnvelope {
    #[serde(rename = "Invoice")]
    invoice: EntityRef,
}

#[derive(Debug, Deserialize)]
struct EntityRef {
    #[serde(rename = "Id")]
    id: String,
}
