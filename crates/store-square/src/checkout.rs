//! # Square Hosted Checkout
//!
//! Payment-link creation and order-state queries against the Square API.
//! This is the storefront's only card-payment flow: the customer is
//! redirected to a Square-hosted page, and the reconciler later reads the
//! processor-side order state back.
//!
//! In `auto` mode the gateway walks the configured credential candidates
//! (sandbox first) and advances to the next one only when Square rejects
//! the credentials themselves; any other failure propagates immediately.

use crate::config::{SquareConfig, SquareCredentials};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use store_core::processor::{
    CheckoutSession, ProcessorClient, ProcessorEnvironment, ProcessorOrderState,
};
use store_core::{Order, StoreError, StoreResult};
use tracing::{debug, error, info, instrument, warn};

/// Square gateway implementing the storefront's processor contract.
///
/// Holds one HTTP client and up to two credential sets; the environment
/// used for each call is decided per request (create) or dictated by the
/// order's recorded refs (state query).
pub struct SquareGateway {
    config: SquareConfig,
    client: Client,
}

impl SquareGateway {
    /// Create a new gateway from a validated configuration
    pub fn new(config: SquareConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables; `Ok(None)` when the deployment
    /// has no Square configuration at all
    pub fn from_env() -> StoreResult<Option<Self>> {
        Ok(SquareConfig::from_env()?.map(Self::new))
    }

    /// Build Square line items from the order.
    ///
    /// Product lines come from the denormalized order lines; shipping and
    /// tax are appended as synthetic lines so the processor-side total
    /// equals the internal total exactly. A zero shipping quote and a
    /// zero tax both disappear rather than rendering as $0.00 lines.
    fn build_line_items(order: &Order) -> Vec<SquareLineItem> {
        let currency = order.currency.as_str();
        let mut items: Vec<SquareLineItem> = order
            .product_lines()
            .map(|line| SquareLineItem {
                name: line.name.clone(),
                quantity: line.quantity.to_string(),
                base_price_money: SquareMoney {
                    amount: line.unit_price_cents,
                    currency: currency.to_string(),
                },
                note: line.description.clone(),
            })
            .collect();

        if order.shipping.cost_cents > 0 {
            items.push(SquareLineItem {
                name: order.shipping.label.clone(),
                quantity: "1".to_string(),
                base_price_money: SquareMoney {
                    amount: order.shipping.cost_cents,
                    currency: currency.to_string(),
                },
                note: None,
            });
        }

        if order.tax.total_cents > 0 {
            items.push(SquareLineItem {
                name: order.tax.label.clone(),
                quantity: "1".to_string(),
                base_price_money: SquareMoney {
                    amount: order.tax.total_cents,
                    currency: currency.to_string(),
                },
                note: None,
            });
        }

        items
    }

    /// One creation attempt against one credential set
    async fn try_create(
        &self,
        environment: ProcessorEnvironment,
        credentials: &SquareCredentials,
        order: &Order,
        idempotency_key: &str,
        redirect_url: &str,
    ) -> StoreResult<CheckoutSession> {
        let request = CreatePaymentLinkRequest {
            idempotency_key,
            order: SquareOrderBody {
                location_id: &credentials.location_id,
                reference_id: &order.id,
                line_items: Self::build_line_items(order),
            },
            checkout_options: CheckoutOptions { redirect_url },
            pre_populated_data: (!order.customer.email.is_empty()).then(|| PrePopulatedData {
                buyer_email: &order.customer.email,
            }),
        };

        let url = format!(
            "{}/v2/online-checkout/payment-links",
            self.config.base_url(environment)
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", bearer(&credentials.access_token))
            .header("Square-Version", &self.config.api_version)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            error!("Square API error: status={}, body={}", status, body);
            return Err(classify_failure(status, &body));
        }

        let parsed: CreatePaymentLinkResponse = serde_json::from_str(&body).map_err(|e| {
            StoreError::Internal(format!("Failed to parse Square payment-link response: {}", e))
        })?;

        info!(
            "Created Square payment link: id={}, env={}",
            parsed.payment_link.id, environment
        );

        Ok(CheckoutSession {
            session_id: parsed.payment_link.id,
            processor_order_id: parsed.payment_link.order_id,
            url: parsed.payment_link.url,
            environment,
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
impl ProcessorClient for SquareGateway {
    #[instrument(skip(self, order, redirect_url), fields(order_id = %order.id))]
    async fn create_session(
        &self,
        order: &Order,
        idempotency_key: &str,
        redirect_url: &str,
    ) -> StoreResult<CheckoutSession> {
        if order.product_lines().next().is_none() {
            return Err(StoreError::validation("order has no product lines"));
        }

        let candidates = self.config.candidates();
        if candidates.is_empty() {
            return Err(StoreError::not_configured(
                "no Square credentials available for the configured mode",
            ));
        }

        debug!(
            "Creating Square payment link: {} candidate environment(s)",
            candidates.len()
        );

        let mut last_error = None;
        for (environment, credentials) in candidates {
            match self
                .try_create(environment, credentials, order, idempotency_key, redirect_url)
                .await
            {
                Ok(session) => return Ok(session),
                Err(err @ StoreError::Authentication { .. }) => {
                    warn!(
                        "Square rejected {} credentials, trying next candidate: {}",
                        environment, err
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        // every candidate was rejected as unauthorized
        Err(last_error.unwrap_or_else(|| {
            StoreError::Internal("Square candidate loop ended without an error".to_string())
        }))
    }

    #[instrument(skip(self))]
    async fn order_state(
        &self,
        environment: ProcessorEnvironment,
        processor_order_id: &str,
    ) -> StoreResult<ProcessorOrderState> {
        let credentials = self.config.credentials_for(environment).ok_or_else(|| {
            StoreError::not_configured(format!(
                "no Square credentials configured for the {} environment",
                environment
            ))
        })?;

        let url = format!(
            "{}/v2/orders/{}",
            self.config.base_url(environment),
            processor_order_id
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", bearer(&credentials.access_token))
            .header("Square-Version", &self.config.api_version)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            error!("Square order query error: status={}, body={}", status, body);
            return Err(classify_failure(status, &body));
        }

        let parsed: RetrieveOrderResponse = serde_json::from_str(&body).map_err(|e| {
            StoreError::Internal(format!("Failed to parse Square order response: {}", e))
        })?;

        debug!(
            "Square order {} state={}",
            processor_order_id, parsed.order.state
        );

        Ok(ProcessorOrderState::from_wire(&parsed.order.state))
    }

    fn processor_name(&self) -> &'static str {
        "square"
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

fn transport_error(err: reqwest::Error) -> StoreError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    StoreError::Unreachable {
        provider: "square".to_string(),
        message,
    }
}

/// Decide whether a non-success response is a credential rejection (which
/// lets auto mode advance to the next candidate) or a business rejection
/// (which propagates as-is). Square reports either an HTTP 401 or an
/// `AUTHENTICATION_ERROR`/`UNAUTHORIZED` entry in the errors payload.
fn classify_failure(status: StatusCode, body: &str) -> StoreError {
    let parsed: Option<SquareErrorResponse> = serde_json::from_str(body).ok();
    let first = parsed.as_ref().and_then(|e| e.errors.first());

    let code = first.and_then(|e| e.code.clone());
    let category = first.and_then(|e| e.category.as_deref());
    let message = first
        .and_then(|e| e.detail.clone())
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

    let unauthorized = status == StatusCode::UNAUTHORIZED
        || category == Some("AUTHENTICATION_ERROR")
        || code.as_deref() == Some("UNAUTHORIZED");

    if unauthorized {
        StoreError::Authentication {
            provider: "square".to_string(),
            message,
        }
    } else {
        StoreError::ExternalBusiness {
            provider: "square".to_string(),
            status: status.as_u16(),
            code,
            message,
        }
    }
}

// =============================================================================
// Square API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct CreatePaymentLinkRequest<'a> {
    idempotency_key: &'a str,
    order: SquareOrderBody<'a>,
    checkout_options: CheckoutOptions<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pre_populated_data: Option<PrePopulatedData<'a>>,
}

#[derive(Debug, Serialize)]
struct SquareOrderBody<'a> {
    location_id: &'a str,
    reference_id: &'a str,
    line_items: Vec<SquareLineItem>,
}

#[derive(Debug, Serialize)]
struct SquareLineItem {
    name: String,
    /// Square wants quantities as strings
    quantity: String,
    base_price_money: SquareMoney,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Debug, Serialize)]
struct SquareMoney {
    amount: i64,
    currency: String,
}

#[derive(Debug, Serialize)]
struct CheckoutOptions<'a> {
    redirect_url: &'a str,
}

#[derive(Debug, Serialize)]
struct PrePopulatedData<'a> {
    buyer_email: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentLinkResponse {
    payment_link: PaymentLinkBody,
}

#[derive(Debug, Deserialize)]
struct PaymentLinkBody {
    id: String,
    url: String,
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct RetrieveOrderResponse {
    order: SquareOrderStateBody,
}

#[derive(Debug, Deserialize)]
struct SquareOrderStateBody {
    state: String,
}

#[derive(Debug, Deserialize)]
struct SquareErrorResponse {
    #[serde(default)]
    errors: Vec<SquareErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct SquareErrorEntry {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SquareConfig;
    use store_core::catalog::Currency;
    use store_core::order::{
        CustomerInfo, LineKind, OrderLine, OrderStatus, PaymentMethod, ShippingSnapshot,
        TaxSnapshot,
    };
    use store_core::shipping::ShippingZone;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_order() -> Order {
        Order {
            id: "ORD-1756147200000-9F3A2C".into(),
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::Card,
            customer: CustomerInfo {
                name: "Ada Test".into(),
                email: "ada@example.com".into(),
                ..Default::default()
            },
            lines: vec![OrderLine {
                item_id: "GB-54".into(),
                name: "Garment Bag 54\"".into(),
                description: Some("Clear poly, 54 inch".into()),
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

    fn payment_link_json(id: &str, order_id: &str) -> serde_json::Value {
        serde_json::json!({
            "payment_link": {
                "id": id,
                "version": 1,
                "order_id": order_id,
                "url": format!("https://square.link/u/{}", id),
                "created_at": "2025-08-25T12:00:00Z"
            }
        })
    }

    fn auth_error_json() -> serde_json::Value {
        serde_json::json!({
            "errors": [{
                "category": "AUTHENTICATION_ERROR",
                "code": "UNAUTHORIZED",
                "detail": "This request could not be authorized."
            }]
        })
    }

    #[tokio::test]
    async fn sandbox_mode_creates_a_payment_link() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/online-checkout/payment-links"))
            .and(header("Authorization", "Bearer sb_token"))
            .and(header("Square-Version", crate::config::DEFAULT_API_VERSION))
            .and(body_partial_json(serde_json::json!({
                "idempotency_key": "idem-1",
                "checkout_options": { "redirect_url": "https://shop.example/thank-you" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(payment_link_json("plink-1", "sq-ord-1")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gateway = SquareGateway::new(
            SquareConfig::sandbox_only("sb_token", "sb_loc").with_sandbox_base_url(server.uri()),
        );

        let session = gateway
            .create_session(&sample_order(), "idem-1", "https://shop.example/thank-you")
            .await
            .unwrap();

        assert_eq!(session.session_id, "plink-1");
        assert_eq!(session.processor_order_id, "sq-ord-1");
        assert_eq!(session.url, "https://square.link/u/plink-1");
        assert_eq!(session.environment, ProcessorEnvironment::Sandbox);
    }

    #[tokio::test]
    async fn line_items_mirror_the_internal_total_exactly() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/online-checkout/payment-links"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(payment_link_json("plink-2", "sq-ord-2")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gateway = SquareGateway::new(
            SquareConfig::sandbox_only("sb_token", "sb_loc").with_sandbox_base_url(server.uri()),
        );

        // a non-free shipping quote plus tax: both must appear as lines
        let mut order = sample_order();
        order.shipping.cost_cents = 1_500;
        order.shipping.label = "Delivery (Canada)".into();
        order.total_cents += 1_500;

        gateway
            .create_session(&order, "idem-2", "https://shop.example/thank-you")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();

        assert_eq!(body["order"]["location_id"], "sb_loc");
        assert_eq!(body["order"]["reference_id"], order.id.as_str());
        assert_eq!(body["pre_populated_data"]["buyer_email"], "ada@example.com");

        let items = body["order"]["line_items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["name"], "Garment Bag 54\"");
        assert_eq!(items[0]["quantity"], "22");
        assert_eq!(items[0]["base_price_money"]["amount"], 3699);
        assert_eq!(items[1]["name"], "Delivery (Canada)");
        assert_eq!(items[1]["base_price_money"]["amount"], 1500);
        assert_eq!(items[2]["name"], "HST 13%");
        assert_eq!(items[2]["base_price_money"]["amount"], 10_579);

        // processor-side total equals the internal total
        let external_total: i64 = items
            .iter()
            .map(|item| {
                item["base_price_money"]["amount"].as_i64().unwrap()
                    * item["quantity"].as_str().unwrap().parse::<i64>().unwrap()
            })
            .sum();
        assert_eq!(external_total, order.total_cents);
    }

    #[tokio::test]
    async fn zero_shipping_and_zero_tax_produce_no_synthetic_lines() {
        let mut order = sample_order();
        order.tax = TaxSnapshot {
            label: "Tax".into(),
            gst_cents: 0,
            qst_cents: 0,
            total_cents: 0,
        };
        order.total_cents = order.subtotal_cents;

        let items = SquareGateway::build_line_items(&order);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Garment Bag 54\"");
    }

    #[tokio::test]
    async fn auto_mode_falls_back_to_production_on_auth_failure() {
        let sandbox = MockServer::start().await;
        let production = MockServer::start().await;

        // sandbox credentials are rejected exactly once, never retried
        Mock::given(method("POST"))
            .and(path("/v2/online-checkout/payment-links"))
            .respond_with(ResponseTemplate::new(401).set_body_json(auth_error_json()))
            .expect(1)
            .mount(&sandbox)
            .await;

        Mock::given(method("POST"))
            .and(path("/v2/online-checkout/payment-links"))
            .and(header("Authorization", "Bearer pr_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(payment_link_json("plink-3", "sq-ord-3")),
            )
            .expect(1)
            .mount(&production)
            .await;

        let gateway = SquareGateway::new(
            SquareConfig::auto(
                SquareCredentials {
                    access_token: "sb_token".into(),
                    location_id: "sb_loc".into(),
                },
                SquareCredentials {
                    access_token: "pr_token".into(),
                    location_id: "pr_loc".into(),
                },
            )
            .with_sandbox_base_url(sandbox.uri())
            .with_production_base_url(production.uri()),
        );

        let session = gateway
            .create_session(&sample_order(), "idem-3", "https://shop.example/thank-you")
            .await
            .unwrap();

        assert_eq!(session.environment, ProcessorEnvironment::Production);
        assert_eq!(session.session_id, "plink-3");
    }

    #[tokio::test]
    async fn non_auth_failures_do_not_advance_to_the_next_candidate() {
        let sandbox = MockServer::start().await;
        let production = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/online-checkout/payment-links"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": [{
                    "category": "INVALID_REQUEST_ERROR",
                    "code": "INVALID_VALUE",
                    "detail": "Currency not supported by this location."
                }]
            })))
            .expect(1)
            .mount(&sandbox)
            .await;

        // production must never be touched
        Mock::given(method("POST"))
            .and(path("/v2/online-checkout/payment-links"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(payment_link_json("plink-x", "sq-ord-x")),
            )
            .expect(0)
            .mount(&production)
            .await;

        let gateway = SquareGateway::new(
            SquareConfig::auto(
                SquareCredentials {
                    access_token: "sb_token".into(),
                    location_id: "sb_loc".into(),
                },
                SquareCredentials {
                    access_token: "pr_token".into(),
                    location_id: "pr_loc".into(),
                },
            )
            .with_sandbox_base_url(sandbox.uri())
            .with_production_base_url(production.uri()),
        );

        let err = gateway
            .create_session(&sample_order(), "idem-4", "https://shop.example/thank-you")
            .await
            .unwrap_err();

        match err {
            StoreError::ExternalBusiness { status, code, .. } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("INVALID_VALUE"));
            }
            other => panic!("expected a business rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausting_every_candidate_surfaces_the_last_auth_error() {
        let sandbox = MockServer::start().await;
        let production = MockServer::start().await;

        for server in [&sandbox, &production] {
            Mock::given(method("POST"))
                .and(path("/v2/online-checkout/payment-links"))
                .respond_with(ResponseTemplate::new(401).set_body_json(auth_error_json()))
                .expect(1)
                .mount(server)
                .await;
        }

        let gateway = SquareGateway::new(
            SquareConfig::auto(
                SquareCredentials {
                    access_token: "sb_token".into(),
                    location_id: "sb_loc".into(),
                },
                SquareCredentials {
                    access_token: "pr_token".into(),
                    location_id: "pr_loc".into(),
                },
            )
            .with_sandbox_base_url(sandbox.uri())
            .with_production_base_url(production.uri()),
        );

        let err = gateway
            .create_session(&sample_order(), "idem-5", "https://shop.example/thank-you")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Authentication { .. }));
    }

    #[tokio::test]
    async fn order_state_maps_square_states() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/orders/sq-ord-9"))
            .and(header("Authorization", "Bearer sb_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": { "id": "sq-ord-9", "state": "COMPLETED" }
            })))
            .mount(&server)
            .await;

        let gateway = SquareGateway::new(
            SquareConfig::sandbox_only("sb_token", "sb_loc").with_sandbox_base_url(server.uri()),
        );

        let state = gateway
            .order_state(ProcessorEnvironment::Sandbox, "sq-ord-9")
            .await
            .unwrap();
        assert_eq!(state, ProcessorOrderState::Completed);
    }

    #[tokio::test]
    async fn order_state_requires_credentials_for_the_environment() {
        let gateway = SquareGateway::new(SquareConfig::sandbox_only("sb_token", "sb_loc"));

        let err = gateway
            .order_state(ProcessorEnvironment::Production, "sq-ord-9")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotConfigured { .. }));
    }

    #[test]
    fn classification_reads_the_payload_not_just_the_status() {
        // a 403 carrying AUTHENTICATION_ERROR still counts as a credential rejection
        let body = auth_error_json().to_string();
        let err = classify_failure(StatusCode::FORBIDDEN, &body);
        assert!(matches!(err, StoreError::Authentication { .. }));

        // a bare 401 with an unparseable body is still a credential rejection
        let err = classify_failure(StatusCode::UNAUTHORIZED, "nope");
        assert!(matches!(err, StoreError::Authentication { .. }));

        // anything else carries the structured detail through
        let body = serde_json::json!({
            "errors": [{ "category": "INVALID_REQUEST_ERROR", "code": "VALUE_TOO_LOW", "detail": "bad amount" }]
        })
        .to_string();
        match classify_failure(StatusCode::BAD_REQUEST, &body) {
            StoreError::ExternalBusiness { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("VALUE_TOO_LOW"));
                assert_eq!(message, "bad amount");
            }
            other => panic!("expected a business rejection, got {other:?}"),
        }
    }
}
