//! # Request Handlers
//!
//! Axum request handlers for the storefront API: placement, checkout,
//! order polling, the admin surface, and the QuickBooks connect flow.
//!
//! Auth is bearer-token based. Admin routes compare against
//! `ADMIN_API_TOKEN` in constant time; order polling also accepts the
//! TTL status token minted at checkout, scoped to that one order.

use crate::orders::{self, PlacementInput};
use crate::reconcile::{self, ReconcileOutcome};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use store_core::{
    CartLine, Currency, CustomerInfo, Destination, Order, OrderStatus, PaymentMethod, StoreError,
};
use store_qbo::InvoiceSyncOutcome;
use tracing::{error, instrument};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Place-order / checkout request
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    /// Cart lines
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    /// Customer and delivery details (one form; region and postal code
    /// drive tax and shipping)
    pub customer: CustomerRequest,
}

/// One cart line
#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    /// Catalog item ID
    pub item_id: String,
    /// Quantity
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Client-side price snapshot, used only when the catalog misses
    #[serde(default)]
    pub price_snapshot_cents: Option<i64>,
    /// Client-side name snapshot, same fallback rule
    #[serde(default)]
    pub name_snapshot: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

/// Customer details as submitted by the storefront form
#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub delivery_notes: Option<String>,
}

impl PlaceOrderRequest {
    fn into_placement(self) -> PlacementInput {
        let destination = Destination {
            region: self.customer.region.clone().unwrap_or_default(),
            postal_code: self.customer.postal_code.clone().unwrap_or_default(),
        };
        let cart = self
            .items
            .into_iter()
            .map(|item| CartLine {
                item_id: item.item_id,
                quantity: item.quantity,
                price_snapshot_cents: item.price_snapshot_cents,
                name_snapshot: item.name_snapshot,
            })
            .collect();
        let customer = CustomerInfo {
            name: self.customer.name,
            email: self.customer.email,
            phone: self.customer.phone,
            address: self.customer.address,
            city: self.customer.city,
            region: self.customer.region,
            postal_code: self.customer.postal_code,
            country: self.customer.country,
            delivery_notes: self.customer.delivery_notes,
        };

        PlacementInput {
            cart,
            customer,
            destination,
        }
    }
}

/// Order as reported to the storefront
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub shipping_label: String,
    pub tax_cents: i64,
    pub tax_label: String,
    pub total_cents: i64,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    pub created_at: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            status: order.status,
            payment_method: order.payment_method,
            subtotal_cents: order.subtotal_cents,
            shipping_cents: order.shipping.cost_cents,
            shipping_label: order.shipping.label.clone(),
            tax_cents: order.tax.total_cents,
            tax_label: order.tax.label.clone(),
            total_cents: order.total_cents,
            currency: order.currency,
            invoice_id: order.invoice_id.clone(),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

/// Checkout response
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    /// Hosted checkout URL (redirect the customer here)
    pub checkout_url: String,
    /// Bearer token for polling this order from the thank-you page
    pub status_token: String,
    pub total_cents: i64,
}

/// Optional body for the manual invoice sync trigger
#[derive(Debug, Default, Deserialize)]
pub struct InvoiceSyncRequest {
    /// Override the configured email-after-create toggle
    #[serde(default)]
    pub send_email: Option<bool>,
}

/// OAuth callback query parameters as Intuit sends them
#[derive(Debug, Deserialize)]
pub struct QboCallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, rename = "realmId")]
    pub realm_id: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Auth
// =============================================================================

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn unauthorized() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Invalid or missing bearer token", 401)),
    )
}

/// Admin routes require the configured admin token; an unset token turns
/// the whole admin surface off (503, not 401).
fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let Some(expected) = state.config.admin_api_token.as_deref() else {
        return Err(store_error_to_response(StoreError::not_configured(
            "ADMIN_API_TOKEN",
        )));
    };
    match bearer_token(headers) {
        Some(token) if constant_time_compare(token, expected) => Ok(()),
        _ => Err(unauthorized()),
    }
}

/// Order polling accepts either the admin token or the status token
/// minted at checkout for exactly this order.
async fn require_order_access(
    state: &AppState,
    headers: &HeaderMap,
    order_id: &str,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let Some(token) = bearer_token(headers) else {
        return Err(unauthorized());
    };

    if let Some(expected) = state.config.admin_api_token.as_deref() {
        if constant_time_compare(token, expected) {
            return Ok(());
        }
    }
    if let Some(identity) = state.sessions.validate(token).await {
        if identity == format!("order:{}", order_id) {
            return Ok(());
        }
    }

    Err(unauthorized())
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint with integration readiness
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let catalog_items = state
        .catalog
        .all()
        .await
        .map(|items| items.len())
        .unwrap_or(0);
    let accounting_connected = match &state.qbo_auth {
        Some(auth) => matches!(auth.connection().await, Ok(Some(_))),
        None => false,
    };

    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION"),
        "catalog_items": catalog_items,
        "card_checkout": state.processor.is_some(),
        "accounting": {
            "configured": state.qbo_config.is_some(),
            "connected": accounting_connected,
        }
    }))
}

/// Get the product catalog
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let products = state.catalog.all().await.map_err(store_error_to_response)?;
    Ok(Json(serde_json::json!({
        "products": products,
        "count": products.len()
    })))
}

/// Place a pay-later order
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn place_order(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let order = orders::place_order(&state, request.into_placement(), PaymentMethod::PayLater)
        .await
        .map_err(store_error_to_response)?;

    Ok(Json(OrderResponse::from(&order)))
}

/// Place a card order and open a hosted checkout session
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<Json<CheckoutResponse>, (StatusCode, Json<ErrorResponse>)> {
    let outcome = orders::checkout(&state, request.into_placement())
        .await
        .map_err(|e| {
            error!("Failed to create checkout: {}", e);
            store_error_to_response(e)
        })?;

    Ok(Json(CheckoutResponse {
        order_id: outcome.order.id.clone(),
        checkout_url: outcome.checkout_url,
        status_token: outcome.status_token,
        total_cents: outcome.order.total_cents,
    }))
}

/// Get one order (admin token or checkout status token)
#[instrument(skip(state, headers), fields(order_id = %order_id))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_order_access(&state, &headers, &order_id).await?;

    let order = state
        .orders
        .get(&order_id)
        .await
        .map_err(store_error_to_response)?
        .ok_or_else(|| {
            store_error_to_response(StoreError::NotFound {
                what: format!("order {}", order_id),
            })
        })?;

    Ok(Json(OrderResponse::from(&order)))
}

/// Reconcile one order against the payment processor
#[instrument(skip(state, headers), fields(order_id = %order_id))]
pub async fn reconcile_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ReconcileOutcome>, (StatusCode, Json<ErrorResponse>)> {
    require_order_access(&state, &headers, &order_id).await?;

    let outcome = reconcile::reconcile(&state, &order_id)
        .await
        .map_err(store_error_to_response)?;

    Ok(Json(outcome))
}

/// Mark a pay-later order fulfilled (admin)
#[instrument(skip(state, headers), fields(order_id = %order_id))]
pub async fn fulfill_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;

    let order = orders::fulfill_order(&state, &order_id)
        .await
        .map_err(store_error_to_response)?;

    Ok(Json(OrderResponse::from(&order)))
}

/// Sync one order to QuickBooks now (admin). The body is optional; when
/// present it may override the email-after-create toggle.
#[instrument(skip(state, headers, body), fields(order_id = %order_id))]
pub async fn sync_invoice(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InvoiceSyncOutcome>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;

    let engine = state.invoices.clone().ok_or_else(|| {
        store_error_to_response(StoreError::not_configured(
            "QuickBooks (set QBO_* credentials)",
        ))
    })?;

    let send_email = if body.is_empty() {
        None
    } else {
        let request: InvoiceSyncRequest = serde_json::from_slice(&body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    format!("Invalid request body: {}", e),
                    400,
                )),
            )
        })?;
        request.send_email
    };

    let order = state
        .orders
        .get(&order_id)
        .await
        .map_err(store_error_to_response)?
        .ok_or_else(|| {
            store_error_to_response(StoreError::NotFound {
                what: format!("order {}", order_id),
            })
        })?;

    let outcome = engine
        .upsert_invoice(&order, send_email)
        .await
        .map_err(|e| {
            error!("Invoice sync failed: {}", e);
            store_error_to_response(e)
        })?;
    state
        .orders
        .set_invoice_id(&order_id, &outcome.invoice_id)
        .await
        .map_err(store_error_to_response)?;

    Ok(Json(outcome))
}

/// Issue the QuickBooks consent URL (admin)
pub async fn qbo_connect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;

    let auth = state.qbo_auth.clone().ok_or_else(|| {
        store_error_to_response(StoreError::not_configured(
            "QuickBooks (set QBO_* credentials)",
        ))
    })?;
    let request = auth
        .authorization_request()
        .map_err(store_error_to_response)?;

    Ok(Json(serde_json::json!({
        "authorization_url": request.url
    })))
}

/// OAuth redirect target: verify the state, exchange the code, persist
/// the connection, and show a close-this-window page.
#[instrument(skip(state, params))]
pub async fn qbo_callback(
    State(state): State<AppState>,
    Query(params): Query<QboCallbackParams>,
) -> Result<Html<String>, (StatusCode, Json<ErrorResponse>)> {
    let auth = state.qbo_auth.clone().ok_or_else(|| {
        store_error_to_response(StoreError::not_configured(
            "QuickBooks (set QBO_* credentials)",
        ))
    })?;

    let code = required_param(&params.code, "code")?;
    let callback_state = required_param(&params.state, "state")?;
    let realm_id = required_param(&params.realm_id, "realmId")?;

    let connection = auth
        .handle_callback(code, realm_id, callback_state)
        .await
        .map_err(|e| {
            error!("QuickBooks callback failed: {}", e);
            store_error_to_response(e)
        })?;

    Ok(Html(format!(
        r#"
<!DOCTYPE html>
<html>
<head><title>QuickBooks Connected</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: linear-gradient(135deg, #1a1a2e 0%, #16213e 100%);">
    <div style="background: white; padding: 60px; border-radius: 16px; text-align: center;">
        <div style="font-size: 60px;">&#9989;</div>
        <h1>QuickBooks Connected</h1>
        <p>Company: <code>{}</code></p>
        <p style="color: #666;">Invoice sync is ready. You can close this window.</p>
    </div>
</body>
</html>
"#,
        connection.realm_id
    )))
}

fn required_param<'a>(
    value: &'a Option<String>,
    name: &str,
) -> Result<&'a str, (StatusCode, Json<ErrorResponse>)> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            store_error_to_response(StoreError::validation(format!(
                "callback is missing {}",
                name
            )))
        })
}

/// Report the QuickBooks connection (admin)
pub async fn qbo_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;

    let Some(qbo) = state.qbo_config.as_ref() else {
        return Ok(Json(serde_json::json!({
            "configured": false,
            "connected": false,
        })));
    };

    let connection = match &state.qbo_auth {
        Some(auth) => auth.connection().await.map_err(store_error_to_response)?,
        None => None,
    };

    let status = match connection {
        Some(c) => serde_json::json!({
            "configured": true,
            "connected": true,
            "environment": qbo.environment.as_str(),
            "sync_policy": qbo.sync_policy.as_str(),
            "realm_id": c.realm_id,
            "access_token_expires_at": c.expires_at.to_rfc3339(),
        }),
        None => serde_json::json!({
            "configured": true,
            "connected": false,
            "environment": qbo.environment.as_str(),
            "sync_policy": qbo.sync_policy.as_str(),
        }),
    };

    Ok(Json(status))
}
