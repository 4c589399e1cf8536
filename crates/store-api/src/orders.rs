//! # Order Services
//!
//! Placement, card checkout, and manual fulfillment. These own the write
//! ordering the engine promises: the order row is inserted first (status
//! `pending`), stock decrements follow, and a decrement failure is an
//! oversell alert, never a rollback. Background work (notifications,
//! ledger mirror, invoice sync) is handed to the task queue so it cannot
//! gate the request.

use crate::state::AppState;
use crate::tasks::Task;
use chrono::Duration;
use std::collections::HashMap;
use store_core::{
    assemble, CartLine, CatalogItem, CustomerInfo, Destination, Order, OrderStatus,
    PaymentMethod, ProcessorRefs, StoreError, StoreResult,
};
use store_qbo::InvoiceSyncPolicy;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Everything a placement needs, parsed out of the HTTP layer
#[derive(Debug, Clone)]
pub struct PlacementInput {
    pub cart: Vec<CartLine>,
    pub customer: CustomerInfo,
    pub destination: Destination,
}

/// What card checkout hands back to the storefront
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    /// Hosted checkout URL to redirect the customer to
    pub checkout_url: String,
    /// Bearer token the thank-you page uses to poll this order
    pub status_token: String,
}

/// Assemble and persist an order, then stage the follow-up work.
///
/// Pay-later orders notify immediately (there is nothing left to wait
/// for); card orders only mirror, with receipts deferred until the
/// reconciler sees the payment land.
#[instrument(skip(state, input), fields(method = %method, lines = input.cart.len()))]
pub async fn place_order(
    state: &AppState,
    input: PlacementInput,
    method: PaymentMethod,
) -> StoreResult<Order> {
    let ids: Vec<String> = input.cart.iter().map(|l| l.item_id.clone()).collect();
    let resolved: HashMap<String, CatalogItem> = state
        .catalog
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();

    let assembled = assemble(
        &input.cart,
        input.customer,
        &input.destination,
        method,
        &resolved,
        &state.pricer,
    )?;
    let order = assembled.order;

    state.orders.insert(&order).await?;
    info!(
        order_id = %order.id,
        total_cents = order.total_cents,
        "Order placed"
    );

    for update in &assembled.stock_updates {
        if let Err(err) = state
            .catalog
            .update_stock(&update.item_id, update.next_stock)
            .await
        {
            // oversell alert: the order stands, a human reconciles stock
            error!(
                order_id = %order.id,
                item_id = %update.item_id,
                error = %err,
                "Stock decrement failed after order insert"
            );
        }
    }

    if method == PaymentMethod::PayLater {
        state.tasks.submit(Task::NotifyCustomerReceipt {
            order_id: order.id.clone(),
        });
        state.tasks.submit(Task::NotifyAdminNewOrder {
            order_id: order.id.clone(),
        });
    }
    state.tasks.submit(Task::MirrorOrderRow {
        order_id: order.id.clone(),
    });
    if state.invoice_sync_policy() == InvoiceSyncPolicy::OnPlacement {
        state.submit_invoice_sync(&order.id);
    }

    Ok(order)
}

/// Place a card order and open a hosted checkout session for it.
///
/// The session's processor refs (including which credential environment
/// actually created it) are persisted before the URL is returned, so
/// reconciliation never has to guess. A session failure leaves the
/// pending order in place; it simply has nothing to reconcile yet.
#[instrument(skip(state, input), fields(lines = input.cart.len()))]
pub async fn checkout(state: &AppState, input: PlacementInput) -> StoreResult<CheckoutOutcome> {
    let processor = state
        .processor
        .clone()
        .ok_or_else(|| StoreError::not_configured("Square checkout (set SQUARE_* credentials)"))?;

    let mut order = place_order(state, input, PaymentMethod::Card).await?;

    let idempotency_key = Uuid::new_v4().to_string();
    let redirect_url = format!("{}/thank-you?order={}", state.config.site_base(), order.id);
    let session = processor
        .create_session(&order, &idempotency_key, &redirect_url)
        .await?;

    let refs = ProcessorRefs {
        session_id: session.session_id.clone(),
        processor_order_id: session.processor_order_id.clone(),
        environment: session.environment,
    };
    state.orders.set_processor_refs(&order.id, &refs).await?;
    order.processor = Some(refs);

    info!(
        order_id = %order.id,
        session_id = %session.session_id,
        environment = %session.environment,
        "Checkout session created"
    );

    let status_token = state
        .sessions
        .create(&format!("order:{}", order.id), Duration::hours(24))
        .await;

    Ok(CheckoutOutcome {
        order,
        checkout_url: session.url,
        status_token,
    })
}

/// Mark a pay-later order fulfilled. Only `pending` pay-later orders
/// qualify; the swap is a CAS so a racing reconcile cannot be overwritten.
#[instrument(skip(state))]
pub async fn fulfill_order(state: &AppState, order_id: &str) -> StoreResult<Order> {
    let order = state
        .orders
        .get(order_id)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            what: format!("order {}", order_id),
        })?;

    if order.payment_method != PaymentMethod::PayLater {
        return Err(StoreError::validation(
            "only pay-later orders are fulfilled manually",
        ));
    }
    if !order
        .status
        .can_transition_to(OrderStatus::Fulfilled, order.payment_method)
    {
        return Err(StoreError::validation(format!(
            "order {} is {} and cannot be fulfilled",
            order_id, order.status
        )));
    }

    let swapped = state
        .orders
        .transition_status(order_id, OrderStatus::Pending, OrderStatus::Fulfilled)
        .await?;
    if !swapped {
        return Err(StoreError::validation(format!(
            "order {} changed status while fulfilling",
            order_id
        )));
    }

    info!(order_id, "Order fulfilled");

    if state.invoice_sync_policy() == InvoiceSyncPolicy::OnPaid {
        state.submit_invoice_sync(order_id);
    }

    let mut fulfilled = order;
    fulfilled.status = OrderStatus::Fulfilled;
    Ok(fulfilled)
}
