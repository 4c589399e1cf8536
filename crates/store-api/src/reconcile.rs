//! # Payment Reconciler
//!
//! Poll-based settlement of card orders: query the processor for the
//! order's external state, map it onto the local status machine, and
//! persist the change through a compare-and-swap. The CAS is the
//! exactly-once gate: of any number of concurrent reconciles for one
//! order, a single caller observes the swap into `paid` and only that
//! caller fires the post-payment notifications and invoice sync.

use crate::notify;
use crate::state::AppState;
use serde::Serialize;
use store_core::{OrderStatus, StoreError, StoreResult};
use store_qbo::InvoiceSyncPolicy;
use tracing::{debug, error, info, instrument};

/// What a reconcile pass concluded
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub order_id: String,
    pub status: OrderStatus,
    /// Whether this call changed the stored status
    pub changed: bool,
}

/// Reconcile one order against the processor.
///
/// Orders without processor refs (pay-later, or card orders whose
/// session creation failed) report their stored status unchanged.
/// Processor failures propagate without touching stored state.
#[instrument(skip(state), fields(order_id = %order_id))]
pub async fn reconcile(state: &AppState, order_id: &str) -> StoreResult<ReconcileOutcome> {
    let order = state
        .orders
        .get(order_id)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            what: format!("order {}", order_id),
        })?;

    let Some(refs) = order.processor.clone() else {
        return Ok(ReconcileOutcome {
            order_id: order.id,
            status: order.status,
            changed: false,
        });
    };

    let processor = state
        .processor
        .clone()
        .ok_or_else(|| StoreError::not_configured("Square checkout (set SQUARE_* credentials)"))?;

    let external = processor
        .order_state(refs.environment, &refs.processor_order_id)
        .await?;

    let Some(next) = external.implied_status() else {
        debug!(state = ?external, "Processor state implies no change");
        return Ok(ReconcileOutcome {
            order_id: order.id,
            status: order.status,
            changed: false,
        });
    };

    if next == order.status || !order.status.can_transition_to(next, order.payment_method) {
        return Ok(ReconcileOutcome {
            order_id: order.id,
            status: order.status,
            changed: false,
        });
    }

    let swapped = state
        .orders
        .transition_status(&order.id, order.status, next)
        .await?;
    if !swapped {
        // lost the race; report whatever won
        let status = state
            .orders
            .get(&order.id)
            .await?
            .map(|o| o.status)
            .unwrap_or(order.status);
        return Ok(ReconcileOutcome {
            order_id: order.id,
            status,
            changed: false,
        });
    }

    info!(from = %order.status, to = %next, "Order reconciled");

    if next == OrderStatus::Paid {
        let mut paid = order;
        paid.status = next;

        // this caller won the swap, so these fire exactly once; delivery
        // failures are logged and never undo the recorded payment
        if let Err(err) = state.notifier.send(&notify::receipt_message(&paid)).await {
            error!(order_id = %paid.id, error = %err, "Receipt delivery failed");
        }
        if let Some(admin_email) = state.config.admin_email.as_deref() {
            if let Err(err) = state
                .notifier
                .send(&notify::admin_message(&paid, admin_email))
                .await
            {
                error!(order_id = %paid.id, error = %err, "Payment alert failed");
            }
        }
        if state.invoice_sync_policy() == InvoiceSyncPolicy::OnPaid {
            state.submit_invoice_sync(&paid.id);
        }

        return Ok(ReconcileOutcome {
            order_id: paid.id,
            status: next,
            changed: true,
        });
    }

    Ok(ReconcileOutcome {
        order_id: order.id,
        status: next,
        changed: true,
    })
}
