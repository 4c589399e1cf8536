//! # Background Tasks
//!
//! Bounded queue plus worker loop for the work that must not gate a
//! request: notifications, ledger mirroring, and invoice sync. Failure
//! policy is log-and-drop; a receipt that cannot be delivered never rolls
//! back the order that triggered it, and a full queue sheds the task
//! instead of blocking the request path.

use crate::ledger::{catalog_rows, order_row, ORDERS_TAB, PRODUCTS_TAB};
use crate::notify::{admin_message, receipt_message};
use crate::state::AppState;
use store_core::{Order, StoreError, StoreResult};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Work items the request path hands off
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    NotifyCustomerReceipt { order_id: String },
    NotifyAdminNewOrder { order_id: String },
    MirrorOrderRow { order_id: String },
    MirrorCatalog,
    SyncInvoice { order_id: String },
}

impl Task {
    fn kind(&self) -> &'static str {
        match self {
            Task::NotifyCustomerReceipt { .. } => "notify_customer_receipt",
            Task::NotifyAdminNewOrder { .. } => "notify_admin_new_order",
            Task::MirrorOrderRow { .. } => "mirror_order_row",
            Task::MirrorCatalog => "mirror_catalog",
            Task::SyncInvoice { .. } => "sync_invoice",
        }
    }
}

/// Submit side of the queue; cheap to clone into handlers
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Task>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue without blocking; a full or closed queue drops the task
    /// with a warning
    pub fn submit(&self, task: Task) {
        let kind = task.kind();
        if let Err(err) = self.tx.try_send(task) {
            warn!(task = kind, error = %err, "Background queue rejected task");
        }
    }
}

/// Worker loop: drain the queue until every sender is gone. One failed
/// task is logged and the loop moves on.
pub async fn run_worker(mut rx: mpsc::Receiver<Task>, state: AppState) {
    info!("Background worker started");
    while let Some(task) = rx.recv().await {
        let kind = task.kind();
        if let Err(err) = handle(&state, task).await {
            error!(task = kind, error = %err, "Background task failed");
        }
    }
    info!("Background worker stopped");
}

async fn handle(state: &AppState, task: Task) -> StoreResult<()> {
    match task {
        Task::NotifyCustomerReceipt { order_id } => {
            let order = load_order(state, &order_id).await?;
            state.notifier.send(&receipt_message(&order)).await
        }
        Task::NotifyAdminNewOrder { order_id } => {
            let Some(admin_email) = state.config.admin_email.as_deref() else {
                debug!(order_id, "No admin email configured, skipping alert");
                return Ok(());
            };
            let order = load_order(state, &order_id).await?;
            state.notifier.send(&admin_message(&order, admin_email)).await
        }
        Task::MirrorOrderRow { order_id } => {
            let order = load_order(state, &order_id).await?;
            state.ledger.append_row(ORDERS_TAB, &order_row(&order)).await
        }
        Task::MirrorCatalog => {
            let items = state.catalog.all().await?;
            state
                .ledger
                .replace_sheet(PRODUCTS_TAB, &catalog_rows(&items))
                .await
        }
        Task::SyncInvoice { order_id } => {
            let Some(engine) = state.invoices.clone() else {
                debug!(order_id, "Accounting integration is off, skipping sync");
                return Ok(());
            };
            let order = load_order(state, &order_id).await?;
            let outcome = engine.upsert_invoice(&order, None).await?;
            state.orders.set_invoice_id(&order_id, &outcome.invoice_id).await?;
            info!(
                order_id,
                invoice_id = %outcome.invoice_id,
                reused = outcome.reused,
                "Invoice synced"
            );
            Ok(())
        }
    }
}

async fn load_order(state: &AppState, order_id: &str) -> StoreResult<Order> {
    state
        .orders
        .get(order_id)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            what: format!("order {}", order_id),
        })
}
