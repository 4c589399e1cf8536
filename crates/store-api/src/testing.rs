//! # Test Fixtures
//!
//! Shared harness for the service and handler tests: an `AppState` wired
//! entirely to in-memory stores and capturing doubles, a small seeded
//! catalog, and a stubbed payment processor. Integrations default to off
//! so each test opts in to exactly what it exercises.

use crate::orders::PlacementInput;
use crate::session::TtlSessionStore;
use crate::state::{AppConfig, AppState};
use crate::stores::{MemoryCatalogStore, MemoryOrderStore};
use crate::tasks::{Task, TaskQueue};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use store_core::{
    CartLine, CatalogItem, CheckoutSession, Currency, CustomerInfo, Destination, LedgerMirror,
    LineKind, Message, Notifier, Order, OrderLine, OrderStatus, PaymentMethod, ProcessorClient,
    ProcessorEnvironment, ProcessorOrderState, ShippingSnapshot, ShippingZone, StoreError,
    StoreResult, TaxSnapshot, TierPricer,
};
use tokio::sync::mpsc;

// ===== Harness =====

/// A fully wired test state plus handles to its capturing doubles
pub struct Harness {
    pub state: AppState,
    pub tasks_rx: mpsc::Receiver<Task>,
    pub notifier: Arc<CapturingNotifier>,
    pub ledger: Arc<CapturingLedger>,
}

/// Build the default harness: two catalog items, built-in tier table,
/// admin token set, no processor and no accounting.
pub fn harness() -> Harness {
    let config = AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        site_url: "https://shop.example".to_string(),
        catalog_path: "config/products.toml".to_string(),
        admin_api_token: Some("admin-secret-token".to_string()),
        admin_email: None,
    };

    let notifier = Arc::new(CapturingNotifier::default());
    let ledger = Arc::new(CapturingLedger::default());
    let (tasks, tasks_rx) = TaskQueue::new(64);

    let state = AppState {
        config,
        catalog: Arc::new(MemoryCatalogStore::with_items(catalog_items())),
        orders: Arc::new(MemoryOrderStore::new()),
        pricer: Arc::new(TierPricer::default_table()),
        processor: None,
        invoices: None,
        qbo_auth: None,
        qbo_config: None,
        notifier: notifier.clone(),
        ledger: ledger.clone(),
        sessions: Arc::new(TtlSessionStore::new()),
        tasks,
    };

    Harness {
        state,
        tasks_rx,
        notifier,
        ledger,
    }
}

// ===== Fixtures =====

/// Two-item catalog: a tiered garment bag and a flat-priced accessory
pub fn catalog_items() -> Vec<CatalogItem> {
    vec![
        CatalogItem {
            id: "GB-54".to_string(),
            name: "Garment Bag 54\"".to_string(),
            description: Some("Clear poly, 54 inch".to_string()),
            base_price_cents: 4299,
            currency: Currency::CAD,
            category: "Garment Bags".to_string(),
            stock: 100,
        },
        CatalogItem {
            id: "TAG-1".to_string(),
            name: "Price Tags (500)".to_string(),
            description: None,
            base_price_cents: 899,
            currency: Currency::CAD,
            category: "Accessories".to_string(),
            stock: 40,
        },
    ]
}

/// A Toronto customer (GTA shipping, Ontario HST)
pub fn ada() -> CustomerInfo {
    CustomerInfo {
        name: "Ada Test".to_string(),
        email: "ada@example.com".to_string(),
        phone: Some("416-555-0100".to_string()),
        address: Some("100 Queen St W".to_string()),
        city: Some("Toronto".to_string()),
        region: Some("ON".to_string()),
        postal_code: Some("M5V 2T6".to_string()),
        country: Some("Canada".to_string()),
        delivery_notes: None,
    }
}

/// A single-line garment bag cart shipping to Ada
pub fn placement_input(quantity: u32) -> PlacementInput {
    PlacementInput {
        cart: vec![CartLine {
            item_id: "GB-54".to_string(),
            quantity,
            price_snapshot_cents: None,
            name_snapshot: None,
        }],
        customer: ada(),
        destination: Destination {
            region: "ON".to_string(),
            postal_code: "M5V 2T6".to_string(),
        },
    }
}

/// Insert a pre-built pending pay-later order directly into the order
/// store, bypassing placement (no background tasks queued).
pub async fn seeded_order(state: &AppState) -> Order {
    let order = Order {
        id: Order::generate_id(Utc::now()),
        status: OrderStatus::Pending,
        payment_method: PaymentMethod::PayLater,
        customer: ada(),
        lines: vec![OrderLine {
            item_id: "GB-54".to_string(),
            name: "Garment Bag 54\"".to_string(),
            description: Some("Clear poly, 54 inch".to_string()),
            unit_price_cents: 3699,
            quantity: 22,
            kind: LineKind::Product,
        }],
        shipping: ShippingSnapshot {
            zone: ShippingZone::Gta,
            label: "Standard delivery (GTA) - Free".to_string(),
            cost_cents: 0,
            undetermined: false,
        },
        tax: TaxSnapshot {
            label: "HST 13%".to_string(),
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
    };
    state.orders.insert(&order).await.expect("seed order");
    order
}

// ===== Doubles =====

/// Processor stub: sessions always succeed, and `order_state` serves a
/// settable state (or a stubbed outage when `fail_state_queries` is on).
pub struct StubProcessor {
    state: Mutex<ProcessorOrderState>,
    pub fail_state_queries: AtomicBool,
    pub state_calls: AtomicUsize,
}

impl StubProcessor {
    /// Stub that reports every external order as completed
    pub fn completed() -> Arc<Self> {
        Arc::new(Self::reporting(ProcessorOrderState::Completed))
    }

    /// Stub that reports every external order as still open
    pub fn open() -> Arc<Self> {
        Arc::new(Self::reporting(ProcessorOrderState::Open))
    }

    fn reporting(state: ProcessorOrderState) -> Self {
        Self {
            state: Mutex::new(state),
            fail_state_queries: AtomicBool::new(false),
            state_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_state(&self, state: ProcessorOrderState) {
        *self.state.lock().unwrap() = state;
    }
}

#[async_trait]
impl ProcessorClient for StubProcessor {
    async fn create_session(
        &self,
        order: &Order,
        _idempotency_key: &str,
        _redirect_url: &str,
    ) -> StoreResult<CheckoutSession> {
        Ok(CheckoutSession {
            session_id: format!("plink_{}", order.id),
            processor_order_id: format!("sq_{}", order.id),
            url: "https://sandbox.square.link/u/stub".to_string(),
            environment: ProcessorEnvironment::Sandbox,
            created_at: Utc::now(),
        })
    }

    async fn order_state(
        &self,
        _environment: ProcessorEnvironment,
        _processor_order_id: &str,
    ) -> StoreResult<ProcessorOrderState> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_state_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable {
                provider: "square".to_string(),
                message: "stubbed outage".to_string(),
            });
        }
        Ok(self.state.lock().unwrap().clone())
    }

    fn processor_name(&self) -> &'static str {
        "square-stub"
    }
}

/// Notifier that records what it was asked to send
#[derive(Default)]
pub struct CapturingNotifier {
    sent: tokio::sync::Mutex<Vec<Message>>,
    pub fail: AtomicBool,
}

impl CapturingNotifier {
    pub async fn sent(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send(&self, message: &Message) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable {
                provider: "smtp".to_string(),
                message: "stubbed outage".to_string(),
            });
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// Ledger mirror that records appends and sheet replacements
#[derive(Default)]
pub struct CapturingLedger {
    appended: tokio::sync::Mutex<Vec<(String, Vec<String>)>>,
    replaced: tokio::sync::Mutex<Vec<(String, Vec<Vec<String>>)>>,
}

impl CapturingLedger {
    pub async fn appended(&self) -> Vec<(String, Vec<String>)> {
        self.appended.lock().await.clone()
    }

    pub async fn replaced(&self) -> Vec<(String, Vec<Vec<String>>)> {
        self.replaced.lock().await.clone()
    }
}

#[async_trait]
impl LedgerMirror for CapturingLedger {
    async fn append_row(&self, tab: &str, row: &[String]) -> StoreResult<()> {
        self.appended
            .lock()
            .await
            .push((tab.to_string(), row.to_vec()));
        Ok(())
    }

    async fn replace_sheet(&self, tab: &str, rows: &[Vec<String>]) -> StoreResult<()> {
        self.replaced
            .lock()
            .await
            .push((tab.to_string(), rows.to_vec()));
        Ok(())
    }
}

/// Poll the capturing notifier until `count` messages arrive; panics
/// after ~2s so a stuck worker fails the test instead of hanging it
pub async fn wait_for_messages(notifier: &CapturingNotifier, count: usize) {
    for _ in 0..400 {
        if notifier.sent().await.len() >= count {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {} notification(s)", count);
}
