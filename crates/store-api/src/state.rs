//! # Application State
//!
//! Shared state for the Axum application: typed environment config, the
//! store implementations, the optional payment and accounting
//! integrations, and the background task queue.
//!
//! Integrations are optional by construction: a wholly absent `SQUARE_*`
//! or `QBO_*` block leaves the corresponding field `None` and the
//! endpoints that need it answer `503 not configured`. Partial or invalid
//! blocks fail startup instead, so a misconfigured deployment never comes
//! up half-working.

use crate::session::{BoxedSessionStore, TtlSessionStore};
use crate::stores::{MemoryCatalogStore, MemoryOrderStore};
use crate::tasks::{Task, TaskQueue};
use crate::{ledger::TracingLedger, notify::TracingNotifier};
use std::sync::Arc;
use store_core::{
    BoxedCatalogStore, BoxedLedgerMirror, BoxedNotifier, BoxedOrderStore, BoxedProcessorClient,
    Catalog, TierPricer,
};
use store_qbo::oauth::FileTokenStore;
use store_qbo::{InvoiceEngine, InvoiceSyncPolicy, QboConfig, TokenManager};
use store_square::SquareGateway;
use tokio::sync::mpsc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for redirect/thank-you links
    pub site_url: String,
    /// Product catalog TOML path
    pub catalog_path: String,
    /// Bearer token for the admin routes; admin surface is off when unset
    pub admin_api_token: Option<String>,
    /// Destination for admin order/payment alerts; alerts skipped when unset
    pub admin_email: Option<String>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            site_url: std::env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            catalog_path: std::env::var("PRODUCT_CATALOG_PATH")
                .unwrap_or_else(|_| "config/products.toml".to_string()),
            admin_api_token: non_empty("ADMIN_API_TOKEN"),
            admin_email: non_empty("ADMIN_EMAIL"),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// `site_url` without a trailing slash, for building redirect links
    pub fn site_base(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Catalog store (in-memory, seeded from the catalog TOML)
    pub catalog: BoxedCatalogStore,
    /// Order store
    pub orders: BoxedOrderStore,
    /// Volume-tier pricer
    pub pricer: Arc<TierPricer>,
    /// Hosted-checkout processor; `None` when Square is unconfigured
    pub processor: Option<BoxedProcessorClient>,
    /// Invoice sync engine; `None` when QuickBooks is unconfigured
    pub invoices: Option<Arc<InvoiceEngine>>,
    /// QuickBooks OAuth manager, for the connect/callback/status routes
    pub qbo_auth: Option<Arc<TokenManager>>,
    /// QuickBooks settings (environment, sync policy) for status reporting
    pub qbo_config: Option<QboConfig>,
    /// Outbound notification sink
    pub notifier: BoxedNotifier,
    /// Back-office ledger mirror
    pub ledger: BoxedLedgerMirror,
    /// TTL store for thank-you-page status tokens
    pub sessions: BoxedSessionStore,
    /// Background task queue (submit side)
    pub tasks: TaskQueue,
}

impl AppState {
    /// Build the full application state from the environment.
    ///
    /// Returns the state plus the receive side of the task queue; the
    /// caller spawns the worker loop over it.
    pub fn new() -> anyhow::Result<(Self, mpsc::Receiver<Task>)> {
        let config = AppConfig::from_env();

        let catalog_file = load_catalog(&config.catalog_path)?;
        let pricer = if catalog_file.tiers.is_empty() {
            TierPricer::default_table()
        } else {
            TierPricer::from_tiers(catalog_file.tiers.clone())
        };

        let processor = SquareGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Square: {}", e))?
            .map(|gateway| Arc::new(gateway) as BoxedProcessorClient);

        let qbo_config = QboConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize QuickBooks: {}", e))?;
        let (invoices, qbo_auth) = match &qbo_config {
            Some(qbo) => {
                let store = Arc::new(FileTokenStore::new(qbo.token_path.clone()));
                let tokens = Arc::new(TokenManager::new(qbo.clone(), store));
                let engine = Arc::new(InvoiceEngine::new(qbo.clone(), tokens.clone()));
                (Some(engine), Some(tokens))
            }
            None => (None, None),
        };

        let (tasks, task_rx) = TaskQueue::new(256);

        let state = Self {
            config,
            catalog: Arc::new(MemoryCatalogStore::with_items(catalog_file.items)),
            orders: Arc::new(MemoryOrderStore::new()),
            pricer: Arc::new(pricer),
            processor,
            invoices,
            qbo_auth,
            qbo_config,
            notifier: Arc::new(TracingNotifier),
            ledger: Arc::new(TracingLedger),
            sessions: Arc::new(TtlSessionStore::new()),
            tasks,
        };

        Ok((state, task_rx))
    }

    /// Effective invoice sync policy; `manual` while QuickBooks is off
    pub fn invoice_sync_policy(&self) -> InvoiceSyncPolicy {
        self.qbo_config
            .as_ref()
            .map(|qbo| qbo.sync_policy)
            .unwrap_or(InvoiceSyncPolicy::Manual)
    }

    /// Submit a background invoice sync if the engine is up
    pub fn submit_invoice_sync(&self, order_id: &str) {
        if self.invoices.is_some() {
            self.tasks.submit(Task::SyncInvoice {
                order_id: order_id.to_string(),
            });
        }
    }
}

/// Load the product catalog from the configured path, falling back to the
/// workspace-relative locations so `cargo run -p store-api` works too.
/// A missing file is a warning, not an error: the storefront comes up
/// with an empty catalog (snapshot-priced orders still work).
fn load_catalog(configured: &str) -> anyhow::Result<Catalog> {
    let candidates = [
        configured.to_string(),
        format!("../{}", configured),
        format!("../../{}", configured),
    ];

    for path in &candidates {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = Catalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", catalog.len(), path);
            return Ok(catalog);
        }
    }

    tracing::warn!("No product catalog found at {}, starting empty", configured);
    Ok(Catalog::new())
}
