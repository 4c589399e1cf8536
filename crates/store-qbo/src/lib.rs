//! # store-qbo
//!
//! QuickBooks Online integration for storefront-rs: OAuth2 connection
//! lifecycle and idempotent invoice sync.
//!
//! The crate splits into four layers:
//!
//! - [`config`] - environment-driven settings (`QBO_*`), item mappings,
//!   and the tax strategy.
//! - [`oauth`] - HMAC-signed `state` parameters for the consent
//!   round-trip, persisted token state, and a [`TokenManager`] that
//!   serves fresh access tokens, refreshing behind a gate so concurrent
//!   callers share one refresh.
//! - [`client`] - realm-scoped REST calls with bearer auth. A rejected
//!   token triggers exactly one forced refresh and retry; a second
//!   rejection propagates.
//! - [`invoice`] - the sync engine. Orders map to invoices keyed on
//!   `DocNumber`, so repeated syncs find and reuse the existing invoice
//!   instead of creating duplicates.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use store_qbo::{FileTokenStore, InvoiceEngine, QboConfig, TokenManager};
//!
//! let config = QboConfig::from_env()?.expect("QBO_* env missing");
//! let store = Arc::new(FileTokenStore::new(config.token_path.clone()));
//! let tokens = Arc::new(TokenManager::new(config.clone(), store));
//!
//! // After the merchant completes /api/qbo/connect:
//! let engine = InvoiceEngine::new(config, tokens);
//! let outcome = engine.upsert_invoice(&order, None).await?;
//! ```

pub mod client;
pub mod config;
pub mod invoice;
pub mod oauth;

// Re-exports
pub use client::QboClient;
pub use config::{InvoiceSyncPolicy, QboConfig, QboEnvironment, TaxStrategy};
pub use invoice::{InvoiceEngine, InvoiceSyncOutcome};
pub use oauth::{
    generate_state, verify_state, AuthorizationRequest, BoxedTokenStore, FileTokenStore,
    MemoryTokenStore, TokenManager, TokenState, TokenStore,
};
