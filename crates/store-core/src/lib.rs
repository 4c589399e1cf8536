//! # store-core
//!
//! Core types and traits for the storefront order engine.
//!
//! This crate provides:
//! - `calculate_tax` and `quote_shipping`, the pure destination calculators
//! - `TierPricer` for volume-discount unit pricing
//! - `assemble` for turning cart lines into a canonical `Order`
//! - `Order`, `OrderLine`, and the status state machine
//! - `ProcessorClient` trait for the hosted-checkout processor
//! - `CatalogStore` / `OrderStore` persistence traits
//! - `Notifier` and `LedgerMirror` collaborator contracts
//! - `StoreError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use store_core::{assemble, CartLine, CustomerInfo, Destination, PaymentMethod, TierPricer};
//!
//! let cart = vec![CartLine { item_id: "GB-54".into(), quantity: 22, price_snapshot_cents: None, name_snapshot: None }];
//! let destination = Destination { region: "ON".into(), postal_code: "M5V 2T6".into() };
//!
//! // resolved: HashMap<String, CatalogItem> fetched from the catalog store
//! let assembled = assemble(&cart, customer, &destination, PaymentMethod::Card, &resolved, &TierPricer::default_table())?;
//!
//! // insert assembled.order first, then apply assembled.stock_updates
//! ```

pub mod assemble;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod money;
pub mod notify;
pub mod order;
pub mod pricing;
pub mod processor;
pub mod shipping;
pub mod stores;
pub mod tax;

// Re-exports for convenience
pub use assemble::{assemble, AssembledOrder, CartLine, Destination, StockUpdate};
pub use catalog::{Catalog, CatalogItem, Currency};
pub use error::{StateRejection, StoreError, StoreResult};
pub use ledger::{BoxedLedgerMirror, LedgerMirror};
pub use money::{apply_rate, cents_to_decimal, format_cents};
pub use notify::{BoxedNotifier, Message, Notifier};
pub use order::{
    CustomerInfo, LineKind, Order, OrderLine, OrderStatus, PaymentMethod, ProcessorRefs,
    ShippingSnapshot, TaxSnapshot,
};
pub use pricing::{PriceBreak, TierConfig, TierPricer};
pub use processor::{
    BoxedProcessorClient, CheckoutSession, ProcessorClient, ProcessorEnvironment,
    ProcessorOrderState,
};
pub use shipping::{quote_shipping, ShippingCost, ShippingQuote, ShippingZone};
pub use stores::{BoxedCatalogStore, BoxedOrderStore, CatalogStore, OrderStore};
pub use tax::{calculate_tax, TaxBreakdown};
