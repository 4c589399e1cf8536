//! # Persistence Traits
//!
//! Collaborator contracts for the catalog and order stores. The engine
//! owns the semantics, not the backing storage: implementations live in
//! the API crate (in-memory) and can be swapped for a relational store
//! without touching the services.

use crate::catalog::CatalogItem;
use crate::error::StoreResult;
use crate::order::{Order, OrderStatus, ProcessorRefs};
use async_trait::async_trait;
use std::sync::Arc;

/// Read/write access to the catalog collection
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get(&self, id: &str) -> StoreResult<Option<CatalogItem>>;

    /// Fetch several items at once; missing ids are simply absent from
    /// the result (the assembler treats them as fallback lines)
    async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<CatalogItem>>;

    /// Set an item's stock to an absolute value
    async fn update_stock(&self, id: &str, new_stock: u32) -> StoreResult<()>;

    async fn all(&self) -> StoreResult<Vec<CatalogItem>>;
}

/// Persistence boundary for orders.
///
/// Orders are created once, mutated only in the narrow ways below, and
/// never deleted.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> StoreResult<()>;

    async fn get(&self, id: &str) -> StoreResult<Option<Order>>;

    /// Compare-and-swap on status: applies `from -> to` only if the
    /// stored status still equals `from`, returning whether it did.
    ///
    /// This is what serializes concurrent reconciliations per order: of
    /// two racing `pending -> paid` attempts exactly one observes the
    /// swap succeed, and only that caller fires the post-payment
    /// notifications.
    async fn transition_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool>;

    /// Attach external processor identifiers after session creation
    async fn set_processor_refs(&self, id: &str, refs: &ProcessorRefs) -> StoreResult<()>;

    /// Attach the external invoice id after an invoice sync
    async fn set_invoice_id(&self, id: &str, invoice_id: &str) -> StoreResult<()>;
}

/// Shared catalog store handle
pub type BoxedCatalogStore = Arc<dyn CatalogStore>;

/// Shared order store handle
pub type BoxedOrderStore = Arc<dyn OrderStore>;
