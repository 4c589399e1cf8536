//! # In-Memory Stores
//!
//! In-memory implementations of the `CatalogStore` and `OrderStore`
//! traits. The catalog store is seeded from the product TOML at startup;
//! the order store starts empty. Both guard their data with a
//! `tokio::sync::RwLock`, and the status compare-and-swap runs inside a
//! single write-lock critical section, which is what makes concurrent
//! reconciliations of one order serialize.

use async_trait::async_trait;
use std::collections::HashMap;
use store_core::{
    CatalogItem, CatalogStore, Order, OrderStatus, OrderStore, ProcessorRefs, StoreError,
    StoreResult,
};
use tokio::sync::RwLock;

/// Catalog store backed by a `Vec` (stable iteration order for the
/// ledger mirror and the products endpoint; catalogs are small)
pub struct MemoryCatalogStore {
    items: RwLock<Vec<CatalogItem>>,
}

impl MemoryCatalogStore {
    pub fn with_items(items: Vec<CatalogItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn get(&self, id: &str) -> StoreResult<Option<CatalogItem>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|i| i.id == id).cloned())
    }

    async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<CatalogItem>> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .filter(|i| ids.iter().any(|id| *id == i.id))
            .cloned()
            .collect())
    }

    async fn update_stock(&self, id: &str, new_stock: u32) -> StoreResult<()> {
        let mut items = self.items.write().await;
        let item = items.iter_mut().find(|i| i.id == id).ok_or_else(|| {
            StoreError::NotFound {
                what: format!("catalog item {}", id),
            }
        })?;
        item.stock = new_stock;
        Ok(())
    }

    async fn all(&self) -> StoreResult<Vec<CatalogItem>> {
        Ok(self.items.read().await.clone())
    }
}

/// Order store backed by a `HashMap` keyed on order id
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(StoreError::Store(format!(
                "order {} already exists",
                order.id
            )));
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn transition_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(id).ok_or_else(|| StoreError::NotFound {
            what: format!("order {}", id),
        })?;
        if order.status != from {
            return Ok(false);
        }
        order.status = to;
        Ok(true)
    }

    async fn set_processor_refs(&self, id: &str, refs: &ProcessorRefs) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(id).ok_or_else(|| StoreError::NotFound {
            what: format!("order {}", id),
        })?;
        order.processor = Some(refs.clone());
        Ok(())
    }

    async fn set_invoice_id(&self, id: &str, invoice_id: &str) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(id).ok_or_else(|| StoreError::NotFound {
            what: format!("order {}", id),
        })?;
        order.invoice_id = Some(invoice_id.to_string());
        Ok(())
    }
}
