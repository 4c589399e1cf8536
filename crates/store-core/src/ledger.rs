//! # Ledger Mirror Contract
//!
//! The storefront mirrors orders and the catalog into a spreadsheet-style
//! ledger for the back office. The transport is a collaborator; the core
//! only defines the contract. Mirror writes are best-effort background
//! work and never gate an order.

use crate::error::StoreResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Append/replace operations on named tabs of the ledger
#[async_trait]
pub trait LedgerMirror: Send + Sync {
    /// Append one row to a tab
    async fn append_row(&self, tab: &str, row: &[String]) -> StoreResult<()>;

    /// Replace a tab's full contents (first row is the header)
    async fn replace_sheet(&self, tab: &str, rows: &[Vec<String>]) -> StoreResult<()>;
}

/// Shared ledger mirror handle
pub type BoxedLedgerMirror = Arc<dyn LedgerMirror>;
