//! # Notifier Contract
//!
//! Best-effort outbound notifications (customer receipts, admin alerts).
//! Delivery failures are logged by callers, never propagated into the
//! operation that triggered them: a receipt that fails to send must not
//! undo a recorded payment.

use crate::error::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An outbound message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Sends messages somewhere (mail, chat, a log). Implementations live
/// outside the core.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> StoreResult<()>;
}

/// Shared notifier handle
pub type BoxedNotifier = Arc<dyn Notifier>;
