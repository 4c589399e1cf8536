//! # Payment Processor Client Trait
//!
//! The seam between the order engine and the hosted-checkout processor.
//! The production implementation lives in `store-square`; tests inject
//! stubs. Two operations cover everything the core needs: create a hosted
//! checkout session, and read back the processor-side order state for
//! reconciliation.

use crate::error::StoreResult;
use crate::order::{Order, OrderStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which credential environment a call was (or should be) made against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorEnvironment {
    Sandbox,
    Production,
}

impl ProcessorEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorEnvironment::Sandbox => "sandbox",
            ProcessorEnvironment::Production => "production",
        }
    }
}

impl std::fmt::Display for ProcessorEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processor-side order state as reported at reconciliation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorOrderState {
    Open,
    Completed,
    Canceled,
    /// Anything the mapping does not recognize; leaves local status alone
    Other(String),
}

impl ProcessorOrderState {
    /// Map processor state to the internal status it implies, if any.
    /// `Completed -> paid`, `Canceled -> canceled`, everything else is
    /// "no change".
    pub fn implied_status(&self) -> Option<OrderStatus> {
        match self {
            ProcessorOrderState::Completed => Some(OrderStatus::Paid),
            ProcessorOrderState::Canceled => Some(OrderStatus::Canceled),
            ProcessorOrderState::Open | ProcessorOrderState::Other(_) => None,
        }
    }

    /// Parse the processor's state string (e.g. `"COMPLETED"`)
    pub fn from_wire(state: &str) -> Self {
        match state {
            "OPEN" => ProcessorOrderState::Open,
            "COMPLETED" => ProcessorOrderState::Completed,
            "CANCELED" => ProcessorOrderState::Canceled,
            other => ProcessorOrderState::Other(other.to_string()),
        }
    }
}

/// A hosted checkout session created by the processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Processor's session / payment-link id
    pub session_id: String,

    /// Processor-side order id (the reconciliation handle)
    pub processor_order_id: String,

    /// URL to redirect the customer to
    pub url: String,

    /// Credential environment that created the session
    pub environment: ProcessorEnvironment,

    pub created_at: DateTime<Utc>,
}

/// Client for the hosted-checkout payment processor.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    /// Create a hosted checkout session for `order`.
    ///
    /// # Arguments
    /// * `order` - the persisted order (denormalized lines, totals fixed)
    /// * `idempotency_key` - per-request key so retries cannot create a
    ///   duplicate session for the same logical request
    /// * `redirect_url` - where the processor sends the customer after
    ///   payment
    async fn create_session(
        &self,
        order: &Order,
        idempotency_key: &str,
        redirect_url: &str,
    ) -> StoreResult<CheckoutSession>;

    /// Fetch the current processor-side state of an external order.
    ///
    /// The environment is the one recorded on the order when the session
    /// was created, so deployments in `auto` mode never guess which
    /// credential set owns the external order.
    async fn order_state(
        &self,
        environment: ProcessorEnvironment,
        processor_order_id: &str,
    ) -> StoreResult<ProcessorOrderState>;

    /// Processor name for logging
    fn processor_name(&self) -> &'static str;
}

/// Type alias for a shared processor client (dynamic dispatch)
pub type BoxedProcessorClient = Arc<dyn ProcessorClient>;
