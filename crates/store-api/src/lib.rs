//! # store-api
//!
//! HTTP API layer for the storefront.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for the catalog, orders, checkout, and reconciliation
//! - The admin surface (fulfillment, manual invoice sync)
//! - The QuickBooks OAuth connect flow
//! - The background task queue (notifications, ledger mirror, invoice sync)
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check with integration readiness |
//! | GET | `/api/products` | Product catalog |
//! | POST | `/api/orders` | Place a pay-later order |
//! | POST | `/api/checkout` | Place a card order, open hosted checkout |
//! | GET | `/api/orders/{id}` | Poll one order |
//! | POST | `/api/orders/{id}/reconcile` | Settle against the processor |
//! | POST | `/api/admin/orders/{id}/fulfill` | Mark a pay-later order fulfilled |
//! | POST | `/api/admin/orders/{id}/invoice` | Sync the order to QuickBooks |
//! | GET | `/api/qbo/connect` | QuickBooks consent URL |
//! | GET | `/api/qbo/callback` | QuickBooks OAuth redirect target |
//! | GET | `/api/qbo/status` | QuickBooks connection report |

pub mod handlers;
pub mod ledger;
pub mod notify;
pub mod orders;
pub mod reconcile;
pub mod routes;
pub mod session;
pub mod state;
pub mod stores;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
