//! # store-square
//!
//! Square hosted-checkout integration for storefront-rs.
//!
//! The gateway implements `store_core::ProcessorClient` with two
//! operations:
//!
//! 1. **Payment-link creation** - builds a Square order from the
//!    storefront order's denormalized lines (plus synthetic shipping and
//!    tax lines) and returns the hosted checkout URL.
//! 2. **Order-state query** - reads the processor-side order state back
//!    for poll-based payment reconciliation.
//!
//! Credential environments are explicit: `sandbox`, `production`, or
//! `auto`. In auto mode creation tries sandbox first and falls back to
//! production only when Square rejects the credentials themselves; the
//! environment that won is recorded on the checkout session so state
//! queries never have to guess.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use store_square::SquareGateway;
//! use store_core::ProcessorClient;
//!
//! // Create gateway from environment (None when Square is unconfigured)
//! let gateway = SquareGateway::from_env()?.expect("SQUARE_* env missing");
//!
//! let session = gateway
//!     .create_session(&order, &idempotency_key, "https://shop.example/thank-you")
//!     .await?;
//!
//! // Redirect the customer to session.url
//! ```

pub mod checkout;
pub mod config;

// Re-exports
pub use checkout::SquareGateway;
pub use config::{SquareConfig, SquareCredentials, SquareMode};
