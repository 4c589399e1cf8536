//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Storefront:
///   - GET  /api/products - Product catalog
///   - POST /api/orders - Place a pay-later order
///   - POST /api/checkout - Place a card order, get the hosted checkout URL
///   - GET  /api/orders/{order_id} - Poll one order (status token or admin)
///   - POST /api/orders/{order_id}/reconcile - Settle against the processor
///
/// - Admin (bearer `ADMIN_API_TOKEN`):
///   - POST /api/admin/orders/{order_id}/fulfill - Mark a pay-later order fulfilled
///   - POST /api/admin/orders/{order_id}/invoice - Sync the order to QuickBooks
///
/// - QuickBooks connect flow:
///   - GET /api/qbo/connect - Consent URL (admin)
///   - GET /api/qbo/callback - OAuth redirect target
///   - GET /api/qbo/status - Connection report (admin)
pub fn create_router(state: AppState) -> Router {
    // CORS: the storefront is a static site on another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let store_routes = Router::new()
        .route("/products", get(handlers::list_products))
        .route("/orders", post(handlers::place_order))
        .route("/orders/{order_id}", get(handlers::get_order))
        .route("/orders/{order_id}/reconcile", post(handlers::reconcile_order))
        .route("/checkout", post(handlers::create_checkout));

    let admin_routes = Router::new()
        .route("/orders/{order_id}/fulfill", post(handlers::fulfill_order))
        .route("/orders/{order_id}/invoice", post(handlers::sync_invoice));

    let qbo_routes = Router::new()
        .route("/connect", get(handlers::qbo_connect))
        .route("/callback", get(handlers::qbo_callback))
        .route("/status", get(handlers::qbo_status));

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        // API
        .nest("/api", store_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/qbo", qbo_routes)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}
