//! # Northstar Storefront
//!
//! Order pricing, tax, and payment engine for the packaging storefront.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export SQUARE_ENV=sandbox
//! export SQUARE_SANDBOX_ACCESS_TOKEN=EAAA...
//! export SQUARE_SANDBOX_LOCATION_ID=L123...
//! export ADMIN_API_TOKEN=...
//!
//! # Run the server
//! storefront
//! ```

use store_api::{routes, state::AppState, tasks};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Print banner
    print_banner();

    // Initialize application state
    let (state, task_rx) = AppState::new()?;

    let addr = state.config.socket_addr();

    info!("Card checkout: {}", on_off(state.processor.is_some()));
    info!("Accounting sync: {}", on_off(state.invoices.is_some()));
    info!("Admin routes: {}", on_off(state.config.admin_api_token.is_some()));

    // Background worker, then seed the ledger's products tab
    tokio::spawn(tasks::run_worker(task_rx, state.clone()));
    state.tasks.submit(tasks::Task::MirrorCatalog);

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("🚀 Storefront starting on http://{}", addr);
    info!("📝 Health: http://{}/health", addr);
    info!("🛒 Orders: POST http://{}/api/orders", addr);
    info!("💳 Checkout: POST http://{}/api/checkout", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn print_banner() {
    println!(
        r#"
  📦 Northstar Storefront 📦
  ━━━━━━━━━━━━━━━━━━━━━━━━━━
  Pricing, tax, and payments
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
