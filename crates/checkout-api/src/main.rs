//! # Agent-Checkout RS
//!
//! Checkout session engine for agent-driven purchases.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export CHECKOUT_SUCCESS_URL=https://example.com/checkout/success
//! export CHECKOUT_CANCEL_URL=https://example.com/checkout/cancel
//!
//! # Run the server
//! agent-checkout
//! ```

use checkout_api::{routes, state::AppState};
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
    let state = AppState::new()?;

    let addr = state.config.socket_addr();
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!(
        "Session TTL: {} minutes, sweep every {}s",
        state.config.session_ttl_minutes, state.config.sweep_interval_secs
    );

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("Agent-Checkout starting on http://{}", addr);

    if !is_prod {
        info!("Health: GET http://{}/health", addr);
        info!("Tools: POST http://{}/api/v1/tools", addr);
        info!("Webhook: POST http://{}/webhook/stripe", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  Agent-Checkout RS
  ━━━━━━━━━━━━━━━━━
  Checkout sessions for agent-driven purchases
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
