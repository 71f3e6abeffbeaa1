//! # checkout-stripe
//!
//! Stripe payment gateway for agent-checkout-rs.
//!
//! Implements both payment completion strategies against the Stripe API:
//!
//! 1. **Redirect** - hosted Checkout Sessions
//!    - Buyer pays on Stripe's hosted page
//!    - Completion arrives asynchronously via signed webhook
//!    - Best for: human-confirmed purchases
//!
//! 2. **Token** - confirm-on-create Payment Intents
//!    - One synchronous round trip with a pre-authorized token
//!    - Best for: agent-driven purchases with a delegated mandate
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_stripe::StripeGateway;
//! use checkout_core::PaymentGateway;
//!
//! // Create gateway from environment
//! let gateway = StripeGateway::from_env()?;
//!
//! // Mint a hosted payment link
//! let redirect = gateway
//!     .create_redirect_session(&session_id, &totals, "buyer@example.com", &items)
//!     .await?;
//!
//! // Redirect the buyer to redirect.url
//! ```

pub mod config;
pub mod gateway;
pub mod webhook;

// Re-exports
pub use config::StripeConfig;
pub use gateway::StripeGateway;
pub use webhook::REQUIRED_WEBHOOK_EVENTS;
