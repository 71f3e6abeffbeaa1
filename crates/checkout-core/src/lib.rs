//! # checkout-core
//!
//! Core types and logic for the agent-checkout engine.
//!
//! This crate provides:
//! - `CheckoutSession` and `SessionStore` for the session lifecycle
//! - `CheckoutEngine` for cart mutations and payment orchestration
//! - `PaymentGateway` trait for implementing payment providers
//! - `Product` and `ProductCatalog` for the product catalog
//! - `Order` and `OrderFactory` for the exactly-once order record
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{CheckoutEngine, PaymentInstrument};
//!
//! // Build a session and a cart
//! let session = engine.create_session().await;
//! engine.add_item(&session.id, "sku-123", 2).await?;
//! engine.set_buyer(&session.id, buyer).await?;
//!
//! // Complete with a pre-authorized token
//! let completion = engine
//!     .submit_token_payment(&session.id, PaymentInstrument::Token("spt_...".into()))
//!     .await?;
//!
//! // Or hand back a hosted payment link instead
//! let link = engine.create_redirect_link(&session.id).await?;
//! ```

pub mod engine;
pub mod error;
pub mod gateway;
pub mod order;
pub mod product;
pub mod session;
pub mod store;
pub mod totals;

// Re-exports for convenience
pub use engine::{CheckoutEngine, PaymentCompletion, RedirectLink};
pub use error::{CheckoutError, CheckoutResult};
pub use gateway::{
    BoxedPaymentGateway, GatewayNotification, NotificationKind, PaymentGateway,
    PaymentInstrument, RedirectSession, TokenOutcome,
};
pub use order::{
    FulfillmentHook, LoggingFulfillmentHook, Order, OrderFactory, OrderReceipt, OrderStatus,
    PaymentOutcome,
};
pub use product::{Catalog, Currency, Price, Product, ProductCatalog};
pub use session::{
    Address, BuyerInfo, CartItem, CheckoutSession, PaymentRef, PaymentStrategyKind,
    SessionStatus, Totals,
};
pub use store::{SessionHandle, SessionStore, SweeperHandle};
pub use totals::{DiscountCalculator, ShippingCalculator, TaxCalculator, TotalsCalculator};
