//! # checkout-api
//!
//! HTTP API layer for agent-checkout-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - A single tool-dispatch endpoint covering the full checkout flow
//! - Webhook handler for asynchronous payment completion
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/v1/tools` | Dispatch a checkout tool invocation |
//! | GET | `/api/v1/products` | List products |
//! | GET | `/api/v1/products/search` | Search products |
//! | GET | `/api/v1/products/:id` | Get product |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod handlers;
pub mod routes;
pub mod state;
pub mod tools;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
pub use tools::{dispatch, ToolReply, ToolRequest};
