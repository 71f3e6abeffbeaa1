//! # Tool Surface
//!
//! The agent-facing operation set. Every checkout operation is a named tool
//! invoked through a single endpoint, so an agent framework can expose the
//! whole flow as one tool family without per-route plumbing.

use checkout_core::{
    BuyerInfo, CheckoutEngine, CheckoutError, CheckoutResult, CheckoutSession, Order,
    PaymentInstrument, PaymentOutcome, Product,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_quantity() -> i64 {
    1
}

/// A tool invocation, dispatched on the `tool` tag
#[derive(Debug, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    /// Start a fresh checkout session
    CreateSession,

    /// Add a product to the cart (merges quantity if already present)
    AddItem {
        session_id: String,
        product_id: String,
        #[serde(default = "default_quantity")]
        quantity: i64,
    },

    /// Remove a product from the cart (no-op if absent)
    RemoveItem {
        session_id: String,
        product_id: String,
    },

    /// Replace a cart item's quantity; zero removes it
    UpdateQuantity {
        session_id: String,
        product_id: String,
        quantity: i64,
    },

    /// Attach or replace buyer contact details
    SetBuyer {
        session_id: String,
        buyer: BuyerInfo,
    },

    /// Mint a hosted payment link (redirect strategy)
    CreateRedirectLink { session_id: String },

    /// Pay synchronously with a pre-authorized token (token strategy)
    SubmitTokenPayment {
        session_id: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        card: Option<TestCardRequest>,
    },

    /// Report the result of a token payment executed out-of-band,
    /// driving the same terminal transition a webhook would
    CompleteWithTokenResult {
        session_id: String,
        gateway_payment_id: String,
        succeeded: bool,
        #[serde(default)]
        decline_reason: Option<String>,
    },

    /// Cancel a non-terminal session
    Cancel { session_id: String },

    /// Snapshot of the session's current state
    GetStatus { session_id: String },

    /// Search the product catalog
    SearchProducts { query: String },
}

/// Raw card details for controlled testing
#[derive(Debug, Deserialize)]
pub struct TestCardRequest {
    pub number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: String,
}

/// Reply payload for a tool invocation
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolReply {
    /// The session after the operation
    Session { session: CheckoutSession },

    /// A minted hosted-payment link
    RedirectLink {
        session: CheckoutSession,
        url: String,
        gateway_ref: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
    },

    /// A payment attempt reached a terminal transition
    Completed {
        session: CheckoutSession,
        #[serde(skip_serializing_if = "Option::is_none")]
        order: Option<Order>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fulfillment_warning: Option<String>,
    },

    /// Catalog search hits
    Products { products: Vec<Product>, count: usize },
}

/// Dispatch a tool invocation against the engine
pub async fn dispatch(engine: &CheckoutEngine, request: ToolRequest) -> CheckoutResult<ToolReply> {
    match request {
        ToolRequest::CreateSession => {
            let session = engine.create_session().await;
            Ok(ToolReply::Session { session })
        }

        ToolRequest::AddItem {
            session_id,
            product_id,
            quantity,
        } => {
            let session = engine.add_item(&session_id, &product_id, quantity).await?;
            Ok(ToolReply::Session { session })
        }

        ToolRequest::RemoveItem {
            session_id,
            product_id,
        } => {
            let session = engine.remove_item(&session_id, &product_id).await?;
            Ok(ToolReply::Session { session })
        }

        ToolRequest::UpdateQuantity {
            session_id,
            product_id,
            quantity,
        } => {
            let session = engine
                .update_quantity(&session_id, &product_id, quantity)
                .await?;
            Ok(ToolReply::Session { session })
        }

        ToolRequest::SetBuyer { session_id, buyer } => {
            let session = engine.set_buyer(&session_id, buyer).await?;
            Ok(ToolReply::Session { session })
        }

        ToolRequest::CreateRedirectLink { session_id } => {
            let link = engine.create_redirect_link(&session_id).await?;
            Ok(ToolReply::RedirectLink {
                session: link.session,
                url: link.redirect.url,
                gateway_ref: link.redirect.gateway_ref,
                expires_at: link.redirect.expires_at,
            })
        }

        ToolRequest::SubmitTokenPayment {
            session_id,
            token,
            card,
        } => {
            let instrument = match (token, card) {
                (Some(token), None) => PaymentInstrument::Token(token),
                (None, Some(card)) => PaymentInstrument::TestCard {
                    number: card.number,
                    exp_month: card.exp_month,
                    exp_year: card.exp_year,
                    cvc: card.cvc,
                },
                _ => {
                    return Err(CheckoutError::InvalidRequest(
                        "Provide exactly one of 'token' or 'card'".to_string(),
                    ))
                }
            };
            let completion = engine.submit_token_payment(&session_id, instrument).await?;
            let (order, fulfillment_warning) = match completion.receipt {
                Some(receipt) => (Some(receipt.order), receipt.fulfillment_warning),
                None => (None, None),
            };
            Ok(ToolReply::Completed {
                session: completion.session,
                order,
                fulfillment_warning,
            })
        }

        ToolRequest::CompleteWithTokenResult {
            session_id,
            gateway_payment_id,
            succeeded,
            decline_reason,
        } => {
            let outcome = if succeeded {
                PaymentOutcome::success(gateway_payment_id)
            } else {
                PaymentOutcome::declined(
                    gateway_payment_id,
                    decline_reason.unwrap_or_else(|| "declined".to_string()),
                )
            };
            let completion = engine.apply_payment_outcome(&session_id, outcome).await?;
            let (order, fulfillment_warning) = match completion.receipt {
                Some(receipt) => (Some(receipt.order), receipt.fulfillment_warning),
                None => (None, None),
            };
            Ok(ToolReply::Completed {
                session: completion.session,
                order,
                fulfillment_warning,
            })
        }

        ToolRequest::Cancel { session_id } => {
            let session = engine.cancel(&session_id).await?;
            Ok(ToolReply::Session { session })
        }

        ToolRequest::GetStatus { session_id } => {
            let session = engine.get_session(&session_id).await?;
            Ok(ToolReply::Session { session })
        }

        ToolRequest::SearchProducts { query } => {
            let products = engine.search_products(&query);
            let count = products.len();
            Ok(ToolReply::Products { products, count })
        }
    }
}
