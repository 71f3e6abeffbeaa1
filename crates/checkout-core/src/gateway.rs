//! # Payment Gateway Trait
//!
//! Contract for the external payment-processing collaborator. The engine
//! drives one of two mutually exclusive completion strategies through this
//! trait: a hosted redirect session (asynchronous completion) or a
//! synchronous token submission.

use crate::error::CheckoutResult;
use crate::session::{CartItem, Totals};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the caller hands the gateway for a token-strategy payment.
///
/// Raw card details are for controlled testing only; gateway implementations
/// may reject them outside test mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentInstrument {
    /// Pre-authorized payment token (e.g., `spt_...`, `pm_...`)
    Token(String),
    /// Raw card instrument, test mode only
    TestCard {
        number: String,
        exp_month: u8,
        exp_year: u16,
        cvc: String,
    },
}

/// A hosted payment session minted by the gateway.
///
/// Its expiry window is short and independent of the checkout session's TTL.
#[derive(Debug, Clone, Serialize)]
pub struct RedirectSession {
    /// URL the caller redirects the buyer to
    pub url: String,
    /// Gateway-side reference for the hosted session
    pub gateway_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a synchronous token submission
#[derive(Debug, Clone)]
pub struct TokenOutcome {
    pub succeeded: bool,
    pub gateway_payment_id: String,
    pub decline_reason: Option<String>,
}

/// Kind of asynchronous gateway notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    /// Hosted session paid
    PaymentSucceeded,
    /// Payment attempt failed
    PaymentFailed,
    /// Hosted payment session expired unpaid
    RedirectExpired,
    /// Event the core does not act on
    Unknown(String),
}

/// A verified, parsed asynchronous notification from the gateway
#[derive(Debug, Clone)]
pub struct GatewayNotification {
    pub kind: NotificationKind,
    /// Gateway-side reference of the hosted session the event concerns
    pub gateway_ref: String,
    /// Our checkout session id, echoed back through gateway metadata
    pub session_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub decline_reason: Option<String>,
}

/// External payment gateway collaborator.
///
/// Implementations: Stripe (checkout-stripe). The two submission methods are
/// the only core operations allowed to block on external I/O; the engine
/// bounds both with a timeout and holds the per-session lock across them.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Mint a hosted payment session bound to the given totals.
    ///
    /// `session_id` is carried through gateway metadata so the asynchronous
    /// completion notification can be routed back to the checkout session.
    async fn create_redirect_session(
        &self,
        session_id: &str,
        totals: &Totals,
        buyer_email: &str,
        line_items: &[CartItem],
    ) -> CheckoutResult<RedirectSession>;

    /// Submit a payment token against the locked total, one round trip.
    ///
    /// Declines come back as `Ok` with `succeeded == false` and the gateway's
    /// reason; transport and API failures are `Err`.
    async fn submit_token(
        &self,
        session_id: &str,
        totals: &Totals,
        buyer_email: &str,
        instrument: &PaymentInstrument,
    ) -> CheckoutResult<TokenOutcome>;

    /// Verify an asynchronous notification's signature and parse it
    fn verify_notification(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> CheckoutResult<GatewayNotification>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;
