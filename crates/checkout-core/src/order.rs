//! # Order Types
//!
//! The immutable order record created exactly once per successfully paid
//! session, and the fulfillment hook invoked after it is committed.

use crate::error::{CheckoutError, CheckoutResult};
use crate::session::{BuyerInfo, CartItem, CheckoutSession, SessionStatus, Totals};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Result of an external payment operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// External payment identifier (e.g., payment intent id)
    pub gateway_payment_id: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl PaymentOutcome {
    pub fn success(gateway_payment_id: impl Into<String>) -> Self {
        Self {
            gateway_payment_id: gateway_payment_id.into(),
            succeeded: true,
            decline_reason: None,
            completed_at: Utc::now(),
        }
    }

    pub fn declined(
        gateway_payment_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            gateway_payment_id: gateway_payment_id.into(),
            succeeded: false,
            decline_reason: Some(reason.into()),
            completed_at: Utc::now(),
        }
    }
}

/// Fulfillment lifecycle of an order.
/// Status may advance; monetary fields never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingFulfillment,
    Fulfilled,
    Refunded,
    Cancelled,
}

/// Immutable snapshot of a paid session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Opaque id, `ord_` prefixed
    pub id: String,
    pub session_id: String,
    pub items: Vec<CartItem>,
    pub buyer: BuyerInfo,
    pub totals: Totals,
    pub payment: PaymentOutcome,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Fulfillment collaborator, invoked synchronously after order commit.
///
/// A hook failure is reported to the caller as a warning; it never rolls back
/// the payment or the order record.
pub trait FulfillmentHook: Send + Sync {
    fn on_order_created(&self, order: &Order) -> CheckoutResult<()>;
}

/// Default hook: logs the order and succeeds
pub struct LoggingFulfillmentHook;

impl FulfillmentHook for LoggingFulfillmentHook {
    fn on_order_created(&self, order: &Order) -> CheckoutResult<()> {
        tracing::info!(
            "Order created: id={}, session={}, total={}",
            order.id,
            order.session_id,
            order.totals.total
        );
        Ok(())
    }
}

/// An order plus the warning from a failed fulfillment hook, if any
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_warning: Option<String>,
}

/// Converts a successfully paid session into an immutable order, exactly once
#[derive(Clone)]
pub struct OrderFactory {
    hook: Arc<dyn FulfillmentHook>,
}

impl OrderFactory {
    pub fn new(hook: Arc<dyn FulfillmentHook>) -> Self {
        Self { hook }
    }

    /// Build the order, mark the session `Completed`, and invoke the
    /// fulfillment hook.
    ///
    /// Preconditions: the session has a buyer with email, the payment outcome
    /// reports success, and no order exists yet for this session.
    pub fn from_session(
        &self,
        session: &mut CheckoutSession,
        outcome: PaymentOutcome,
    ) -> CheckoutResult<OrderReceipt> {
        session.buyer_email()?;

        if !outcome.succeeded {
            return Err(CheckoutError::Internal(
                "order creation requires a successful payment outcome".to_string(),
            ));
        }

        if session.order_id.is_some() {
            return Err(CheckoutError::DuplicateOrderAttempt {
                session_id: session.id.clone(),
            });
        }

        let order = Order {
            id: format!("ord_{}", Uuid::new_v4().simple()),
            session_id: session.id.clone(),
            items: session.items.clone(),
            buyer: session.buyer.clone().unwrap_or_default(),
            totals: session.totals,
            payment: outcome,
            status: OrderStatus::PendingFulfillment,
            created_at: Utc::now(),
        };

        session.order_id = Some(order.id.clone());
        session.status = SessionStatus::Completed;

        // The payment is already captured; hook failure must not unwind it.
        let fulfillment_warning = match self.hook.on_order_created(&order) {
            Ok(()) => None,
            Err(e) => {
                warn!("Fulfillment hook failed for order {}: {}", order.id, e);
                Some(e.to_string())
            }
        };

        Ok(OrderReceipt {
            order,
            fulfillment_warning,
        })
    }
}
