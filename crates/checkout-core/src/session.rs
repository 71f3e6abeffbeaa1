//! # Checkout Session Aggregate
//!
//! The central mutable aggregate: cart items, buyer, derived totals and the
//! payment status state machine. Sessions are bounded by a TTL and identified
//! by an opaque `cs_`-prefixed id.

use crate::error::{CheckoutError, CheckoutResult};
use crate::product::{Currency, Price, Product};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a checkout session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created, cart empty
    Pending,
    /// Cart has at least one item, payment may be initiated
    Ready,
    /// A payment attempt is in flight
    Processing,
    /// Payment succeeded and an order was created (terminal)
    Completed,
    /// Payment attempt failed (terminal, retryable by re-initiating)
    Failed,
    /// Caller cancelled the session (terminal)
    Cancelled,
    /// TTL elapsed (terminal, checked lazily on access)
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Ready => "ready",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Expired => "expired",
        }
    }

    /// Terminal states reject cancellation and further cart edits.
    /// `Failed` is terminal for edits but a fresh payment attempt may still
    /// be initiated from it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::Failed
                | SessionStatus::Cancelled
                | SessionStatus::Expired
        )
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Pending
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An item in the cart
///
/// Price and currency are snapshotted from the catalog on first add and are
/// immune to later catalog changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Product ID (unique within a session)
    pub product_id: String,

    /// Product name (denormalized for display)
    pub display_name: String,

    /// Unit price locked at add-time
    pub unit_price: Price,

    /// Quantity (positive)
    pub quantity: u32,
}

impl CartItem {
    /// Create a cart item from a catalog product
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            display_name: product.name.clone(),
            unit_price: product.price,
            quantity,
        }
    }

    /// Line total in minor units
    pub fn line_total(&self) -> i64 {
        self.unit_price.amount * self.quantity as i64
    }
}

/// Buyer contact details
///
/// Email is optional on the struct but required before any payment attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuyerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl BuyerInfo {
    /// Email if present and non-empty
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.is_empty())
    }
}

/// Postal address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

/// Derived price aggregates, in minor currency units.
///
/// Never set directly by callers; recomputed after every cart/buyer mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: i64,
    pub tax: i64,
    pub shipping: i64,
    pub discount: i64,
    pub total: i64,
    pub currency: Currency,
}

impl Totals {
    pub fn zero(currency: Currency) -> Self {
        Self {
            subtotal: 0,
            tax: 0,
            shipping: 0,
            discount: 0,
            total: 0,
            currency,
        }
    }
}

impl Default for Totals {
    fn default() -> Self {
        Self::zero(Currency::default())
    }
}

/// Which completion strategy a payment attempt used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStrategyKind {
    /// Hosted page; completion reported asynchronously
    Redirect,
    /// Synchronous single round trip with a payment token
    Token,
}

/// Reference to an in-flight or completed external payment operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRef {
    /// Gateway-side reference (hosted session id or payment intent id)
    pub gateway_ref: String,
    pub strategy: PaymentStrategyKind,
    pub initiated_at: DateTime<Utc>,
}

/// The central checkout aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Opaque id, `cs_` prefixed, immutable
    pub id: String,

    pub status: SessionStatus,

    /// Ordered items, unique by product id
    pub items: Vec<CartItem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<BuyerInfo>,

    /// Derived, never hand-edited
    pub totals: Totals,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<PaymentRef>,

    /// Set exactly once, when the order is created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Create a fresh pending session with an empty cart and zero totals
    pub fn new(ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            id: format!("cs_{}", Uuid::new_v4().simple()),
            status: SessionStatus::Pending,
            items: Vec::new(),
            buyer: None,
            totals: Totals::default(),
            payment_ref: None,
            order_id: None,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// True once the TTL has elapsed
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Session currency, taken from the first item
    pub fn currency(&self) -> Option<Currency> {
        self.items.first().map(|item| item.unit_price.currency)
    }

    /// Find a cart item by product id
    pub fn find_item(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Guard: cart and buyer edits are only legal before a payment attempt
    pub fn ensure_mutable(&self, operation: &'static str) -> CheckoutResult<()> {
        match self.status {
            SessionStatus::Pending | SessionStatus::Ready => Ok(()),
            status => Err(CheckoutError::InvalidTransition {
                status: status.as_str().to_string(),
                operation,
            }),
        }
    }

    /// Guard: payment may be initiated from `Ready` (first attempt) or
    /// `Failed` (re-initiation after a declined/errored attempt)
    pub fn ensure_payment_initiable(&self) -> CheckoutResult<()> {
        match self.status {
            SessionStatus::Ready | SessionStatus::Failed => Ok(()),
            SessionStatus::Pending => Err(CheckoutError::EmptyCart),
            SessionStatus::Processing => Err(CheckoutError::PaymentAlreadyInProgress {
                session_id: self.id.clone(),
            }),
            SessionStatus::Completed => Err(CheckoutError::DuplicateOrderAttempt {
                session_id: self.id.clone(),
            }),
            status => Err(CheckoutError::InvalidTransition {
                status: status.as_str().to_string(),
                operation: "initiate_payment",
            }),
        }
    }

    /// Buyer email, required for any payment attempt
    pub fn buyer_email(&self) -> CheckoutResult<&str> {
        self.buyer
            .as_ref()
            .and_then(|b| b.email())
            .ok_or(CheckoutError::MissingBuyerInfo)
    }

    /// Promote/demote between `Pending` and `Ready` after a cart edit
    pub fn sync_cart_status(&mut self) {
        if self.items.is_empty() {
            if self.status == SessionStatus::Ready {
                self.status = SessionStatus::Pending;
            }
        } else if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Ready;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Price;

    fn product(id: &str, cents: i64) -> Product {
        Product::new(id, id.to_uppercase(), Price::from_minor(cents, Currency::USD))
    }

    #[test]
    fn test_new_session_shape() {
        let session = CheckoutSession::new(Duration::minutes(60));
        assert!(session.id.starts_with("cs_"));
        assert_eq!(session.status, SessionStatus::Pending);
        assert!(session.items.is_empty());
        assert_eq!(session.totals.total, 0);
        assert_eq!(session.expires_at, session.created_at + Duration::minutes(60));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_expiry_is_lazy_and_strict() {
        let mut session = CheckoutSession::new(Duration::minutes(60));
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
    }

    #[test]
    fn test_line_total() {
        let item = CartItem::from_product(&product("a", 1999), 2);
        assert_eq!(item.line_total(), 3998);
    }

    #[test]
    fn test_cart_status_sync() {
        let mut session = CheckoutSession::new(Duration::minutes(60));
        session.items.push(CartItem::from_product(&product("a", 100), 1));
        session.sync_cart_status();
        assert_eq!(session.status, SessionStatus::Ready);

        session.items.clear();
        session.sync_cart_status();
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[test]
    fn test_payment_initiable_guard() {
        let mut session = CheckoutSession::new(Duration::minutes(60));
        assert!(matches!(
            session.ensure_payment_initiable(),
            Err(CheckoutError::EmptyCart)
        ));

        session.status = SessionStatus::Ready;
        assert!(session.ensure_payment_initiable().is_ok());

        session.status = SessionStatus::Failed;
        assert!(session.ensure_payment_initiable().is_ok());

        session.status = SessionStatus::Processing;
        assert!(matches!(
            session.ensure_payment_initiable(),
            Err(CheckoutError::PaymentAlreadyInProgress { .. })
        ));

        session.status = SessionStatus::Completed;
        assert!(matches!(
            session.ensure_payment_initiable(),
            Err(CheckoutError::DuplicateOrderAttempt { .. })
        ));
    }

    #[test]
    fn test_buyer_email_guard() {
        let mut session = CheckoutSession::new(Duration::minutes(60));
        assert!(matches!(
            session.buyer_email(),
            Err(CheckoutError::MissingBuyerInfo)
        ));

        session.buyer = Some(BuyerInfo {
            name: Some("Ada".into()),
            ..Default::default()
        });
        assert!(matches!(
            session.buyer_email(),
            Err(CheckoutError::MissingBuyerInfo)
        ));

        session.buyer = Some(BuyerInfo {
            email: Some("ada@example.com".into()),
            ..Default::default()
        });
        assert_eq!(session.buyer_email().unwrap(), "ada@example.com");
    }
}
