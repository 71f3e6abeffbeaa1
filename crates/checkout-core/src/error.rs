//! # Checkout Error Types
//!
//! Typed error handling for the checkout engine.
//! All checkout operations return `Result<T, CheckoutError>`.

use thiserror::Error;

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Session unknown, expired, or already evicted
    #[error("Session not found or expired: {session_id}")]
    SessionNotFound { session_id: String },

    /// Product not found in catalog
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// Quantity must be a positive integer
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// Quantity update targeted a product not in the cart
    #[error("Item not in cart: {product_id}")]
    ItemNotInCart { product_id: String },

    /// Payment attempted against an empty cart
    #[error("Cart is empty")]
    EmptyCart,

    /// Payment attempted without a buyer email
    #[error("Buyer information with email is required")]
    MissingBuyerInfo,

    /// Item currency differs from the session currency
    #[error("Currency mismatch: session is {expected}, item is {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// A payment attempt is already in flight for this session
    #[error("Payment already in progress for session {session_id}")]
    PaymentAlreadyInProgress { session_id: String },

    /// Gateway declined the payment
    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },

    /// Gateway unreachable or timed out
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// An order already exists for this session
    #[error("Order already created for session {session_id}")]
    DuplicateOrderAttempt { session_id: String },

    /// Operation is illegal in the session's current status
    #[error("Operation '{operation}' not allowed while session is {status}")]
    InvalidTransition {
        status: String,
        operation: &'static str,
    },

    /// Gateway API error (non-decline)
    #[error("Gateway error [{provider}]: {message}")]
    Gateway { provider: String, message: String },

    /// Async notification signature verification failed
    #[error("Notification verification failed: {0}")]
    NotificationVerification(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckoutError {
    /// Machine-readable error kind, stable across message changes
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Configuration(_) => "configuration",
            CheckoutError::InvalidRequest(_) => "invalid_request",
            CheckoutError::SessionNotFound { .. } => "session_not_found",
            CheckoutError::ProductNotFound { .. } => "product_not_found",
            CheckoutError::InvalidQuantity { .. } => "invalid_quantity",
            CheckoutError::ItemNotInCart { .. } => "item_not_in_cart",
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::MissingBuyerInfo => "missing_buyer_info",
            CheckoutError::CurrencyMismatch { .. } => "currency_mismatch",
            CheckoutError::PaymentAlreadyInProgress { .. } => "payment_already_in_progress",
            CheckoutError::PaymentDeclined { .. } => "payment_declined",
            CheckoutError::GatewayUnavailable(_) => "gateway_unavailable",
            CheckoutError::DuplicateOrderAttempt { .. } => "duplicate_order_attempt",
            CheckoutError::InvalidTransition { .. } => "invalid_transition",
            CheckoutError::Gateway { .. } => "gateway_error",
            CheckoutError::NotificationVerification(_) => "notification_verification_failed",
            CheckoutError::Serialization(_) => "serialization",
            CheckoutError::Internal(_) => "internal",
        }
    }

    /// Returns true if the caller may re-initiate the payment attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::PaymentDeclined { .. }
                | CheckoutError::GatewayUnavailable(_)
                | CheckoutError::Gateway { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::Configuration(_) => 500,
            CheckoutError::InvalidRequest(_) => 400,
            CheckoutError::SessionNotFound { .. } => 404,
            CheckoutError::ProductNotFound { .. } => 404,
            CheckoutError::InvalidQuantity { .. } => 400,
            CheckoutError::ItemNotInCart { .. } => 400,
            CheckoutError::EmptyCart => 400,
            CheckoutError::MissingBuyerInfo => 400,
            CheckoutError::CurrencyMismatch { .. } => 400,
            CheckoutError::PaymentAlreadyInProgress { .. } => 409,
            CheckoutError::PaymentDeclined { .. } => 402,
            CheckoutError::GatewayUnavailable(_) => 503,
            CheckoutError::DuplicateOrderAttempt { .. } => 409,
            CheckoutError::InvalidTransition { .. } => 409,
            CheckoutError::Gateway { .. } => 502,
            CheckoutError::NotificationVerification(_) => 401,
            CheckoutError::Serialization(_) => 500,
            CheckoutError::Internal(_) => 500,
        }
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CheckoutError::GatewayUnavailable("timeout".into()).is_retryable());
        assert!(CheckoutError::PaymentDeclined {
            reason: "card_declined".into()
        }
        .is_retryable());
        assert!(!CheckoutError::EmptyCart.is_retryable());
        assert!(!CheckoutError::PaymentAlreadyInProgress {
            session_id: "cs_x".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CheckoutError::SessionNotFound {
                session_id: "cs_x".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            CheckoutError::PaymentAlreadyInProgress {
                session_id: "cs_x".into()
            }
            .status_code(),
            409
        );
        assert_eq!(
            CheckoutError::PaymentDeclined {
                reason: "insufficient_funds".into()
            }
            .status_code(),
            402
        );
        assert_eq!(CheckoutError::MissingBuyerInfo.status_code(), 400);
    }

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(CheckoutError::EmptyCart.kind(), "empty_cart");
        assert_eq!(
            CheckoutError::DuplicateOrderAttempt {
                session_id: "cs_x".into()
            }
            .kind(),
            "duplicate_order_attempt"
        );
        assert_eq!(
            CheckoutError::GatewayUnavailable("down".into()).kind(),
            "gateway_unavailable"
        );
    }
}
