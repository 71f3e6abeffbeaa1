//! # Stripe Configuration
//!
//! Configuration management for the Stripe gateway.
//! All secrets are loaded from environment variables.

use checkout_core::CheckoutError;
use std::env;

/// Default expiry for a hosted payment session.
/// Stripe enforces a minimum of 30 minutes.
pub const DEFAULT_REDIRECT_EXPIRY_MINUTES: i64 = 30;

/// Webhook timestamp tolerance (5 minutes)
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Stripe API configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... or sk_live_...)
    pub secret_key: String,

    /// Webhook signing secret (whsec_...)
    pub webhook_secret: String,

    /// Where the buyer lands after a hosted payment session
    pub success_url: String,
    pub cancel_url: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// API version
    pub api_version: String,

    /// Lifetime of a hosted payment session, in minutes
    pub redirect_expiry_minutes: i64,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `STRIPE_SECRET_KEY`
    /// - `STRIPE_WEBHOOK_SECRET`
    /// - `CHECKOUT_SUCCESS_URL`
    /// - `CHECKOUT_CANCEL_URL`
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let secret_key = env::var("STRIPE_SECRET_KEY").map_err(|_| {
            CheckoutError::Configuration("STRIPE_SECRET_KEY not set".to_string())
        })?;

        let webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| {
            CheckoutError::Configuration("STRIPE_WEBHOOK_SECRET not set".to_string())
        })?;

        let success_url = env::var("CHECKOUT_SUCCESS_URL").map_err(|_| {
            CheckoutError::Configuration("CHECKOUT_SUCCESS_URL not set".to_string())
        })?;

        let cancel_url = env::var("CHECKOUT_CANCEL_URL").map_err(|_| {
            CheckoutError::Configuration("CHECKOUT_CANCEL_URL not set".to_string())
        })?;

        // Validate key formats
        if !secret_key.starts_with("sk_test_") && !secret_key.starts_with("sk_live_") {
            return Err(CheckoutError::Configuration(
                "STRIPE_SECRET_KEY must start with sk_test_ or sk_live_".to_string(),
            ));
        }

        if !webhook_secret.starts_with("whsec_") {
            return Err(CheckoutError::Configuration(
                "STRIPE_WEBHOOK_SECRET must start with whsec_".to_string(),
            ));
        }

        Ok(Self {
            secret_key,
            webhook_secret,
            success_url,
            cancel_url,
            api_base_url: "https://api.stripe.com".to_string(),
            api_version: "2024-12-18.acacia".to_string(),
            redirect_expiry_minutes: DEFAULT_REDIRECT_EXPIRY_MINUTES,
        })
    }

    /// Create config with explicit values (for testing)
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            success_url: "https://example.com/checkout/success".to_string(),
            cancel_url: "https://example.com/checkout/cancel".to_string(),
            api_base_url: "https://api.stripe.com".to_string(),
            api_version: "2024-12-18.acacia".to_string(),
            redirect_expiry_minutes: DEFAULT_REDIRECT_EXPIRY_MINUTES,
        }
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.starts_with("sk_test_")
    }

    /// Check if using live keys
    pub fn is_live_mode(&self) -> bool {
        self.secret_key.starts_with("sk_live_")
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: set the hosted-session return URLs
    pub fn with_return_urls(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.success_url = success_url.into();
        self.cancel_url = cancel_url.into();
        self
    }
}
