//! # Stripe Gateway
//!
//! Implementation of the payment gateway trait against the Stripe API:
//! hosted Checkout Sessions for the redirect strategy, Payment Intents for
//! the synchronous token strategy, and signed webhook verification.

use crate::config::{StripeConfig, WEBHOOK_TOLERANCE_SECS};
use crate::webhook;
use async_trait::async_trait;
use checkout_core::{
    CartItem, CheckoutError, CheckoutResult, GatewayNotification, PaymentGateway,
    PaymentInstrument, RedirectSession, TokenOutcome, Totals,
};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

/// Stripe payment gateway.
///
/// Uses Stripe's hosted checkout page for the redirect strategy (the
/// recommended path for PCI compliance) and a confirm-on-create Payment
/// Intent for pre-authorized tokens.
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(config: StripeConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                CheckoutError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        let config = StripeConfig::from_env()?;
        Self::new(config)
    }

    async fn post_form(
        &self,
        path: &str,
        idempotency_key: &str,
        form_params: &[(String, String)],
    ) -> CheckoutResult<String> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", idempotency_key)
            .form(form_params)
            .send()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;

        if status.is_server_error() {
            error!("Stripe API unavailable: status={}, body={}", status, body);
            return Err(CheckoutError::GatewayUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            // Card errors are declines, not failures of the call itself;
            // the caller inspects the body for them.
            if status.as_u16() == 402 {
                return Ok(body);
            }

            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(CheckoutError::Gateway {
                    provider: "stripe".to_string(),
                    message: error_response.error.message,
                });
            }

            return Err(CheckoutError::Gateway {
                provider: "stripe".to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        Ok(body)
    }

    fn line_item_params(line_items: &[CartItem], form_params: &mut Vec<(String, String)>) {
        for (i, item) in line_items.iter().enumerate() {
            form_params.push((
                format!("line_items[{}][price_data][currency]", i),
                item.unit_price.currency.as_str().to_string(),
            ));
            form_params.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_price.amount.to_string(),
            ));
            form_params.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.display_name.clone(),
            ));
            form_params.push((
                format!("line_items[{}][quantity]", i),
                item.quantity.to_string(),
            ));
        }
    }

    fn instrument_params(
        &self,
        instrument: &PaymentInstrument,
        form_params: &mut Vec<(String, String)>,
    ) -> CheckoutResult<()> {
        match instrument {
            PaymentInstrument::Token(token) => {
                // Agent-issued shared payment tokens and plain payment
                // methods take different parameters.
                if token.starts_with("pm_") {
                    form_params.push(("payment_method".to_string(), token.clone()));
                } else {
                    form_params.push(("shared_payment_token".to_string(), token.clone()));
                }
            }
            PaymentInstrument::TestCard {
                number,
                exp_month,
                exp_year,
                cvc,
            } => {
                if !self.config.is_test_mode() {
                    return Err(CheckoutError::InvalidRequest(
                        "Raw card instruments are only accepted with test keys".to_string(),
                    ));
                }
                form_params.push(("payment_method_data[type]".to_string(), "card".to_string()));
                form_params.push((
                    "payment_method_data[card][number]".to_string(),
                    number.clone(),
                ));
                form_params.push((
                    "payment_method_data[card][exp_month]".to_string(),
                    exp_month.to_string(),
                ));
                form_params.push((
                    "payment_method_data[card][exp_year]".to_string(),
                    exp_year.to_string(),
                ));
                form_params.push(("payment_method_data[card][cvc]".to_string(), cvc.clone()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, totals, line_items), fields(session_id = %session_id))]
    async fn create_redirect_session(
        &self,
        session_id: &str,
        totals: &Totals,
        buyer_email: &str,
        line_items: &[CartItem],
    ) -> CheckoutResult<RedirectSession> {
        if line_items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        debug!(
            "Creating Stripe checkout session: {} items, total={}",
            line_items.len(),
            totals.total
        );

        let expires_at = Utc::now() + Duration::minutes(self.config.redirect_expiry_minutes);

        let mut form_params: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.config.success_url.clone()),
            ("cancel_url".to_string(), self.config.cancel_url.clone()),
            ("customer_email".to_string(), buyer_email.to_string()),
            ("expires_at".to_string(), expires_at.timestamp().to_string()),
            (
                "metadata[checkout_session_id]".to_string(),
                session_id.to_string(),
            ),
        ];
        Self::line_item_params(line_items, &mut form_params);

        let body = self
            .post_form("/v1/checkout/sessions", session_id, &form_params)
            .await?;

        let response: StripeCheckoutSessionResponse =
            serde_json::from_str(&body).map_err(|e| {
                CheckoutError::Serialization(format!("Failed to parse Stripe response: {}", e))
            })?;

        info!(
            "Created Stripe checkout session: id={}, url={}",
            response.id, response.url
        );

        Ok(RedirectSession {
            url: response.url,
            gateway_ref: response.id,
            expires_at: response
                .expires_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .or(Some(expires_at)),
        })
    }

    #[instrument(skip(self, totals, instrument), fields(session_id = %session_id))]
    async fn submit_token(
        &self,
        session_id: &str,
        totals: &Totals,
        buyer_email: &str,
        instrument: &PaymentInstrument,
    ) -> CheckoutResult<TokenOutcome> {
        debug!(
            "Submitting Stripe payment intent: amount={} {}",
            totals.total,
            totals.currency.as_str()
        );

        let mut form_params: Vec<(String, String)> = vec![
            ("amount".to_string(), totals.total.to_string()),
            (
                "currency".to_string(),
                totals.currency.as_str().to_string(),
            ),
            ("confirm".to_string(), "true".to_string()),
            ("receipt_email".to_string(), buyer_email.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            (
                "automatic_payment_methods[allow_redirects]".to_string(),
                "never".to_string(),
            ),
            (
                "metadata[checkout_session_id]".to_string(),
                session_id.to_string(),
            ),
        ];
        self.instrument_params(instrument, &mut form_params)?;

        let body = self
            .post_form("/v1/payment_intents", session_id, &form_params)
            .await?;

        // A 402 body is a card error, not a payment intent.
        if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
            let reason = error_response
                .error
                .decline_code
                .or(error_response.error.code)
                .unwrap_or(error_response.error.message);
            info!("Stripe declined payment for session {}: {}", session_id, reason);
            return Ok(TokenOutcome {
                succeeded: false,
                gateway_payment_id: error_response
                    .error
                    .payment_intent_id
                    .unwrap_or_default(),
                decline_reason: Some(reason),
            });
        }

        let intent: StripePaymentIntentResponse = serde_json::from_str(&body).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        match intent.status.as_str() {
            "succeeded" => {
                info!("Stripe payment intent succeeded: {}", intent.id);
                Ok(TokenOutcome {
                    succeeded: true,
                    gateway_payment_id: intent.id,
                    decline_reason: None,
                })
            }
            status => {
                let reason = intent
                    .last_payment_error
                    .and_then(|e| e.decline_code.or(e.code))
                    .unwrap_or_else(|| format!("payment intent in state {}", status));
                info!(
                    "Stripe payment intent {} not captured: {}",
                    intent.id, reason
                );
                Ok(TokenOutcome {
                    succeeded: false,
                    gateway_payment_id: intent.id,
                    decline_reason: Some(reason),
                })
            }
        }
    }

    fn verify_notification(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> CheckoutResult<GatewayNotification> {
        webhook::verify_and_parse(
            &self.config.webhook_secret,
            WEBHOOK_TOLERANCE_SECS,
            payload,
            signature,
        )
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    url: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntentResponse {
    id: String,
    status: String,
    #[serde(default)]
    last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeApiError,
}

#[derive(Debug, Deserialize)]
struct StripeApiError {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
    #[serde(default, rename = "payment_intent")]
    payment_intent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{Currency, Price, Product};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> StripeGateway {
        let config = StripeConfig::new("sk_test_abc123", "whsec_secret")
            .with_api_base_url(server.uri());
        StripeGateway::new(config).unwrap()
    }

    fn cart() -> (Totals, Vec<CartItem>) {
        let product = Product::new("prod-a", "Product A", Price::from_minor(1999, Currency::USD));
        let items = vec![CartItem::from_product(&product, 2)];
        let totals = Totals {
            subtotal: 3998,
            tax: 0,
            shipping: 0,
            discount: 0,
            total: 3998,
            currency: Currency::USD,
        };
        (totals, items)
    }

    #[tokio::test]
    async fn test_create_redirect_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("Authorization", "Bearer sk_test_abc123"))
            .and(header("Idempotency-Key", "cs_abc123"))
            .and(body_string_contains("mode=payment"))
            .and(body_string_contains(
                "metadata%5Bcheckout_session_id%5D=cs_abc123",
            ))
            .and(body_string_contains(
                "line_items%5B0%5D%5Bprice_data%5D%5Bunit_amount%5D=1999",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_stripe_xyz",
                "url": "https://checkout.stripe.com/c/pay/cs_stripe_xyz",
                "expires_at": chrono::Utc::now().timestamp() + 1800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let (totals, items) = cart();
        let redirect = gateway
            .create_redirect_session("cs_abc123", &totals, "buyer@example.com", &items)
            .await
            .unwrap();

        assert_eq!(redirect.gateway_ref, "cs_stripe_xyz");
        assert!(redirect.url.contains("checkout.stripe.com"));
        assert!(redirect.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_submit_token_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(body_string_contains("amount=3998"))
            .and(body_string_contains("confirm=true"))
            .and(body_string_contains("shared_payment_token=spt_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_test_789",
                "status": "succeeded"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let (totals, _) = cart();
        let outcome = gateway
            .submit_token(
                "cs_abc123",
                &totals,
                "buyer@example.com",
                &PaymentInstrument::Token("spt_123".into()),
            )
            .await
            .unwrap();

        assert!(outcome.succeeded);
        assert_eq!(outcome.gateway_payment_id, "pi_test_789");
    }

    #[tokio::test]
    async fn test_submit_token_decline_is_ok_not_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "type": "card_error",
                    "message": "Your card has insufficient funds.",
                    "code": "card_declined",
                    "decline_code": "insufficient_funds",
                    "payment_intent": "pi_test_789"
                }
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let (totals, _) = cart();
        let outcome = gateway
            .submit_token(
                "cs_abc123",
                &totals,
                "buyer@example.com",
                &PaymentInstrument::Token("spt_123".into()),
            )
            .await
            .unwrap();

        assert!(!outcome.succeeded);
        assert_eq!(outcome.decline_reason.as_deref(), Some("insufficient_funds"));
        assert_eq!(outcome.gateway_payment_id, "pi_test_789");
    }

    #[tokio::test]
    async fn test_api_error_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "type": "invalid_request_error",
                    "message": "Missing required param: line_items."
                }
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let (totals, items) = cart();
        let err = gateway
            .create_redirect_session("cs_abc123", &totals, "buyer@example.com", &items)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Gateway { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_gateway_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let (totals, _) = cart();
        let err = gateway
            .submit_token(
                "cs_abc123",
                &totals,
                "buyer@example.com",
                &PaymentInstrument::Token("spt_123".into()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::GatewayUnavailable(_)));
    }

    #[tokio::test]
    async fn test_raw_card_rejected_outside_test_mode() {
        let server = MockServer::start().await;
        let config = StripeConfig::new("sk_live_abc123", "whsec_secret")
            .with_api_base_url(server.uri());
        let gateway = StripeGateway::new(config).unwrap();
        let (totals, _) = cart();

        let err = gateway
            .submit_token(
                "cs_abc123",
                &totals,
                "buyer@example.com",
                &PaymentInstrument::TestCard {
                    number: "4242424242424242".into(),
                    exp_month: 12,
                    exp_year: 2030,
                    cvc: "123".into(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::InvalidRequest(_)));
    }
}
