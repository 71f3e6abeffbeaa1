//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Tools:
///   - POST /api/v1/tools - Dispatch a checkout tool invocation
///
/// - Catalog:
///   - GET  /api/v1/products - List products
///   - GET  /api/v1/products/search?q= - Search products
///   - GET  /api/v1/products/{id} - Get product by ID
///
/// - Webhooks:
///   - POST /webhook/stripe - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - allow all origins for now
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/tools", post(handlers::tool_call))
        .route("/products", get(handlers::list_products))
        .route("/products/search", get(handlers::search_products))
        .route("/products/{product_id}", get(handlers::get_product));

    // Webhook routes (no CORS, must accept raw body)
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        // API v1
        .nest("/api/v1", api_routes)
        // Webhooks
        .nest("/webhook", webhook_routes)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use async_trait::async_trait;
    use axum_test::TestServer;
    use checkout_core::{
        CartItem, CheckoutError, CheckoutResult, Currency, GatewayNotification,
        PaymentGateway, PaymentInstrument, Price, Product, ProductCatalog, RedirectSession,
        TokenOutcome, Totals,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct StubGateway;

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_redirect_session(
            &self,
            session_id: &str,
            _totals: &Totals,
            _buyer_email: &str,
            _line_items: &[CartItem],
        ) -> CheckoutResult<RedirectSession> {
            Ok(RedirectSession {
                url: format!("https://pay.test/r/{}", session_id),
                gateway_ref: "gwr_1".to_string(),
                expires_at: None,
            })
        }

        async fn submit_token(
            &self,
            _session_id: &str,
            _totals: &Totals,
            _buyer_email: &str,
            instrument: &PaymentInstrument,
        ) -> CheckoutResult<TokenOutcome> {
            let declined = matches!(
                instrument,
                PaymentInstrument::Token(token) if token == "spt_declined"
            );
            Ok(TokenOutcome {
                succeeded: !declined,
                gateway_payment_id: "pi_1".to_string(),
                decline_reason: declined.then(|| "card_declined".to_string()),
            })
        }

        fn verify_notification(
            &self,
            _payload: &[u8],
            _signature: &str,
        ) -> CheckoutResult<GatewayNotification> {
            Err(CheckoutError::NotificationVerification(
                "Signature mismatch".to_string(),
            ))
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    fn test_server() -> TestServer {
        let mut catalog = ProductCatalog::new();
        catalog.add(Product::new(
            "prod-a",
            "Product A",
            Price::from_minor(1999, Currency::USD),
        ));
        catalog.add(Product::new(
            "prod-b",
            "Product B",
            Price::from_minor(2999, Currency::USD),
        ));

        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            session_ttl_minutes: 60,
            sweep_interval_secs: 60,
            gateway_timeout_secs: 5,
        };
        let state =
            AppState::with_gateway(config, Arc::new(catalog), Arc::new(StubGateway)).unwrap();
        TestServer::new(create_router(state)).unwrap()
    }

    async fn create_session(server: &TestServer) -> String {
        let response = server
            .post("/api/v1/tools")
            .json(&json!({ "tool": "create_session" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["session"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let server = test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_cart_flow_over_http() {
        let server = test_server();
        let session_id = create_session(&server).await;

        let response = server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "add_item",
                "session_id": session_id,
                "product_id": "prod-a",
                "quantity": 2
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "ready");
        assert_eq!(body["session"]["totals"]["subtotal"], 3998);

        let response = server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "remove_item",
                "session_id": session_id,
                "product_id": "prod-a"
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "pending");
        assert_eq!(body["session"]["totals"]["subtotal"], 0);
    }

    #[tokio::test]
    async fn test_token_payment_over_http() {
        let server = test_server();
        let session_id = create_session(&server).await;

        server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "add_item",
                "session_id": session_id,
                "product_id": "prod-b"
            }))
            .await
            .assert_status_ok();
        server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "set_buyer",
                "session_id": session_id,
                "buyer": { "email": "buyer@example.com" }
            }))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "submit_token_payment",
                "session_id": session_id,
                "token": "spt_good"
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "completed");
        assert!(body["order"]["id"].as_str().unwrap().starts_with("ord_"));
    }

    #[tokio::test]
    async fn test_declined_payment_maps_to_402() {
        let server = test_server();
        let session_id = create_session(&server).await;

        server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "add_item",
                "session_id": session_id,
                "product_id": "prod-a"
            }))
            .await
            .assert_status_ok();
        server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "set_buyer",
                "session_id": session_id,
                "buyer": { "email": "buyer@example.com" }
            }))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "submit_token_payment",
                "session_id": session_id,
                "token": "spt_declined"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::PAYMENT_REQUIRED);
        let body: Value = response.json();
        assert_eq!(body["kind"], "payment_declined");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let server = test_server();
        let response = server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "get_status",
                "session_id": "cs_missing"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["kind"], "session_not_found");
    }

    #[tokio::test]
    async fn test_redirect_link_over_http() {
        let server = test_server();
        let session_id = create_session(&server).await;

        server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "add_item",
                "session_id": session_id,
                "product_id": "prod-a"
            }))
            .await
            .assert_status_ok();
        server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "set_buyer",
                "session_id": session_id,
                "buyer": { "email": "buyer@example.com" }
            }))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "create_redirect_link",
                "session_id": session_id
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "processing");
        assert!(body["url"].as_str().unwrap().contains(&session_id));

        // Out-of-band completion drives the terminal transition.
        let response = server
            .post("/api/v1/tools")
            .json(&json!({
                "tool": "complete_with_token_result",
                "session_id": session_id,
                "gateway_payment_id": "pi_hosted",
                "succeeded": true
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "completed");
    }

    #[tokio::test]
    async fn test_product_endpoints() {
        let server = test_server();

        let response = server.get("/api/v1/products").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["count"], 2);

        let response = server.get("/api/v1/products/search?q=product+b").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["count"], 1);

        let response = server.get("/api/v1/products/prod-a").await;
        response.assert_status_ok();

        let response = server.get("/api/v1/products/prod-zzz").await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_requires_signature() {
        let server = test_server();

        let response = server.post("/webhook/stripe").text("{}").await;
        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);

        let response = server
            .post("/webhook/stripe")
            .add_header(
                axum::http::HeaderName::from_static("stripe-signature"),
                axum::http::HeaderValue::from_static("t=1,v1=bad"),
            )
            .text("{}")
            .await;
        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }
}
