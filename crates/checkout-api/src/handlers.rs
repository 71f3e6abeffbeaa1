//! # Request Handlers
//!
//! Axum request handlers for the checkout API: the tool dispatch endpoint,
//! catalog reads, the Stripe webhook and health.

use crate::state::AppState;
use crate::tools::{self, ToolReply, ToolRequest};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use checkout_core::CheckoutError;
use serde::Serialize;
use tracing::{error, info, instrument};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable error kind (e.g. `session_not_found`)
    pub kind: &'static str,
    pub code: u16,
}

impl ErrorResponse {
    pub fn from_error(err: &CheckoutError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
            code: err.status_code(),
        }
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, Json<ErrorResponse>) {
    let response = ErrorResponse::from_error(&err);
    (
        StatusCode::from_u16(response.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "agent-checkout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Single tool-dispatch endpoint: every checkout operation is a named tool
#[instrument(skip(state, request))]
pub async fn tool_call(
    State(state): State<AppState>,
    Json(request): Json<ToolRequest>,
) -> Result<Json<ToolReply>, (StatusCode, Json<ErrorResponse>)> {
    tools::dispatch(&state.engine, request)
        .await
        .map(Json)
        .map_err(checkout_error_to_response)
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            checkout_error_to_response(CheckoutError::NotificationVerification(
                "Missing Stripe-Signature header".to_string(),
            ))
        })?;

    match state.engine.handle_notification(&body, signature).await {
        Ok(Some(completion)) => {
            info!(
                "Webhook applied: session={}, status={}",
                completion.session.id, completion.session.status
            );
            Ok(StatusCode::OK)
        }
        Ok(None) => Ok(StatusCode::OK),
        Err(e) => {
            error!("Webhook processing failed: {}", e);
            Err(checkout_error_to_response(e))
        }
    }
}

/// Get products list
pub async fn list_products(State(state): State<AppState>) -> impl IntoResponse {
    let products = state.engine.search_products("");
    Json(serde_json::json!({
        "count": products.len(),
        "products": products
    }))
}

/// Search products by query string
#[derive(Debug, serde::Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search_products(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<SearchQuery>,
) -> impl IntoResponse {
    let products = state.engine.search_products(&query.q);
    Json(serde_json::json!({
        "query": query.q,
        "count": products.len(),
        "products": products
    }))
}

/// Get single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    state
        .engine
        .search_products("")
        .into_iter()
        .find(|p| p.id == product_id)
        .map(Json)
        .ok_or_else(|| {
            checkout_error_to_response(CheckoutError::ProductNotFound { product_id })
        })
}
