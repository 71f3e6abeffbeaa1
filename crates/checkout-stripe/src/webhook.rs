//! # Stripe Webhook Verification
//!
//! Signature verification and event parsing for Stripe webhooks. Stripe signs
//! each delivery with `Stripe-Signature: t=<ts>,v1=<hmac>,...`; the HMAC is
//! SHA-256 over `"{ts}.{payload}"` keyed with the endpoint's signing secret.

use checkout_core::{
    CheckoutError, CheckoutResult, GatewayNotification, NotificationKind,
};
use serde::Deserialize;
use tracing::debug;

/// Events the webhook endpoint should be subscribed to
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "checkout.session.expired",
    "checkout.session.async_payment_failed",
    "payment_intent.payment_failed",
];

/// Verify a webhook delivery and map it to a gateway notification.
///
/// `tolerance_secs` bounds the allowed clock skew between Stripe's timestamp
/// and ours; replayed deliveries outside the window are rejected.
pub fn verify_and_parse(
    webhook_secret: &str,
    tolerance_secs: i64,
    payload: &[u8],
    signature: &str,
) -> CheckoutResult<GatewayNotification> {
    let sig_parts = parse_signature_header(signature)?;

    let now = chrono::Utc::now().timestamp();
    if (now - sig_parts.timestamp).abs() > tolerance_secs {
        return Err(CheckoutError::NotificationVerification(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let signed_payload = format!(
        "{}.{}",
        sig_parts.timestamp,
        String::from_utf8_lossy(payload)
    );
    let expected_sig = compute_hmac_sha256(webhook_secret, &signed_payload);

    let valid = sig_parts
        .signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected_sig));
    if !valid {
        return Err(CheckoutError::NotificationVerification(
            "Signature mismatch".to_string(),
        ));
    }

    parse_event(payload)
}

fn parse_event(payload: &[u8]) -> CheckoutResult<GatewayNotification> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
        CheckoutError::Serialization(format!("Failed to parse webhook event: {}", e))
    })?;

    debug!("Verified Stripe webhook: type={}", event.event_type);

    let obj = &event.data.object;
    let object_id = obj
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    // Our checkout session id rides in metadata on everything we create.
    let session_id = obj
        .get("metadata")
        .and_then(|m| m.get("checkout_session_id"))
        .and_then(|v| v.as_str())
        .map(String::from);

    let payment_intent = obj
        .get("payment_intent")
        .and_then(|v| v.as_str())
        .map(String::from);

    let kind = match event.event_type.as_str() {
        "checkout.session.completed" => {
            let paid = obj
                .get("payment_status")
                .and_then(|v| v.as_str())
                .map(|s| s == "paid")
                .unwrap_or(false);
            if paid {
                NotificationKind::PaymentSucceeded
            } else {
                // Completed-but-unpaid means an async method is still settling;
                // a later async_payment_* event carries the outcome.
                NotificationKind::Unknown(format!("{} (unpaid)", event.event_type))
            }
        }
        "checkout.session.async_payment_succeeded" => NotificationKind::PaymentSucceeded,
        "checkout.session.expired" => NotificationKind::RedirectExpired,
        "checkout.session.async_payment_failed" | "payment_intent.payment_failed" => {
            NotificationKind::PaymentFailed
        }
        other => NotificationKind::Unknown(other.to_string()),
    };

    let decline_reason = obj
        .get("last_payment_error")
        .and_then(|e| e.get("code").or_else(|| e.get("message")))
        .and_then(|v| v.as_str())
        .map(String::from);

    // For payment_intent.* events the object itself is the payment.
    let gateway_payment_id = if event.event_type.starts_with("payment_intent.") {
        Some(object_id.clone())
    } else {
        payment_intent
    };

    Ok(GatewayNotification {
        kind,
        gateway_ref: object_id,
        session_id,
        gateway_payment_id,
        decline_reason,
    })
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    #[allow(dead_code)]
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> CheckoutResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let kv: Vec<&str> = part.split('=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0] {
            "t" => {
                timestamp = kv[1].parse().ok();
            }
            "v1" => {
                signatures.push(kv[1].to_string());
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        CheckoutError::NotificationVerification("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(CheckoutError::NotificationVerification(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

pub(crate) fn compute_hmac_sha256(secret: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    hex::encode(result.into_bytes())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
