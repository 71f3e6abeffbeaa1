//! # Checkout Engine
//!
//! The service layer that drives a session through its lifecycle: cart and
//! buyer mutations with synchronous totals recompute, the two payment
//! completion strategies, asynchronous outcome application, and cancellation.
//!
//! Every mutation runs under the session's own lock. Payment initiation
//! claims that lock with `try_lock` and holds it across the gateway round
//! trip, so a concurrent attempt observes `PaymentAlreadyInProgress` instead
//! of queueing behind a slow gateway, and a cart edit can never be merged
//! into an in-flight payment's locked totals.

use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::{
    BoxedPaymentGateway, GatewayNotification, NotificationKind, PaymentInstrument,
    RedirectSession,
};
use crate::order::{OrderFactory, OrderReceipt, PaymentOutcome};
use crate::product::{Catalog, Product};
use crate::session::{
    BuyerInfo, CartItem, CheckoutSession, PaymentRef, PaymentStrategyKind, SessionStatus,
};
use crate::store::SessionStore;
use crate::totals::TotalsCalculator;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A minted hosted-payment link plus the session snapshot after initiation
#[derive(Debug, Clone)]
pub struct RedirectLink {
    pub session: CheckoutSession,
    pub redirect: RedirectSession,
}

/// Result of a payment attempt reaching a terminal transition.
///
/// `receipt` is present when the transition was a success and an order was
/// created; a failure outcome leaves it empty with the session in `Failed`.
#[derive(Debug, Clone)]
pub struct PaymentCompletion {
    pub session: CheckoutSession,
    pub receipt: Option<OrderReceipt>,
}

/// Checkout engine: owns the store and collaborators, exposes the full
/// caller-facing operation set
pub struct CheckoutEngine {
    store: Arc<SessionStore>,
    catalog: Arc<dyn Catalog>,
    gateway: BoxedPaymentGateway,
    totals: TotalsCalculator,
    orders: OrderFactory,
    gateway_timeout: std::time::Duration,
}

impl CheckoutEngine {
    pub fn new(
        store: Arc<SessionStore>,
        catalog: Arc<dyn Catalog>,
        gateway: BoxedPaymentGateway,
        totals: TotalsCalculator,
        orders: OrderFactory,
        gateway_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            gateway,
            totals,
            orders,
            gateway_timeout,
        }
    }

    /// Create a fresh pending session
    #[instrument(skip(self))]
    pub async fn create_session(&self) -> CheckoutSession {
        self.store.create().await
    }

    /// Snapshot of the current session state
    #[instrument(skip(self))]
    pub async fn get_session(&self, session_id: &str) -> CheckoutResult<CheckoutSession> {
        let handle = self.store.get(session_id).await?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// Add a product to the cart, merging quantity if already present.
    ///
    /// Price and currency are snapshotted from the catalog on first add; a
    /// merge never overwrites the locked price. Promotes `Pending -> Ready`.
    #[instrument(skip(self), fields(session_id = %session_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        session_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> CheckoutResult<CheckoutSession> {
        let quantity = positive_quantity(quantity)?;
        let handle = self.store.get(session_id).await?;
        let mut session = handle.lock().await;
        session.ensure_mutable("add_item")?;

        let product = self
            .catalog
            .lookup(product_id)
            .ok_or_else(|| CheckoutError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;

        // One currency per session, rejected before any mutation.
        if let Some(currency) = session.currency() {
            if product.price.currency != currency {
                return Err(CheckoutError::CurrencyMismatch {
                    expected: currency.to_string(),
                    found: product.price.currency.to_string(),
                });
            }
        }

        match session
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => session.items.push(CartItem::from_product(&product, quantity)),
        }

        self.recompute(&mut session);
        session.sync_cart_status();
        info!(
            "Added {}x {} to session {}: subtotal={}",
            quantity, product_id, session.id, session.totals.subtotal
        );
        Ok(session.clone())
    }

    /// Remove a product from the cart; absent products are a no-op.
    /// Demotes `Ready -> Pending` when the cart becomes empty.
    #[instrument(skip(self), fields(session_id = %session_id, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        session_id: &str,
        product_id: &str,
    ) -> CheckoutResult<CheckoutSession> {
        let handle = self.store.get(session_id).await?;
        let mut session = handle.lock().await;
        session.ensure_mutable("remove_item")?;

        self.remove_from(&mut session, product_id);
        Ok(session.clone())
    }

    /// Replace a cart item's quantity in place.
    ///
    /// Quantity zero behaves identically to `remove_item`; negative
    /// quantities are invalid; an absent product (with quantity > 0) is
    /// `ItemNotInCart`.
    #[instrument(skip(self), fields(session_id = %session_id, product_id = %product_id))]
    pub async fn update_quantity(
        &self,
        session_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> CheckoutResult<CheckoutSession> {
        if quantity < 0 {
            return Err(CheckoutError::InvalidQuantity { quantity });
        }
        let handle = self.store.get(session_id).await?;
        let mut session = handle.lock().await;
        session.ensure_mutable("update_quantity")?;

        if quantity == 0 {
            self.remove_from(&mut session, product_id);
            return Ok(session.clone());
        }

        let quantity = positive_quantity(quantity)?;
        let item = session
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
            .ok_or_else(|| CheckoutError::ItemNotInCart {
                product_id: product_id.to_string(),
            })?;
        item.quantity = quantity;

        self.recompute(&mut session);
        Ok(session.clone())
    }

    /// Set buyer details; email is validated only at payment time
    #[instrument(skip(self, buyer), fields(session_id = %session_id))]
    pub async fn set_buyer(
        &self,
        session_id: &str,
        buyer: BuyerInfo,
    ) -> CheckoutResult<CheckoutSession> {
        let handle = self.store.get(session_id).await?;
        let mut session = handle.lock().await;
        session.ensure_mutable("set_buyer")?;

        session.buyer = Some(buyer);
        // The address may feed the tax/shipping collaborators.
        self.recompute(&mut session);
        Ok(session.clone())
    }

    /// Initiate the redirect strategy: mint a hosted payment session bound
    /// to the current totals and hand back its URL. Completion arrives later
    /// through `apply_payment_outcome`.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn create_redirect_link(&self, session_id: &str) -> CheckoutResult<RedirectLink> {
        let handle = self.store.get(session_id).await?;
        let mut session =
            handle
                .try_lock()
                .map_err(|_| CheckoutError::PaymentAlreadyInProgress {
                    session_id: session_id.to_string(),
                })?;
        session.ensure_payment_initiable()?;
        let email = session.buyer_email()?.to_string();

        let sid = session.id.clone();
        let totals = session.totals;
        let items = session.items.clone();
        session.status = SessionStatus::Processing;

        let call = self
            .gateway
            .create_redirect_session(&sid, &totals, &email, &items);
        let redirect = match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(Ok(redirect)) => redirect,
            Ok(Err(e)) => {
                session.status = SessionStatus::Failed;
                return Err(e);
            }
            Err(_) => {
                session.status = SessionStatus::Failed;
                return Err(CheckoutError::GatewayUnavailable(format!(
                    "redirect session creation timed out after {:?}",
                    self.gateway_timeout
                )));
            }
        };

        session.payment_ref = Some(PaymentRef {
            gateway_ref: redirect.gateway_ref.clone(),
            strategy: PaymentStrategyKind::Redirect,
            initiated_at: Utc::now(),
        });

        info!(
            "Created redirect link for session {}: gateway_ref={}",
            session.id, redirect.gateway_ref
        );
        Ok(RedirectLink {
            session: session.clone(),
            redirect,
        })
    }

    /// Initiate the token strategy: a single synchronous round trip against
    /// the locked total. Success builds the order immediately; a decline
    /// transitions to `Failed` and surfaces the gateway's reason.
    #[instrument(skip(self, instrument), fields(session_id = %session_id))]
    pub async fn submit_token_payment(
        &self,
        session_id: &str,
        instrument: PaymentInstrument,
    ) -> CheckoutResult<PaymentCompletion> {
        let handle = self.store.get(session_id).await?;
        let mut session =
            handle
                .try_lock()
                .map_err(|_| CheckoutError::PaymentAlreadyInProgress {
                    session_id: session_id.to_string(),
                })?;
        session.ensure_payment_initiable()?;
        let email = session.buyer_email()?.to_string();

        let sid = session.id.clone();
        let totals = session.totals;
        session.status = SessionStatus::Processing;

        let call = self.gateway.submit_token(&sid, &totals, &email, &instrument);
        let outcome = match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                session.status = SessionStatus::Failed;
                return Err(e);
            }
            Err(_) => {
                session.status = SessionStatus::Failed;
                return Err(CheckoutError::GatewayUnavailable(format!(
                    "token submission timed out after {:?}",
                    self.gateway_timeout
                )));
            }
        };

        session.payment_ref = Some(PaymentRef {
            gateway_ref: outcome.gateway_payment_id.clone(),
            strategy: PaymentStrategyKind::Token,
            initiated_at: Utc::now(),
        });

        if outcome.succeeded {
            let receipt = self
                .orders
                .from_session(&mut session, PaymentOutcome::success(outcome.gateway_payment_id))?;
            info!(
                "Token payment completed for session {}: order={}",
                session.id, receipt.order.id
            );
            Ok(PaymentCompletion {
                session: session.clone(),
                receipt: Some(receipt),
            })
        } else {
            session.status = SessionStatus::Failed;
            let reason = outcome
                .decline_reason
                .unwrap_or_else(|| "declined".to_string());
            info!("Token payment declined for session {}: {}", session.id, reason);
            Err(CheckoutError::PaymentDeclined { reason })
        }
    }

    /// Apply a deferred payment outcome (webhook, poll, or a caller-supplied
    /// token result) to a session in `Processing`.
    ///
    /// A success outcome for a session already past a terminal state is not
    /// honored; it is logged as requiring a compensating refund, which is the
    /// gateway collaborator's concern.
    #[instrument(skip(self, outcome), fields(session_id = %session_id))]
    pub async fn apply_payment_outcome(
        &self,
        session_id: &str,
        outcome: PaymentOutcome,
    ) -> CheckoutResult<PaymentCompletion> {
        let handle = match self.store.get(session_id).await {
            Ok(handle) => handle,
            Err(e) => {
                if outcome.succeeded {
                    warn!(
                        "Late payment success for unknown/expired session {} \
                         (payment {}); compensating refund required",
                        session_id, outcome.gateway_payment_id
                    );
                }
                return Err(e);
            }
        };
        let mut session = handle.lock().await;

        match session.status {
            SessionStatus::Processing => {
                if outcome.succeeded {
                    let receipt = self.orders.from_session(&mut session, outcome)?;
                    info!(
                        "Deferred payment completed for session {}: order={}",
                        session.id, receipt.order.id
                    );
                    Ok(PaymentCompletion {
                        session: session.clone(),
                        receipt: Some(receipt),
                    })
                } else {
                    session.status = SessionStatus::Failed;
                    info!(
                        "Deferred payment failed for session {}: {}",
                        session.id,
                        outcome.decline_reason.as_deref().unwrap_or("unknown")
                    );
                    Ok(PaymentCompletion {
                        session: session.clone(),
                        receipt: None,
                    })
                }
            }
            SessionStatus::Completed if outcome.succeeded => {
                Err(CheckoutError::DuplicateOrderAttempt {
                    session_id: session.id.clone(),
                })
            }
            status => {
                if outcome.succeeded {
                    warn!(
                        "Late payment success for session {} in state {} \
                         (payment {}); compensating refund required",
                        session.id, status, outcome.gateway_payment_id
                    );
                }
                Err(CheckoutError::InvalidTransition {
                    status: status.as_str().to_string(),
                    operation: "apply_payment_outcome",
                })
            }
        }
    }

    /// Verify a gateway notification and feed it through the same terminal
    /// transitions as a synchronous outcome.
    ///
    /// Events the core does not act on return `Ok(None)`.
    #[instrument(skip(self, payload, signature))]
    pub async fn handle_notification(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> CheckoutResult<Option<PaymentCompletion>> {
        let notification = self.gateway.verify_notification(payload, signature)?;
        self.apply_notification(notification).await
    }

    async fn apply_notification(
        &self,
        notification: GatewayNotification,
    ) -> CheckoutResult<Option<PaymentCompletion>> {
        let session_id = match notification.session_id.as_deref() {
            Some(id) => id,
            None => {
                warn!(
                    "Gateway notification without session reference: gateway_ref={}",
                    notification.gateway_ref
                );
                return Ok(None);
            }
        };

        let outcome = match notification.kind {
            NotificationKind::PaymentSucceeded => PaymentOutcome::success(
                notification
                    .gateway_payment_id
                    .unwrap_or_else(|| notification.gateway_ref.clone()),
            ),
            NotificationKind::PaymentFailed => PaymentOutcome::declined(
                notification
                    .gateway_payment_id
                    .unwrap_or_else(|| notification.gateway_ref.clone()),
                notification
                    .decline_reason
                    .unwrap_or_else(|| "payment failed".to_string()),
            ),
            NotificationKind::RedirectExpired => PaymentOutcome::declined(
                notification.gateway_ref.clone(),
                "redirect session expired".to_string(),
            ),
            NotificationKind::Unknown(ref kind) => {
                info!("Ignoring gateway notification kind: {}", kind);
                return Ok(None);
            }
        };

        self.apply_payment_outcome(session_id, outcome)
            .await
            .map(Some)
    }

    /// Cancel a session. Rejected once the session is terminal; a deferred
    /// gateway outcome arriving after cancellation is handled by
    /// `apply_payment_outcome`'s late-success path.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn cancel(&self, session_id: &str) -> CheckoutResult<CheckoutSession> {
        let handle = self.store.get(session_id).await?;
        let mut session = handle.lock().await;

        if session.status.is_terminal() {
            return Err(CheckoutError::InvalidTransition {
                status: session.status.as_str().to_string(),
                operation: "cancel",
            });
        }

        session.status = SessionStatus::Cancelled;
        info!("Cancelled checkout session: {}", session.id);
        Ok(session.clone())
    }

    /// Search the catalog collaborator
    pub fn search_products(&self, query: &str) -> Vec<Product> {
        self.catalog.search(query)
    }

    fn recompute(&self, session: &mut CheckoutSession) {
        let address = session.buyer.as_ref().and_then(|b| b.address.clone());
        session.totals = self.totals.compute(&session.items, address.as_ref());
    }

    fn remove_from(&self, session: &mut CheckoutSession, product_id: &str) {
        let before = session.items.len();
        session.items.retain(|item| item.product_id != product_id);
        if session.items.len() != before {
            self.recompute(session);
            session.sync_cart_status();
        }
    }
}

fn positive_quantity(quantity: i64) -> CheckoutResult<u32> {
    if quantity <= 0 {
        return Err(CheckoutError::InvalidQuantity { quantity });
    }
    u32::try_from(quantity).map_err(|_| CheckoutError::InvalidQuantity { quantity })
}
