//! # Event Reconciler Service
//!
//! The EventReconciler translates payment-processor lifecycle events and
//! authenticated store requests into user-state and ledger effects. It is
//! the only caller of the commission ledger.
//!
//! ## Responsibilities
//!
//! - Activate subscriptions and credit referral commissions
//! - Cancel subscriptions and reverse previously credited commissions
//! - Track processor status changes on the local user record
//! - Materialize orders from completed checkouts, exactly once
//! - Run balance-funded store checkouts atomically
//!
//! ## Flow Example: Subscription Activated
//!
//! ```text
//! 1. checkout.session.completed (subscription mode) arrives
//!                ↓
//! 2. Resolve or create the local user by email
//!                ↓
//! 3. Mark subscription active, store processor ids
//!                ↓
//! 4. referred_by set? → resolve referrer
//!                ↓
//! 5. Ledger.credit(referrer, flat fee, reference = subscription id)
//!    (a redelivered event hits the same reference and credits nothing)
//! ```
//!
//! ## Idempotency
//!
//! Webhook deliveries are at-least-once. Every effect in this module is
//! keyed on an identifier derived from the event (subscription id, order
//! id), so applying the same event twice changes nothing.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::queries;
use crate::db::{Database, EntryType, OrderItem, UserRecord};
use crate::events::{CheckoutSession, SubscriptionObject};
use crate::models::CartItemRequest;
use crate::services::attribution::AttributionResolver;
use crate::services::ledger::{CommissionLedger, LedgerError};
use crate::utils::referral_code_for;

/// Errors that can occur while reconciling events.
#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    /// Event carries no usable customer email.
    #[error("No customer email on event")]
    MissingEmail,

    /// No local user matches the event's identity. Retryable: the local
    /// record may not have synced yet.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Balance checkout submitted with no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// A requested product is missing from the price list.
    #[error("Product not found: {0}")]
    UnknownProduct(String),

    /// Balance cannot cover the purchase.
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<crate::db::DatabaseError> for ReconcilerError {
    fn from(e: crate::db::DatabaseError) -> Self {
        ReconcilerError::DatabaseError(e.to_string())
    }
}

impl From<tokio_postgres::Error> for ReconcilerError {
    fn from(e: tokio_postgres::Error) -> Self {
        ReconcilerError::DatabaseError(e.to_string())
    }
}

/// Receipt for a successfully placed balance-funded order.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    /// The new order's id.
    pub order_id: String,

    /// Order total in pence.
    pub amount_total: i64,

    /// Currency code.
    pub currency: String,

    /// Affiliate balance remaining after the debit.
    pub balance_after: i64,
}

const INSERT_ORDER_SQL: &str = r#"
    INSERT INTO orders (
        order_id, user_id, user_email, source, items,
        amount_total, currency, payment_status, order_status,
        shipping_address, processor_session_id, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    ON CONFLICT (order_id) DO NOTHING
"#;

/// The reconciler service.
///
/// ## Usage
///
/// ```rust,ignore
/// let reconciler = EventReconciler::new(db, ledger, attribution, config);
/// reconciler.on_subscription_activated(&session).await?;
/// ```
#[derive(Clone)]
pub struct EventReconciler {
    /// Database connection.
    db: Database,

    /// The commission ledger; the only component that moves money.
    ledger: CommissionLedger,

    /// Referral attribution.
    attribution: AttributionResolver,

    /// Application configuration.
    config: AppConfig,
}

impl EventReconciler {
    /// Create a new EventReconciler instance.
    pub fn new(
        db: Database,
        ledger: CommissionLedger,
        attribution: AttributionResolver,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            ledger,
            attribution,
            config,
        }
    }

    // ==========================================
    // SUBSCRIPTION LIFECYCLE
    // ==========================================

    /// Handle a completed subscription checkout.
    ///
    /// Safe to invoke more than once for the same underlying event: the
    /// commission entry is keyed on the subscription id, so a redelivery
    /// updates user state harmlessly and credits nothing.
    pub async fn on_subscription_activated(
        &self,
        session: &CheckoutSession,
    ) -> Result<(), ReconcilerError> {
        let email = session.email().ok_or(ReconcilerError::MissingEmail)?;

        info!("Subscription activated for {}", email);

        let user = self.ensure_user_by_email(email).await?;

        queries::update_subscription_state(
            self.db.pool(),
            &user.id,
            "active",
            true,
            session.customer.as_deref(),
            session.subscription.as_deref(),
        )
        .await?;

        // Commission is keyed on the subscription id; checkout session id
        // is the fallback for deliveries that omit it.
        let reference = session.subscription.as_deref().unwrap_or(&session.id);

        self.credit_commission_for(&user, reference).await
    }

    /// Credit the flat commission to the user's referrer, if any.
    ///
    /// Best-effort by design: an unresolvable referrer is logged and
    /// skipped, and a duplicate reference means the commission was
    /// already paid.
    async fn credit_commission_for(
        &self,
        user: &UserRecord,
        reference: &str,
    ) -> Result<(), ReconcilerError> {
        let Some(code) = user.referred_by.as_deref() else {
            info!("No referral code for {}, no commission", user.id);
            return Ok(());
        };

        let referrer = match self
            .attribution
            .resolve_referrer(code)
            .await
            .map_err(|e| ReconcilerError::DatabaseError(e.to_string()))?
        {
            Some(r) => r,
            None => {
                warn!("Referrer not found for code {}, skipping commission", code);
                return Ok(());
            }
        };

        let note = format!("Referral commission for {}", user.email);
        let result = self
            .ledger
            .credit(
                &referrer.id,
                &referrer.referral_code,
                self.config.commission_pence,
                EntryType::ReferralCommission,
                &note,
                Some(reference),
            )
            .await;

        match result {
            Ok(receipt) => {
                info!(
                    "✅ Commission of {} credited to {} (reference {})",
                    receipt.amount, referrer.id, reference
                );
                Ok(())
            }
            Err(LedgerError::DuplicateReference(_)) => {
                info!("Commission for {} already credited, skipping", reference);
                Ok(())
            }
            Err(e) => Err(ReconcilerError::DatabaseError(e.to_string())),
        }
    }

    /// Handle a deleted (cancelled) subscription.
    ///
    /// Reverses only a commission that was actually credited for this
    /// subscription reference, and exactly the amount that was credited.
    pub async fn on_subscription_cancelled(
        &self,
        subscription: &SubscriptionObject,
    ) -> Result<(), ReconcilerError> {
        let user = self.user_by_customer(subscription.customer.as_deref()).await?;

        info!("Subscription cancelled for {}", user.email);

        queries::update_subscription_state(
            self.db.pool(),
            &user.id,
            "cancelled",
            false,
            None,
            None,
        )
        .await?;

        // The original commission entry tells us whether anything was
        // credited for this subscription, to whom, and how much.
        let credited = queries::get_commission_entry_by_reference(
            self.db.pool(),
            &subscription.id,
        )
        .await?;

        let Some(entry) = credited else {
            info!(
                "No commission on record for {}, nothing to reverse",
                subscription.id
            );
            return Ok(());
        };

        let note = format!("Reversal: {} cancelled", user.email);
        let result = self
            .ledger
            .debit(
                &entry.user_id,
                entry.amount,
                EntryType::SubscriptionCancelledReversal,
                &note,
                Some(subscription.id.as_str()),
            )
            .await;

        match result {
            Ok(_) => {
                info!(
                    "✅ Reversed {} from {} (reference {})",
                    entry.amount, entry.user_id, subscription.id
                );
                Ok(())
            }
            Err(LedgerError::DuplicateReference(_)) => {
                info!("Reversal for {} already applied, skipping", subscription.id);
                Ok(())
            }
            Err(LedgerError::InsufficientBalance { available, requested }) => {
                // The commission was already spent. The balance cannot go
                // negative, so the reversal is dropped; retrying the
                // event would not change that.
                warn!(
                    "Reversal of {} for {} rejected: available {}",
                    requested, entry.user_id, available
                );
                Ok(())
            }
            Err(e) => Err(ReconcilerError::DatabaseError(e.to_string())),
        }
    }

    /// Handle a subscription status change.
    ///
    /// Maps the processor vocabulary onto the local record; any status
    /// other than active/trialing revokes the paid flag. No ledger
    /// effect.
    pub async fn on_subscription_status_changed(
        &self,
        subscription: &SubscriptionObject,
    ) -> Result<(), ReconcilerError> {
        let user = self.user_by_customer(subscription.customer.as_deref()).await?;

        let is_paid = grants_access(&subscription.status);
        info!(
            "Subscription status for {}: {} (paid: {})",
            user.email, subscription.status, is_paid
        );

        queries::update_subscription_state(
            self.db.pool(),
            &user.id,
            &subscription.status,
            is_paid,
            None,
            Some(subscription.id.as_str()),
        )
        .await?;

        Ok(())
    }

    // ==========================================
    // ORDERS
    // ==========================================

    /// Materialize an order from a completed one-time checkout.
    ///
    /// The order id is derived from the session, so a redelivered event
    /// maps to the existing row and inserts nothing. This path never
    /// touches the ledger.
    pub async fn on_order_completed(
        &self,
        session: &CheckoutSession,
    ) -> Result<(), ReconcilerError> {
        // Checkout creation stamps a deterministic order id into the
        // session metadata; the session id covers deliveries without it.
        let order_id = session
            .metadata_str("orderId")
            .map(str::to_string)
            .unwrap_or_else(|| format!("ord_{}", session.id));

        let email = session.email().unwrap_or_default().to_string();
        let user = if email.is_empty() {
            None
        } else {
            queries::get_user_by_email(self.db.pool(), &email).await?
        };
        let user_id = user.map(|u| u.id);

        let items = self.order_items_from_metadata(session).await;
        let items_json = serde_json::to_value(&items)
            .map_err(|e| ReconcilerError::DatabaseError(e.to_string()))?;

        let now = Utc::now();
        let client = self.db.pool().get().await
            .map_err(|e| ReconcilerError::DatabaseError(e.to_string()))?;

        let inserted = client.execute(
            INSERT_ORDER_SQL,
            &[
                &order_id,
                &user_id,
                &email,
                &"store_checkout",
                &items_json,
                &session.amount_total.unwrap_or(0),
                &session
                    .currency
                    .clone()
                    .unwrap_or_else(|| self.config.currency.clone()),
                &session.payment_status,
                &"pending",
                &session.shipping_details,
                &Some(session.id.as_str()),
                &now,
                &now,
            ],
        ).await?;

        if inserted == 0 {
            info!("Order {} already exists, ignoring redelivery", order_id);
        } else {
            info!("✅ Order {} created ({} items)", order_id, items.len());
        }

        Ok(())
    }

    /// Place a store order paid from the caller's affiliate balance.
    ///
    /// The debit and the order creation run in one transaction: an order
    /// is never created without successfully reserving the funds, and
    /// funds are never taken without the order existing.
    pub async fn place_balance_order(
        &self,
        user_id: &str,
        email: &str,
        cart: &[CartItemRequest],
    ) -> Result<OrderReceipt, ReconcilerError> {
        if cart.is_empty() {
            return Err(ReconcilerError::EmptyCart);
        }

        let items = self.price_cart(cart).await?;
        let subtotal: i64 = items.iter().map(|it| it.unit_price * it.qty).sum();

        let order_id = format!("bal_{}_{}", user_id, Uuid::new_v4().simple());
        let note = format!(
            "Store purchase ({} item{})",
            items.len(),
            if items.len() == 1 { "" } else { "s" }
        );

        let items_json = serde_json::to_value(&items)
            .map_err(|e| ReconcilerError::DatabaseError(e.to_string()))?;

        let mut client = self.db.pool().get().await
            .map_err(|e| ReconcilerError::DatabaseError(e.to_string()))?;
        let tx = client.transaction().await?;

        let receipt = CommissionLedger::debit_in(
            &tx,
            user_id,
            subtotal,
            EntryType::StorePurchaseDebit,
            &note,
            Some(order_id.as_str()),
        )
        .await
        .map_err(|e| match e {
            LedgerError::InsufficientBalance { available, requested } => {
                ReconcilerError::InsufficientBalance { available, requested }
            }
            // No account means nothing was ever credited to spend
            LedgerError::AccountNotFound(_) => ReconcilerError::InsufficientBalance {
                available: 0,
                requested: subtotal,
            },
            other => ReconcilerError::DatabaseError(other.to_string()),
        })?;

        let now = Utc::now();
        tx.execute(
            INSERT_ORDER_SQL,
            &[
                &order_id,
                &Some(user_id),
                &email,
                &"store_balance",
                &items_json,
                &subtotal,
                &self.config.currency,
                &"paid",
                &"pending",
                &None::<serde_json::Value>,
                &None::<&str>,
                &now,
                &now,
            ],
        ).await?;

        tx.commit().await?;

        info!(
            "✅ Balance order {} placed for {} ({})",
            order_id, user_id, subtotal
        );

        Ok(OrderReceipt {
            order_id,
            amount_total: subtotal,
            currency: self.config.currency.clone(),
            balance_after: receipt.balance_after,
        })
    }

    /// Validate a cart against the authoritative price list.
    ///
    /// Client-supplied prices are never trusted; every line is re-priced
    /// from the products table and unknown ids are fatal.
    async fn price_cart(
        &self,
        cart: &[CartItemRequest],
    ) -> Result<Vec<OrderItem>, ReconcilerError> {
        let mut ids: Vec<String> = cart
            .iter()
            .map(|it| it.product_id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort();
        ids.dedup();

        if ids.is_empty() {
            return Err(ReconcilerError::EmptyCart);
        }

        let products = queries::get_products_by_ids(self.db.pool(), &ids).await?;

        let mut items = Vec::with_capacity(cart.len());
        for line in cart {
            let product_id = line.product_id.trim();
            let product = products
                .iter()
                .find(|p| p.product_id == product_id)
                .ok_or_else(|| ReconcilerError::UnknownProduct(product_id.to_string()))?;

            items.push(OrderItem {
                product_id: product.product_id.clone(),
                name: product.name.clone(),
                qty: line.qty.max(1),
                color: line.color.clone(),
                unit_price: product.price,
            });
        }

        Ok(items)
    }

    /// Reconstruct order lines from checkout metadata.
    ///
    /// Unit prices are re-read from the price list where possible; the
    /// session's `amount_total` remains authoritative for the charge.
    async fn order_items_from_metadata(&self, session: &CheckoutSession) -> Vec<OrderItem> {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct MetadataItem {
            #[serde(default)]
            product_id: String,
            #[serde(default)]
            name: String,
            #[serde(default)]
            qty: Option<i64>,
            #[serde(default)]
            color: Option<String>,
        }

        let Some(raw) = session.metadata_str("items") else {
            return Vec::new();
        };

        let parsed: Vec<MetadataItem> = match serde_json::from_str(raw) {
            Ok(items) => items,
            Err(e) => {
                warn!("Unparseable items metadata on {}: {}", session.id, e);
                return Vec::new();
            }
        };

        let ids: Vec<String> = parsed
            .iter()
            .map(|it| it.product_id.clone())
            .filter(|id| !id.is_empty())
            .collect();

        let products = if ids.is_empty() {
            Vec::new()
        } else {
            queries::get_products_by_ids(self.db.pool(), &ids)
                .await
                .unwrap_or_default()
        };

        parsed
            .into_iter()
            .map(|it| {
                let unit_price = products
                    .iter()
                    .find(|p| p.product_id == it.product_id)
                    .map(|p| p.price)
                    .unwrap_or(0);
                OrderItem {
                    product_id: it.product_id,
                    name: it.name,
                    qty: it.qty.unwrap_or(1).max(1),
                    color: it.color,
                    unit_price,
                }
            })
            .collect()
    }

    // ==========================================
    // USER RESOLUTION
    // ==========================================

    /// Resolve a user by email, creating the record when the processor
    /// saw the checkout before the local profile synced.
    async fn ensure_user_by_email(&self, email: &str) -> Result<UserRecord, ReconcilerError> {
        if let Some(user) = queries::get_user_by_email(self.db.pool(), email).await? {
            return Ok(user);
        }

        let id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let user = UserRecord {
            id: id.clone(),
            email: email.to_string(),
            username: email.split('@').next().unwrap_or(email).to_string(),
            referral_code: referral_code_for(&id),
            referred_by: None,
            subscription_status: "none".to_string(),
            is_paid: false,
            processor_customer_id: None,
            processor_subscription_id: None,
            joined_at: now,
            updated_at: now,
        };

        queries::create_user(self.db.pool(), &user).await?;
        info!("Created user record for {} from checkout", email);

        // Re-read in case a concurrent bootstrap won the insert
        queries::get_user_by_email(self.db.pool(), email)
            .await?
            .ok_or_else(|| ReconcilerError::UserNotFound(email.to_string()))
    }

    /// Resolve a user by the processor customer id on a lifecycle event.
    async fn user_by_customer(
        &self,
        customer_id: Option<&str>,
    ) -> Result<UserRecord, ReconcilerError> {
        let customer_id = customer_id.ok_or(ReconcilerError::MissingEmail)?;

        queries::get_user_by_processor_customer(self.db.pool(), customer_id)
            .await?
            .ok_or_else(|| ReconcilerError::UserNotFound(customer_id.to_string()))
    }
}

/// Whether a processor subscription status grants paid access.
pub fn grants_access(status: &str) -> bool {
    matches!(status, "active" | "trialing")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_access_mapping() {
        assert!(grants_access("active"));
        assert!(grants_access("trialing"));
        assert!(!grants_access("past_due"));
        assert!(!grants_access("canceled"));
        assert!(!grants_access("unpaid"));
        assert!(!grants_access("incomplete"));
        assert!(!grants_access(""));
    }
}
