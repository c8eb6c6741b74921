//! # Database Models
//!
//! This module defines the data structures that map to database tables.
//! Each struct represents a row in a table.
//!
//! ## Table Overview
//!
//! | Table | Description |
//! |-------|-------------|
//! | `users` | Identity, subscription state, referral linkage |
//! | `affiliates` | One per referrer: balance aggregates and counters |
//! | `ledger_entries` | Append-only record of every balance change |
//! | `orders` | Completed store purchases |
//! | `products` | Authoritative price list |
//! | `signals_live` / `signals_history` | Trade signal board |
//!
//! ## Relationship Diagram
//!
//! ```text
//! ┌─────────────┐       ┌──────────────────┐
//! │    users    │──────<│    affiliates    │
//! │             │       │                  │
//! │ id (PK)     │       │ user_id (PK/FK)  │
//! │ referral_code│      │ available_balance│
//! │ referred_by │       │ ...              │
//! └─────────────┘       └──────────────────┘
//!                               │
//!                               ▼
//!                       ┌──────────────────┐
//!                       │  ledger_entries  │
//!                       │                  │
//!                       │ user_id (FK)     │
//!                       │ amount (signed)  │
//!                       │ entry_type       │
//!                       │ reference        │
//!                       └──────────────────┘
//! ```
//!
//! ## Note on Money
//!
//! Monetary values are `i64` pence (2 decimals), so £25.00 = 2500.
//! PostgreSQL has no unsigned integers and signed ledger amounts need the
//! sign anyway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a user record in the database.
///
/// Created at signup (via the authenticated bootstrap endpoint) or lazily
/// by the webhook path when the processor sees a checkout before the
/// local record has synced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable user id shared with the auth provider. Primary key.
    pub id: String,

    /// Email address, unique. Also the identifier the payment processor
    /// reports on checkout completion.
    pub email: String,

    /// Display name; defaults to the local part of the email.
    pub username: String,

    /// This user's own shareable referral code.
    /// First 8 characters of the id, uppercased. Unique.
    pub referral_code: String,

    /// Referral code of the user who referred this one.
    /// Set at most once, never cleared, never the user's own code.
    pub referred_by: Option<String>,

    /// Subscription status as last reported by the processor
    /// ("none", "active", "trialing", "past_due", "cancelled", ...).
    pub subscription_status: String,

    /// Whether paid content is currently unlocked.
    pub is_paid: bool,

    /// Processor-side customer id, captured at first checkout.
    pub processor_customer_id: Option<String>,

    /// Processor-side subscription id, captured at activation.
    pub processor_subscription_id: Option<String>,

    /// When the user record was created.
    pub joined_at: DateTime<Utc>,

    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry types.
///
/// Each variant is a different kind of balance-affecting event. Credits
/// are stored with positive amounts, debits with negative amounts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Commission credited when a referred user becomes a paying subscriber
    ReferralCommission,
    /// Reversal debited when that subscription is cancelled
    SubscriptionCancelledReversal,
    /// Store purchase paid from the affiliate balance
    StorePurchaseDebit,
    /// Balance paid out to the affiliate
    Withdrawal,
}

impl EntryType {
    /// Column value stored in `ledger_entries.entry_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::ReferralCommission => "referral_commission",
            EntryType::SubscriptionCancelledReversal => "subscription_cancelled_reversal",
            EntryType::StorePurchaseDebit => "store_purchase_debit",
            EntryType::Withdrawal => "withdrawal",
        }
    }

    /// Parse a stored column value.
    #[allow(dead_code)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "referral_commission" => Some(EntryType::ReferralCommission),
            "subscription_cancelled_reversal" => Some(EntryType::SubscriptionCancelledReversal),
            "store_purchase_debit" => Some(EntryType::StorePurchaseDebit),
            "withdrawal" => Some(EntryType::Withdrawal),
            _ => None,
        }
    }

    /// True for the variants that remove money from the balance.
    #[allow(dead_code)]
    pub fn is_debit(&self) -> bool {
        !matches!(self, EntryType::ReferralCommission)
    }
}

/// Represents an affiliate account in the database.
///
/// One row per user who has referred at least one other user or received
/// a commission. Created lazily, never deleted. The balance columns are a
/// cached aggregate of `ledger_entries`; only the commission ledger
/// mutates them (the attribution resolver owns `total_referrals`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffiliateRecord {
    /// Owning user id. Primary key.
    pub user_id: String,

    /// The owner's referral code, denormalized for reporting.
    pub referral_code: String,

    /// Spendable / withdrawable balance, in pence. Never negative.
    pub available_balance: i64,

    /// Earned but not yet releasable, in pence.
    pub pending_balance: i64,

    /// Lifetime credited total, in pence. Only increases.
    pub total_earnings: i64,

    /// Lifetime withdrawn total, in pence. Only increases.
    pub total_withdrawn: i64,

    /// Referred users currently paying. Floored at 0.
    pub active_referrals: i32,

    /// Users ever attributed to this referrer.
    pub total_referrals: i32,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Represents a ledger entry in the database.
///
/// Append-only. Rows are never mutated or deleted after creation; the
/// unique `(user_id, entry_type, reference)` index makes a redelivered
/// external event a no-op.
///
/// ## Example
///
/// A £25 commission for subscription `sub_123`:
/// ```text
/// LedgerEntryRecord {
///     id: "550e8400-...",
///     user_id: "referrer-uid",
///     amount: 2500,
///     entry_type: "referral_commission",
///     reference: Some("sub_123"),
///     ...
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryRecord {
    /// Unique entry ID (UUID v4).
    pub id: Uuid,

    /// The affiliate account this entry belongs to.
    pub user_id: String,

    /// Signed amount in pence. Positive = credit, negative = debit.
    pub amount: i64,

    /// Type of entry, see [`EntryType`].
    pub entry_type: String,

    /// Free-text note for reporting.
    pub note: String,

    /// Originating external reference (subscription id, order id,
    /// withdrawal id). The idempotency key under redelivery.
    pub reference: Option<String>,

    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}

/// A single line item inside an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product id from the authoritative price list.
    pub product_id: String,

    /// Product name at time of purchase.
    pub name: String,

    /// Quantity, at least 1.
    pub qty: i64,

    /// Optional variant.
    pub color: Option<String>,

    /// Server-side unit price in pence at time of purchase.
    pub unit_price: i64,
}

/// Represents an order in the database.
///
/// `order_id` is derived deterministically from the originating event, so
/// a redelivered event maps to the same row and inserts nothing.
/// Immutable after creation except for `order_status` transitions, which
/// are external (fulfillment) actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Deterministic order id. Primary key.
    pub order_id: String,

    /// Buyer user id; None for guest processor checkouts.
    pub user_id: Option<String>,

    /// Buyer email.
    pub user_email: String,

    /// Where the order came from: "store_checkout" or "store_balance".
    pub source: String,

    /// Line items as stored JSON.
    pub items: Vec<OrderItem>,

    /// Order total in pence.
    pub amount_total: i64,

    /// Currency code, e.g. "gbp".
    pub currency: String,

    /// Payment status reported by the funding path ("paid", ...).
    pub payment_status: String,

    /// Fulfillment status; starts at "pending".
    pub order_status: String,

    /// Shipping address as captured at checkout, if any.
    pub shipping_address: Option<serde_json::Value>,

    /// Processor checkout session id, if processor-funded.
    pub processor_session_id: Option<String>,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Represents a product in the authoritative price list.
///
/// Only active products are ever loaded; the `active` column stays in
/// the table for soft retirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product id. Primary key.
    pub product_id: String,

    /// Display name.
    pub name: String,

    /// Unit price in pence.
    pub price: i64,
}

/// Represents a live trade signal.
///
/// `targets_hit` only ever grows; hitting the final target, the stop, or
/// break-even moves the signal to [`SignalHistoryRecord`] and deletes the
/// live row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    /// Unique signal ID.
    pub id: Uuid,

    /// Instrument, e.g. "XAUUSD".
    pub pair: String,

    /// "Buy" or "Sell".
    pub direction: String,

    /// Entry price as posted.
    pub entry_price: String,

    /// Stop loss as posted.
    pub stop_loss: String,

    /// Take-profit targets; tp2/tp3 optional.
    pub tp1: Option<String>,
    pub tp2: Option<String>,
    pub tp3: Option<String>,

    /// Free-text analysis.
    pub notes: Option<String>,

    /// Which targets (1..3) have been hit so far. Monotonic.
    pub targets_hit: Vec<i32>,

    /// "open", "tp1_hit", "tp2_hit" or "tp3_hit".
    pub status: String,

    /// When the signal was posted.
    pub created_at: DateTime<Utc>,

    /// When the signal was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Represents a closed trade signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalHistoryRecord {
    /// Unique record ID.
    pub id: Uuid,

    /// Instrument.
    pub pair: String,

    /// "Buy" or "Sell".
    pub direction: String,

    /// Entry price as posted.
    pub entry_price: String,

    /// Price the trade closed at.
    pub exit_price: String,

    /// Outcome: "win", "partial_win", "loss" or "be".
    pub result: String,

    /// Highest target hit (0 when stopped out or break-even).
    pub tp_hit: i32,

    /// Computed pip result.
    pub pips: f64,

    /// Admin-supplied pip text overriding the computed value.
    pub custom_pips: Option<String>,

    /// Admin-supplied closing note.
    pub custom_notes: Option<String>,

    /// When the signal was originally posted.
    pub opened_at: Option<DateTime<Utc>>,

    /// When the signal was closed.
    pub closed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_round_trip() {
        for t in [
            EntryType::ReferralCommission,
            EntryType::SubscriptionCancelledReversal,
            EntryType::StorePurchaseDebit,
            EntryType::Withdrawal,
        ] {
            assert_eq!(EntryType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(EntryType::from_str("bogus"), None);
    }

    #[test]
    fn test_entry_type_direction() {
        assert!(!EntryType::ReferralCommission.is_debit());
        assert!(EntryType::SubscriptionCancelledReversal.is_debit());
        assert!(EntryType::StorePurchaseDebit.is_debit());
        assert!(EntryType::Withdrawal.is_debit());
    }
}
