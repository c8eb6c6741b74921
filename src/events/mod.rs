//! # Webhook Event Boundary
//!
//! Inbound payment-processor events are loosely-typed JSON on the wire.
//! This module converts them into a strict tagged representation
//! immediately at the boundary, before any business logic runs. Handlers
//! only ever see [`WebhookEvent`] values.
//!
//! ## Wire Format
//!
//! ```json
//! {
//!     "id": "evt_1abc",
//!     "type": "checkout.session.completed",
//!     "data": {
//!         "object": { ... }
//!     }
//! }
//! ```
//!
//! Unknown event types parse into [`WebhookEvent::Ignored`] and are
//! acknowledged without effect.

pub mod signature;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while converting a wire payload.
#[derive(Error, Debug)]
pub enum EventError {
    /// Body was not valid JSON or is missing required structure
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Outer envelope shared by every processor event.
#[derive(Debug, Deserialize)]
struct Envelope {
    /// Processor event id, e.g. "evt_1abc".
    #[serde(default)]
    id: String,

    /// Event type, e.g. "checkout.session.completed".
    #[serde(rename = "type")]
    event_type: String,

    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

/// A completed checkout session.
///
/// `mode` distinguishes a subscription signup from a one-time store
/// purchase; both arrive as the same event type.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session id, e.g. "cs_test_abc".
    pub id: String,

    /// "subscription" or "payment".
    #[serde(default)]
    pub mode: String,

    /// Processor customer id.
    pub customer: Option<String>,

    /// Email as entered at checkout.
    pub customer_email: Option<String>,

    /// Collected customer details; preferred email source.
    #[serde(default)]
    pub customer_details: CustomerDetails,

    /// Subscription id (subscription mode only).
    pub subscription: Option<String>,

    /// "paid", "unpaid", ...
    #[serde(default)]
    pub payment_status: String,

    /// Total charged, in the currency's minor unit.
    pub amount_total: Option<i64>,

    /// Currency code, lowercase.
    pub currency: Option<String>,

    /// Checkout metadata set when the session was created.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Shipping block collected at checkout.
    pub shipping_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

impl CheckoutSession {
    /// Best-available customer email for this session.
    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .email
            .as_deref()
            .or(self.customer_email.as_deref())
    }

    /// Metadata value as a string, if present and non-empty.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// A subscription lifecycle object (deleted / updated events).
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    /// Subscription id, e.g. "sub_123".
    pub id: String,

    /// Processor customer id.
    pub customer: Option<String>,

    /// Processor status vocabulary: "active", "trialing", "past_due",
    /// "canceled", "unpaid", ...
    #[serde(default)]
    pub status: String,
}

/// A processor event, validated and tagged.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    /// `checkout.session.completed`
    CheckoutCompleted {
        event_id: String,
        session: CheckoutSession,
    },
    /// `customer.subscription.deleted`
    SubscriptionDeleted {
        event_id: String,
        subscription: SubscriptionObject,
    },
    /// `customer.subscription.updated`
    SubscriptionUpdated {
        event_id: String,
        subscription: SubscriptionObject,
    },
    /// Anything else; acknowledged and ignored.
    Ignored { event_type: String },
}

/// Parse a raw webhook body into a [`WebhookEvent`].
///
/// Must only be called after the signature has verified.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, EventError> {
    let envelope: Envelope = serde_json::from_slice(body)?;

    let event = match envelope.event_type.as_str() {
        "checkout.session.completed" => WebhookEvent::CheckoutCompleted {
            event_id: envelope.id,
            session: serde_json::from_value(envelope.data.object)?,
        },
        "customer.subscription.deleted" => WebhookEvent::SubscriptionDeleted {
            event_id: envelope.id,
            subscription: serde_json::from_value(envelope.data.object)?,
        },
        "customer.subscription.updated" => WebhookEvent::SubscriptionUpdated {
            event_id: envelope.id,
            subscription: serde_json::from_value(envelope.data.object)?,
        },
        _ => WebhookEvent::Ignored {
            event_type: envelope.event_type,
        },
    };

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkout_completed() {
        let body = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_1",
                    "mode": "subscription",
                    "customer": "cus_9",
                    "customer_details": { "email": "a@b.co" },
                    "subscription": "sub_42",
                    "payment_status": "paid",
                    "amount_total": 2999,
                    "currency": "gbp"
                }
            }
        }"#;

        match parse_event(body).unwrap() {
            WebhookEvent::CheckoutCompleted { event_id, session } => {
                assert_eq!(event_id, "evt_1");
                assert_eq!(session.mode, "subscription");
                assert_eq!(session.email(), Some("a@b.co"));
                assert_eq!(session.subscription.as_deref(), Some("sub_42"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_email_falls_back_to_customer_email() {
        let body = br#"{
            "id": "evt_2",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_2",
                    "mode": "payment",
                    "customer_email": "fallback@b.co"
                }
            }
        }"#;

        match parse_event(body).unwrap() {
            WebhookEvent::CheckoutCompleted { session, .. } => {
                assert_eq!(session.email(), Some("fallback@b.co"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_subscription_deleted() {
        let body = br#"{
            "id": "evt_3",
            "type": "customer.subscription.deleted",
            "data": {
                "object": { "id": "sub_42", "customer": "cus_9", "status": "canceled" }
            }
        }"#;

        match parse_event(body).unwrap() {
            WebhookEvent::SubscriptionDeleted { subscription, .. } => {
                assert_eq!(subscription.id, "sub_42");
                assert_eq!(subscription.customer.as_deref(), Some("cus_9"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_type_is_ignored() {
        let body = br#"{
            "id": "evt_4",
            "type": "invoice.finalized",
            "data": { "object": {} }
        }"#;

        match parse_event(body).unwrap() {
            WebhookEvent::Ignored { event_type } => {
                assert_eq!(event_type, "invoice.finalized");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_body_is_rejected() {
        assert!(parse_event(b"not json").is_err());
        assert!(parse_event(br#"{"type": "checkout.session.completed"}"#).is_err());
    }
}
