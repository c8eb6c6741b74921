//! # API Request Models
//!
//! Structures for incoming API request bodies.
//! Each struct represents the expected JSON body for an endpoint.

use serde::{Deserialize, Serialize};

/// Request to bootstrap the caller's user profile after signup.
///
/// The identity comes from the bearer token; the body only carries the
/// referral code captured from signup context (URL parameter or stored
/// browser value), if any.
///
/// ## Example JSON
///
/// ```json
/// {
///     "referredBy": "AB12-CD34"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InitUserRequest {
    /// Referral code of the user who referred the caller, if captured.
    pub referred_by: Option<String>,

    /// Optional display name; defaults to the email's local part.
    pub username: Option<String>,
}

/// A cart line as submitted by the client.
///
/// Prices are deliberately absent: the server looks every product up in
/// the authoritative price list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    /// Product id.
    pub product_id: String,

    /// Quantity; values below 1 are clamped to 1.
    #[serde(default = "default_qty")]
    pub qty: i64,

    /// Optional variant.
    pub color: Option<String>,
}

fn default_qty() -> i64 {
    1
}

/// Request to place a store order paid from the affiliate balance.
///
/// ## Example JSON
///
/// ```json
/// {
///     "items": [
///         { "productId": "hoodie-black", "qty": 1, "color": "black" },
///         { "productId": "mug", "qty": 2 }
///     ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceOrderRequest {
    /// Cart lines; must not be empty.
    pub items: Vec<CartItemRequest>,
}

/// Request to withdraw from the affiliate balance.
///
/// ## Example JSON
///
/// ```json
/// {
///     "amount": 2500
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    /// Amount to withdraw, in pence.
    pub amount: i64,
}

/// Query parameters for paginated history endpoints (ledger entries,
/// closed signals).
///
/// ## Example URL
///
/// ```text
/// GET /affiliate/ledger/uid-123?limit=20&offset=0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Maximum number of entries to return.
    /// Default: 20, Max: 100
    #[serde(default = "default_limit")]
    pub limit: i64,

    /// Number of entries to skip (for pagination).
    /// Default: 0
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

/// Request to post a new trade signal.
///
/// ## Example JSON
///
/// ```json
/// {
///     "pair": "XAUUSD",
///     "direction": "Buy",
///     "entry": "2388.50",
///     "stopLoss": "2380.00",
///     "tp1": "2395.00",
///     "tp2": "2402.00",
///     "notes": "London session setup"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSignalRequest {
    /// Instrument, e.g. "XAUUSD".
    pub pair: String,

    /// "Buy" or "Sell".
    pub direction: String,

    /// Entry price.
    pub entry: String,

    /// Stop loss.
    pub stop_loss: String,

    /// Take-profit targets; all optional.
    pub tp1: Option<String>,
    pub tp2: Option<String>,
    pub tp3: Option<String>,

    /// Free-text analysis.
    pub notes: Option<String>,
}

/// Admin action applied to a live signal.
///
/// `TP1`/`TP2` mark the target and keep the signal live; `TP3`, `LOSS`
/// and `BE` close it into history.
///
/// ## Example JSON
///
/// ```json
/// {
///     "action": "TP1",
///     "customPips": "+65 pips",
///     "customNotes": "Partials off, stop to entry"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalActionRequest {
    /// One of "TP1", "TP2", "TP3", "LOSS", "BE".
    pub action: String,

    /// Pip text shown in the notification instead of the computed value.
    pub custom_pips: Option<String>,

    /// Closing note appended to the notification.
    pub custom_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_item_qty_defaults_to_one() {
        let item: CartItemRequest =
            serde_json::from_str(r#"{"productId": "mug"}"#).unwrap();
        assert_eq!(item.product_id, "mug");
        assert_eq!(item.qty, 1);
        assert_eq!(item.color, None);
    }

    #[test]
    fn test_history_query_defaults() {
        let query: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 20);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_init_request_accepts_empty_body() {
        let request: InitUserRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.referred_by, None);
    }
}
